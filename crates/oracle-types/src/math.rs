//! Exact proportional-amount arithmetic.
//!
//! All quantities are 256-bit unsigned integers; intermediate products are
//! widened to 512 bits so `numerator * target` never overflows. Division
//! truncates toward zero, matching the exchange bit for bit.

use alloy_primitives::{U256, U512};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
	#[error("Division by zero")]
	DivisionByZero,
	#[error("Result does not fit in 256 bits")]
	Overflow,
}

/// `floor(numerator * target / denominator)`.
pub fn partial_amount(
	numerator: U256,
	denominator: U256,
	target: U256,
) -> Result<U256, MathError> {
	if denominator.is_zero() {
		return Err(MathError::DivisionByZero);
	}
	let product = U512::from(numerator) * U512::from(target);
	let quotient = product / U512::from(denominator);
	let limbs = quotient.as_limbs();
	if limbs[4..].iter().any(|limb| *limb != 0) {
		return Err(MathError::Overflow);
	}
	Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// Whether truncating `numerator * target / denominator` loses more than
/// 0.1% of the exact value.
pub fn is_rounding_error(
	numerator: U256,
	denominator: U256,
	target: U256,
) -> Result<bool, MathError> {
	if denominator.is_zero() {
		return Err(MathError::DivisionByZero);
	}
	if numerator.is_zero() || target.is_zero() {
		return Ok(false);
	}
	let product = U512::from(numerator) * U512::from(target);
	let remainder = product % U512::from(denominator);
	Ok(remainder * U512::from(1000u64) >= product)
}
