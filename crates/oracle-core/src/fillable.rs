//! Largest taker amount an order can currently be filled for.

use alloy_primitives::U256;
use oracle_types::{partial_amount, MathError, Order};

/// `min(balance, allowance)` of each party for each asset the fill moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transferable {
	pub maker_asset: U256,
	pub maker_fee: U256,
	pub taker_asset: U256,
	pub taker_fee: U256,
}

/// Taker amount not yet filled. Cancelled orders have nothing left.
pub fn remaining_taker_amount(order: &Order, filled: U256, cancelled: bool) -> U256 {
	if cancelled {
		return U256::ZERO;
	}
	order.taker_asset_amount.saturating_sub(filled)
}

/// The largest taker fill that every party can fund.
///
/// Each constraint is expressed in taker-asset units: the maker's primary
/// asset and fee are reflected through the order's exchange rate. When a
/// side's primary asset is also the fee asset, primary and fee draw on the
/// same funds and are constrained together.
pub fn max_fillable_taker_amount(
	order: &Order,
	fee_is_maker_asset: bool,
	fee_is_taker_asset: bool,
	filled: U256,
	cancelled: bool,
	transferable: &Transferable,
) -> Result<U256, MathError> {
	let taker_total = order.taker_asset_amount;
	if order.maker_asset_amount.is_zero() || taker_total.is_zero() {
		return Ok(U256::ZERO);
	}

	let mut max = remaining_taker_amount(order, filled, cancelled);

	if fee_is_maker_asset {
		let combined = order
			.maker_asset_amount
			.checked_add(order.maker_fee)
			.ok_or(MathError::Overflow)?;
		max = max.min(partial_amount(transferable.maker_asset, combined, taker_total)?);
	} else {
		max = max.min(partial_amount(
			transferable.maker_asset,
			order.maker_asset_amount,
			taker_total,
		)?);
		if !order.maker_fee.is_zero() {
			max = max.min(partial_amount(
				transferable.maker_fee,
				order.maker_fee,
				taker_total,
			)?);
		}
	}

	if fee_is_taker_asset {
		let combined = taker_total
			.checked_add(order.taker_fee)
			.ok_or(MathError::Overflow)?;
		max = max.min(partial_amount(transferable.taker_asset, combined, taker_total)?);
	} else {
		max = max.min(transferable.taker_asset);
		if !order.taker_fee.is_zero() {
			max = max.min(partial_amount(
				transferable.taker_fee,
				order.taker_fee,
				taker_total,
			)?);
		}
	}

	Ok(max)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, Bytes};

	fn order(maker: u64, taker: u64, maker_fee: u64, taker_fee: u64) -> Order {
		Order {
			maker: Address::repeat_byte(1),
			taker: Address::ZERO,
			fee_recipient: Address::repeat_byte(3),
			sender: Address::ZERO,
			maker_asset_amount: U256::from(maker),
			taker_asset_amount: U256::from(taker),
			maker_fee: U256::from(maker_fee),
			taker_fee: U256::from(taker_fee),
			expiration: U256::MAX,
			salt: U256::ZERO,
			maker_asset_data: Bytes::new(),
			taker_asset_data: Bytes::new(),
		}
	}

	fn plenty() -> Transferable {
		Transferable {
			maker_asset: U256::from(1_000_000),
			maker_fee: U256::from(1_000_000),
			taker_asset: U256::from(1_000_000),
			taker_fee: U256::from(1_000_000),
		}
	}

	#[test]
	fn test_never_exceeds_remaining() {
		let order = order(200, 100, 10, 10);
		for filled in [0u64, 1, 50, 99, 100, 150] {
			let max = max_fillable_taker_amount(
				&order,
				false,
				false,
				U256::from(filled),
				false,
				&plenty(),
			)
			.unwrap();
			assert!(max <= U256::from(100u64.saturating_sub(filled)));
		}
	}

	#[test]
	fn test_each_party_constrains() {
		let order = order(200, 100, 10, 20);
		let check = |t: Transferable, expected: u64| {
			assert_eq!(
				max_fillable_taker_amount(&order, false, false, U256::ZERO, false, &t).unwrap(),
				U256::from(expected)
			);
		};
		// maker holds 100 of 200 maker asset
		check(
			Transferable {
				maker_asset: U256::from(100),
				..plenty()
			},
			50,
		);
		// maker can pay 4 of the 10 fee
		check(
			Transferable {
				maker_fee: U256::from(4),
				..plenty()
			},
			40,
		);
		check(
			Transferable {
				taker_asset: U256::from(30),
				..plenty()
			},
			30,
		);
		check(
			Transferable {
				taker_fee: U256::from(5),
				..plenty()
			},
			25,
		);
	}

	#[test]
	fn test_shared_fee_asset_is_combined() {
		let order = order(200, 100, 50, 100);
		let t = Transferable {
			maker_asset: U256::from(125),
			taker_asset: U256::from(100),
			..plenty()
		};
		// maker: 125 * 100 / 250 = 50; taker: 100 * 100 / 200 = 50
		let max = max_fillable_taker_amount(&order, true, false, U256::ZERO, false, &t).unwrap();
		assert_eq!(max, U256::from(50));
		let max = max_fillable_taker_amount(&order, false, true, U256::ZERO, false, &t).unwrap();
		assert_eq!(max, U256::from(50));
	}

	#[test]
	fn test_degenerate_orders() {
		assert!(max_fillable_taker_amount(
			&order(0, 100, 0, 0),
			false,
			false,
			U256::ZERO,
			false,
			&plenty()
		)
		.unwrap()
		.is_zero());
		assert!(max_fillable_taker_amount(
			&order(100, 0, 0, 0),
			false,
			false,
			U256::ZERO,
			false,
			&plenty()
		)
		.unwrap()
		.is_zero());
		assert!(max_fillable_taker_amount(
			&order(100, 100, 0, 0),
			false,
			false,
			U256::ZERO,
			true,
			&plenty()
		)
		.unwrap()
		.is_zero());
	}

	#[test]
	fn test_zero_fees_ignore_fee_funds() {
		let order = order(100, 100, 0, 0);
		let t = Transferable {
			maker_fee: U256::ZERO,
			taker_fee: U256::ZERO,
			..plenty()
		};
		let max = max_fillable_taker_amount(&order, false, false, U256::ZERO, false, &t).unwrap();
		assert_eq!(max, U256::from(100));
	}
}
