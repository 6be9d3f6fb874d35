//! Order model for the exchange under test.
//!
//! Orders are plain data until signed: the signing hash is the EIP-712 hash
//! of the order struct under the exchange's domain, and a signature binds a
//! maker to exactly that hash.

use alloy_primitives::{Address, Bytes, PrimitiveSignature, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

use crate::math::{partial_amount, MathError};

mod eip712 {
	alloy_sol_types::sol! {
		struct Order {
			address makerAddress;
			address takerAddress;
			address feeRecipientAddress;
			address senderAddress;
			uint256 makerAssetAmount;
			uint256 takerAssetAmount;
			uint256 makerFee;
			uint256 takerFee;
			uint256 expirationTimeSeconds;
			uint256 salt;
			bytes makerAssetData;
			bytes takerAssetData;
		}
	}
}

/// An order as the maker signs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	pub maker: Address,
	/// Zero means anyone may fill.
	pub taker: Address,
	pub fee_recipient: Address,
	/// Zero means any sender may submit.
	pub sender: Address,
	pub maker_asset_amount: U256,
	pub taker_asset_amount: U256,
	pub maker_fee: U256,
	pub taker_fee: U256,
	/// Unix seconds; the order is expired once block time reaches it.
	pub expiration: U256,
	pub salt: U256,
	pub maker_asset_data: Bytes,
	pub taker_asset_data: Bytes,
}

impl Order {
	/// EIP-712 signing hash of this order under `domain`.
	pub fn hash(&self, domain: &ExchangeDomain) -> B256 {
		eip712::Order {
			makerAddress: self.maker,
			takerAddress: self.taker,
			feeRecipientAddress: self.fee_recipient,
			senderAddress: self.sender,
			makerAssetAmount: self.maker_asset_amount,
			takerAssetAmount: self.taker_asset_amount,
			makerFee: self.maker_fee,
			takerFee: self.taker_fee,
			expirationTimeSeconds: self.expiration,
			salt: self.salt,
			makerAssetData: self.maker_asset_data.clone(),
			takerAssetData: self.taker_asset_data.clone(),
		}
		.eip712_signing_hash(&domain.to_eip712())
	}
}

/// EIP-712 domain the exchange hashes orders under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl ExchangeDomain {
	pub fn to_eip712(&self) -> Eip712Domain {
		Eip712Domain::new(
			Some(Cow::Owned(self.name.clone())),
			Some(Cow::Owned(self.version.clone())),
			Some(U256::from(self.chain_id)),
			Some(self.verifying_contract),
			None,
		)
	}
}

/// Errors raised while parsing or verifying an order signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	#[error("Invalid signature length: {0}")]
	InvalidLength(usize),
	#[error("Unsupported signature type: {0:#04x}")]
	UnsupportedType(u8),
	#[error("Invalid recovery byte: {0}")]
	InvalidRecoveryByte(u8),
	#[error("Recovery failed: {0}")]
	Recovery(String),
}

/// Signature type trailer for signatures over the raw EIP-712 hash.
pub const SIGNATURE_TYPE_EIP712: u8 = 0x02;

/// Order signature in the exchange's layout: `v ‖ r ‖ s ‖ type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSignature(pub Bytes);

impl OrderSignature {
	pub const LENGTH: usize = 66;

	pub fn from_eip712(sig: &PrimitiveSignature) -> Self {
		let mut bytes = Vec::with_capacity(Self::LENGTH);
		bytes.push(if sig.v() { 28 } else { 27 });
		bytes.extend_from_slice(&sig.r().to_be_bytes::<32>());
		bytes.extend_from_slice(&sig.s().to_be_bytes::<32>());
		bytes.push(SIGNATURE_TYPE_EIP712);
		OrderSignature(bytes.into())
	}

	/// Recovers the address that signed `hash`.
	pub fn recover(&self, hash: &B256) -> Result<Address, SignatureError> {
		let bytes = self.0.as_ref();
		if bytes.len() != Self::LENGTH {
			return Err(SignatureError::InvalidLength(bytes.len()));
		}
		if bytes[65] != SIGNATURE_TYPE_EIP712 {
			return Err(SignatureError::UnsupportedType(bytes[65]));
		}
		let parity = match bytes[0] {
			27 => false,
			28 => true,
			other => return Err(SignatureError::InvalidRecoveryByte(other)),
		};
		let r = U256::from_be_slice(&bytes[1..33]);
		let s = U256::from_be_slice(&bytes[33..65]);
		PrimitiveSignature::new(r, s, parity)
			.recover_address_from_prehash(hash)
			.map_err(|e| SignatureError::Recovery(e.to_string()))
	}
}

/// Status of an order as the exchange sees it before a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
	InvalidMakerAssetAmount,
	InvalidTakerAssetAmount,
	Fillable,
	Expired,
	FullyFilled,
	Cancelled,
}

/// Machine-readable reasons the exchange rejects a fill with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevertReason {
	OrderUnfillable,
	InvalidSender,
	InvalidTaker,
	InvalidOrderSignature,
	InvalidTakerAmount,
	RoundingError,
	TransferFailed,
	InvalidAmount,
}

impl fmt::Display for RevertReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let reason = match self {
			RevertReason::OrderUnfillable => "ORDER_UNFILLABLE",
			RevertReason::InvalidSender => "INVALID_SENDER",
			RevertReason::InvalidTaker => "INVALID_TAKER",
			RevertReason::InvalidOrderSignature => "INVALID_ORDER_SIGNATURE",
			RevertReason::InvalidTakerAmount => "INVALID_TAKER_AMOUNT",
			RevertReason::RoundingError => "ROUNDING_ERROR",
			RevertReason::TransferFailed => "TRANSFER_FAILED",
			RevertReason::InvalidAmount => "INVALID_AMOUNT",
		};
		f.write_str(reason)
	}
}

/// Amounts moved by one fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResults {
	pub maker_asset_filled_amount: U256,
	pub taker_asset_filled_amount: U256,
	pub maker_fee_paid: U256,
	pub taker_fee_paid: U256,
}

impl FillResults {
	/// Scales the maker side and both fees by `taker_filled / taker_asset_amount`.
	pub fn compute(order: &Order, taker_filled: U256) -> Result<Self, MathError> {
		let total = order.taker_asset_amount;
		Ok(Self {
			maker_asset_filled_amount: partial_amount(
				taker_filled,
				total,
				order.maker_asset_amount,
			)?,
			taker_asset_filled_amount: taker_filled,
			maker_fee_paid: partial_amount(taker_filled, total, order.maker_fee)?,
			taker_fee_paid: partial_amount(taker_filled, total, order.taker_fee)?,
		})
	}
}

/// Decoded `Fill` event emitted by a successful fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
	pub maker: Address,
	pub taker: Address,
	pub fee_recipient: Address,
	pub sender: Address,
	pub maker_asset_data: Bytes,
	pub taker_asset_data: Bytes,
	pub results: FillResults,
	pub order_hash: B256,
}

/// Receipt of a successful fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReceipt {
	pub event: FillEvent,
}
