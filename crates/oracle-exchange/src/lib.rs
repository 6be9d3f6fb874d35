//! The exchange under test.
//!
//! The oracle only ever talks to the exchange through [`ExchangeInterface`]:
//! submit one fill, read back how much of an order is filled, and learn the
//! chain's clock and signing domain.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use oracle_types::{ExchangeDomain, FillReceipt, Order, OrderSignature, RevertReason};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

pub use implementations::memory::MemoryExchange;

#[derive(Debug, Error)]
pub enum ExchangeError {
	/// The exchange rejected the call with a machine-readable reason.
	#[error("Reverted: {0}")]
	Reverted(RevertReason),
	/// Transport or contract failure unrelated to the order.
	#[error("Upstream error: {0}")]
	Upstream(String),
}

#[async_trait]
pub trait ExchangeInterface: Send + Sync {
	fn domain(&self) -> &ExchangeDomain;

	/// Fills up to `taker_asset_fill_amount` of `order` on behalf of `taker`,
	/// who is also the transaction sender.
	async fn fill_order(
		&self,
		taker: Address,
		order: &Order,
		signature: &OrderSignature,
		taker_asset_fill_amount: U256,
	) -> Result<FillReceipt, ExchangeError>;

	/// Cumulative taker amount filled so far.
	async fn filled(&self, order_hash: B256) -> Result<U256, ExchangeError>;

	async fn cancelled(&self, order_hash: B256) -> Result<bool, ExchangeError>;

	async fn block_timestamp(&self) -> Result<u64, ExchangeError>;
}
