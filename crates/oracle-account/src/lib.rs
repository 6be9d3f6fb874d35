//! Order signing for the fill-order oracle.
//!
//! The oracle never touches key material directly; it asks an
//! [`AccountInterface`] for its address and for signatures over order hashes.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use oracle_types::OrderSignature;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

pub use implementations::local::{create_account, LocalWallet, LocalWalletSchema};

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

#[async_trait]
pub trait AccountInterface: Send + Sync {
	fn address(&self) -> Address;

	/// Signs an order's EIP-712 hash, producing the exchange's signature layout.
	async fn sign_order_hash(&self, hash: &B256) -> Result<OrderSignature, AccountError>;
}
