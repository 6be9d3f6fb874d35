//! Asset access for the fill-order oracle.
//!
//! Fungible and non-fungible tokens have incompatible balance and approval
//! models. This crate hides the difference behind [`AssetAdapter`]: every
//! asset has a balance and an allowance (towards its asset proxy), and both
//! can be read and forced to a desired value. The [`AssetRouter`] decodes
//! asset data and hands it to the adapter for its kind.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use oracle_types::{AssetData, AssetDataError, ProxyId};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod erc20;
	pub mod erc721;
	pub mod memory;
}

pub use implementations::erc20::Erc20Adapter;
pub use implementations::erc721::Erc721Adapter;

/// Allowance value meaning "never runs out".
pub const UNLIMITED_ALLOWANCE: U256 = U256::MAX;

/// Errors that can occur while reading or forcing asset state.
#[derive(Debug, Error)]
pub enum AssetError {
	/// The requested state cannot be expressed for this asset.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The asset data could not be decoded.
	#[error("Invalid asset data: {0}")]
	AssetData(#[from] AssetDataError),
	/// No contract is registered at the token address.
	#[error("Unknown token contract: {0}")]
	UnknownToken(Address),
	/// A transfer was refused by the token contract.
	#[error("Transfer rejected: {0}")]
	TransferRejected(String),
	/// Any other failure reported by a token contract.
	#[error("Token error: {0}")]
	Token(String),
}

impl AssetError {
	/// Whether the error stems from an impossible request rather than a
	/// failing collaborator.
	pub fn is_configuration(&self) -> bool {
		matches!(self, AssetError::Configuration(_) | AssetError::AssetData(_))
	}
}

/// Fungible token contract as seen by the oracle and the test exchange.
#[async_trait]
pub trait Erc20Token: Send + Sync {
	fn address(&self) -> Address;

	fn decimals(&self) -> u8;

	async fn balance_of(&self, owner: Address) -> Result<U256, AssetError>;

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, AssetError>;

	/// Privileged test-only mutator: overwrites a balance.
	async fn set_balance(&self, owner: Address, amount: U256) -> Result<(), AssetError>;

	/// Records `owner`'s approval of `spender` as if `owner` had sent it.
	async fn approve(&self, owner: Address, spender: Address, amount: U256)
		-> Result<(), AssetError>;

	/// Moves `amount` from `from` to `to` on behalf of `spender`. An
	/// allowance of [`UNLIMITED_ALLOWANCE`] is never decremented.
	async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), AssetError>;
}

/// Non-fungible token contract as seen by the oracle and the test exchange.
#[async_trait]
pub trait Erc721Token: Send + Sync {
	fn address(&self) -> Address;

	/// `None` when the token does not exist.
	async fn owner_of(&self, token_id: U256) -> Result<Option<Address>, AssetError>;

	/// Single-token approval; zero when unset or the token does not exist.
	async fn get_approved(&self, token_id: U256) -> Result<Address, AssetError>;

	async fn is_approved_for_all(&self, owner: Address, operator: Address)
		-> Result<bool, AssetError>;

	async fn mint(&self, to: Address, token_id: U256) -> Result<(), AssetError>;

	async fn burn(&self, token_id: U256) -> Result<(), AssetError>;

	/// Privileged test-only transfer that bypasses approvals.
	async fn force_transfer(&self, from: Address, to: Address, token_id: U256)
		-> Result<(), AssetError>;

	/// Single-token approval sent by the token's current owner.
	async fn approve(&self, approved: Address, token_id: U256) -> Result<(), AssetError>;

	async fn set_approval_for_all(
		&self,
		owner: Address,
		operator: Address,
		approved: bool,
	) -> Result<(), AssetError>;

	/// Transfer on behalf of `spender`, who must own or be approved.
	async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		token_id: U256,
	) -> Result<(), AssetError>;
}

/// Uniform balance/allowance access for one asset kind.
///
/// Allowances are always measured against the asset proxy of the kind.
#[async_trait]
pub trait AssetAdapter: Send + Sync {
	fn proxy_id(&self) -> ProxyId;

	async fn balance(&self, owner: Address, asset: &AssetData) -> Result<U256, AssetError>;

	/// Forces `owner`'s balance to `desired`.
	async fn set_balance(
		&self,
		owner: Address,
		asset: &AssetData,
		desired: U256,
	) -> Result<(), AssetError>;

	async fn allowance(&self, owner: Address, asset: &AssetData) -> Result<U256, AssetError>;

	/// Forces `owner`'s allowance towards the proxy to `desired`.
	async fn set_allowance(
		&self,
		owner: Address,
		asset: &AssetData,
		desired: U256,
	) -> Result<(), AssetError>;
}

/// Dispatches encoded asset data to the adapter for its kind.
pub struct AssetRouter {
	erc20: Box<dyn AssetAdapter>,
	erc721: Box<dyn AssetAdapter>,
}

impl AssetRouter {
	/// Creates a router from one adapter per asset kind. Each adapter must
	/// serve the proxy it is registered for.
	pub fn new(
		erc20: Box<dyn AssetAdapter>,
		erc721: Box<dyn AssetAdapter>,
	) -> Result<Self, AssetError> {
		for (expected, adapter) in [(ProxyId::Erc20, &erc20), (ProxyId::Erc721, &erc721)] {
			if adapter.proxy_id() != expected {
				return Err(AssetError::Configuration(format!(
					"{} adapter registered for {} assets",
					adapter.proxy_id(),
					expected
				)));
			}
		}
		Ok(Self { erc20, erc721 })
	}

	fn adapter(&self, asset: &AssetData) -> &dyn AssetAdapter {
		match asset.proxy_id() {
			ProxyId::Erc20 => self.erc20.as_ref(),
			ProxyId::Erc721 => self.erc721.as_ref(),
		}
	}

	pub async fn balance(&self, owner: Address, asset_data: &[u8]) -> Result<U256, AssetError> {
		let asset = AssetData::decode(asset_data)?;
		self.adapter(&asset).balance(owner, &asset).await
	}

	pub async fn set_balance(
		&self,
		owner: Address,
		asset_data: &[u8],
		desired: U256,
	) -> Result<(), AssetError> {
		let asset = AssetData::decode(asset_data)?;
		self.adapter(&asset)
			.set_balance(owner, &asset, desired)
			.await
	}

	pub async fn allowance(&self, owner: Address, asset_data: &[u8]) -> Result<U256, AssetError> {
		let asset = AssetData::decode(asset_data)?;
		self.adapter(&asset).allowance(owner, &asset).await
	}

	pub async fn set_allowance(
		&self,
		owner: Address,
		asset_data: &[u8],
		desired: U256,
	) -> Result<(), AssetError> {
		let asset = AssetData::decode(asset_data)?;
		self.adapter(&asset)
			.set_allowance(owner, &asset, desired)
			.await
	}

	/// The amount the proxy can actually move: `min(balance, allowance)`.
	pub async fn transferable(
		&self,
		owner: Address,
		asset_data: &[u8],
	) -> Result<U256, AssetError> {
		let balance = self.balance(owner, asset_data).await?;
		let allowance = self.allowance(owner, asset_data).await?;
		Ok(balance.min(allowance))
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::{MemoryErc20Token, MemoryErc721Token};
	use super::*;
	use std::sync::Arc;

	fn proxy() -> Address {
		Address::repeat_byte(0xaa)
	}

	fn router() -> (AssetRouter, Address, Address) {
		let erc20 = Arc::new(MemoryErc20Token::new(Address::repeat_byte(0x20), 18));
		let erc721 = Arc::new(MemoryErc721Token::new(Address::repeat_byte(0x72)));
		let router = AssetRouter::new(
			Box::new(Erc20Adapter::new(proxy()).with_token(erc20.clone())),
			Box::new(Erc721Adapter::new(proxy(), vec![]).with_token(erc721.clone())),
		)
		.unwrap();
		(router, erc20.address(), erc721.address())
	}

	#[tokio::test]
	async fn test_router_dispatches_by_tag() {
		let (router, erc20, erc721) = router();
		let owner = Address::repeat_byte(1);

		let fungible = AssetData::erc20(erc20).encode();
		router
			.set_balance(owner, &fungible, U256::from(500))
			.await
			.unwrap();
		router
			.set_allowance(owner, &fungible, U256::from(200))
			.await
			.unwrap();
		assert_eq!(router.balance(owner, &fungible).await.unwrap(), U256::from(500));
		assert_eq!(
			router.transferable(owner, &fungible).await.unwrap(),
			U256::from(200)
		);

		let nft = AssetData::erc721(erc721, U256::from(9)).encode();
		router.set_balance(owner, &nft, U256::from(1)).await.unwrap();
		assert_eq!(router.balance(owner, &nft).await.unwrap(), U256::from(1));
		assert_eq!(router.transferable(owner, &nft).await.unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn test_router_rejects_unknown_tag() {
		let (router, _, _) = router();
		let err = router
			.balance(Address::ZERO, &[0xde, 0xad, 0xbe, 0xef, 0x00])
			.await
			.unwrap_err();
		assert!(err.is_configuration());
		assert!(matches!(
			err,
			AssetError::AssetData(AssetDataError::UnknownProxyId(_))
		));
	}

	#[tokio::test]
	async fn test_unknown_token_is_upstream() {
		let (router, _, _) = router();
		let stray = AssetData::erc20(Address::repeat_byte(0x99)).encode();
		let err = router.balance(Address::ZERO, &stray).await.unwrap_err();
		assert!(!err.is_configuration());
	}

	#[test]
	fn test_swapped_adapters_refused() {
		let result = AssetRouter::new(
			Box::new(Erc721Adapter::new(proxy(), vec![])),
			Box::new(Erc20Adapter::new(proxy())),
		);
		assert!(matches!(result, Err(AssetError::Configuration(_))));
	}
}
