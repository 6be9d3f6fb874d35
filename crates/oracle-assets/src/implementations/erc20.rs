//! Fungible token adapter.
//!
//! Balances and allowances are plain scalars, so forcing a value is a single
//! privileged call on the token contract.

use crate::{AssetAdapter, AssetError, Erc20Token};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use oracle_types::{AssetData, ProxyId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct Erc20Adapter {
	/// Spender every allowance is measured against.
	proxy: Address,
	tokens: HashMap<Address, Arc<dyn Erc20Token>>,
}

impl Erc20Adapter {
	pub fn new(proxy: Address) -> Self {
		Self {
			proxy,
			tokens: HashMap::new(),
		}
	}

	/// Registers a token contract under its own address.
	pub fn with_token(mut self, token: Arc<dyn Erc20Token>) -> Self {
		self.tokens.insert(token.address(), token);
		self
	}

	fn token(&self, asset: &AssetData) -> Result<&Arc<dyn Erc20Token>, AssetError> {
		match asset {
			AssetData::Erc20 { token } => self
				.tokens
				.get(token)
				.ok_or(AssetError::UnknownToken(*token)),
			other => Err(AssetError::Configuration(format!(
				"ERC20 adapter cannot handle {}",
				other
			))),
		}
	}
}

#[async_trait]
impl AssetAdapter for Erc20Adapter {
	fn proxy_id(&self) -> ProxyId {
		ProxyId::Erc20
	}

	async fn balance(&self, owner: Address, asset: &AssetData) -> Result<U256, AssetError> {
		self.token(asset)?.balance_of(owner).await
	}

	async fn set_balance(
		&self,
		owner: Address,
		asset: &AssetData,
		desired: U256,
	) -> Result<(), AssetError> {
		debug!("Setting {} balance of {} to {}", asset, owner, desired);
		self.token(asset)?.set_balance(owner, desired).await
	}

	async fn allowance(&self, owner: Address, asset: &AssetData) -> Result<U256, AssetError> {
		self.token(asset)?.allowance(owner, self.proxy).await
	}

	async fn set_allowance(
		&self,
		owner: Address,
		asset: &AssetData,
		desired: U256,
	) -> Result<(), AssetError> {
		debug!("Setting {} allowance of {} to {}", asset, owner, desired);
		self.token(asset)?.approve(owner, self.proxy, desired).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryErc20Token;
	use crate::UNLIMITED_ALLOWANCE;

	#[tokio::test]
	async fn test_set_and_read_back() {
		let token = Arc::new(MemoryErc20Token::new(Address::repeat_byte(0x20), 5));
		let proxy = Address::repeat_byte(0xaa);
		let adapter = Erc20Adapter::new(proxy).with_token(token.clone());
		let asset = AssetData::erc20(token.address());
		let owner = Address::repeat_byte(1);

		adapter
			.set_balance(owner, &asset, U256::from(12_345))
			.await
			.unwrap();
		adapter
			.set_allowance(owner, &asset, UNLIMITED_ALLOWANCE)
			.await
			.unwrap();

		assert_eq!(adapter.balance(owner, &asset).await.unwrap(), U256::from(12_345));
		assert_eq!(
			adapter.allowance(owner, &asset).await.unwrap(),
			UNLIMITED_ALLOWANCE
		);
		// the allowance is towards the proxy, nobody else
		assert_eq!(
			token.allowance(owner, Address::repeat_byte(0xbb)).await.unwrap(),
			U256::ZERO
		);
	}

	#[tokio::test]
	async fn test_wrong_kind_is_configuration_error() {
		let adapter = Erc20Adapter::new(Address::ZERO);
		let nft = AssetData::erc721(Address::repeat_byte(1), U256::from(1));
		let err = adapter.balance(Address::ZERO, &nft).await.unwrap_err();
		assert!(err.is_configuration());
	}
}
