//! Non-fungible token adapter.
//!
//! A balance is 1 when the owner holds the specific token id named by the
//! asset data and 0 otherwise. Allowance is the proxy's single-token
//! approval (1) or its approve-for-all status (unlimited).

use crate::{AssetAdapter, AssetError, Erc721Token, UNLIMITED_ALLOWANCE};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use oracle_types::{AssetData, ProxyId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct Erc721Adapter {
	proxy: Address,
	tokens: HashMap<Address, Arc<dyn Erc721Token>>,
	/// Accounts a token is handed to when its owner must stop holding it.
	holders: Vec<Address>,
}

impl Erc721Adapter {
	pub fn new(proxy: Address, holders: Vec<Address>) -> Self {
		Self {
			proxy,
			tokens: HashMap::new(),
			holders,
		}
	}

	pub fn with_token(mut self, token: Arc<dyn Erc721Token>) -> Self {
		self.tokens.insert(token.address(), token);
		self
	}

	fn token(&self, asset: &AssetData) -> Result<(&Arc<dyn Erc721Token>, U256), AssetError> {
		match asset {
			AssetData::Erc721 {
				token, token_id, ..
			} => {
				let contract = self
					.tokens
					.get(token)
					.ok_or(AssetError::UnknownToken(*token))?;
				Ok((contract, *token_id))
			}
			other => Err(AssetError::Configuration(format!(
				"ERC721 adapter cannot handle {}",
				other
			))),
		}
	}
}

#[async_trait]
impl AssetAdapter for Erc721Adapter {
	fn proxy_id(&self) -> ProxyId {
		ProxyId::Erc721
	}

	async fn balance(&self, owner: Address, asset: &AssetData) -> Result<U256, AssetError> {
		let (token, token_id) = self.token(asset)?;
		let held = token.owner_of(token_id).await? == Some(owner);
		Ok(U256::from(held as u8))
	}

	async fn set_balance(
		&self,
		owner: Address,
		asset: &AssetData,
		desired: U256,
	) -> Result<(), AssetError> {
		if desired > U256::from(1) {
			return Err(AssetError::Configuration(format!(
				"Balance for {} can only be set to 0 or 1, got {}",
				asset, desired
			)));
		}
		let (token, token_id) = self.token(asset)?;
		let wants_token = desired == U256::from(1);

		match token.owner_of(token_id).await? {
			None if wants_token => {
				debug!("Minting {} to {}", asset, owner);
				token.mint(owner, token_id).await
			}
			Some(current) if wants_token && current != owner => {
				debug!("Moving {} from {} to {}", asset, current, owner);
				token.force_transfer(current, owner, token_id).await
			}
			Some(current) if !wants_token && current == owner => {
				match self.holders.iter().find(|holder| **holder != owner) {
					Some(holder) => {
						debug!("Moving {} from {} to holder {}", asset, owner, holder);
						token.force_transfer(owner, *holder, token_id).await
					}
					None => {
						debug!("Burning {} held by {}", asset, owner);
						token.burn(token_id).await
					}
				}
			}
			_ => Ok(()),
		}
	}

	async fn allowance(&self, owner: Address, asset: &AssetData) -> Result<U256, AssetError> {
		let (token, token_id) = self.token(asset)?;
		if token.is_approved_for_all(owner, self.proxy).await? {
			return Ok(UNLIMITED_ALLOWANCE);
		}
		let approved = token.get_approved(token_id).await? == self.proxy;
		Ok(U256::from(approved as u8))
	}

	async fn set_allowance(
		&self,
		owner: Address,
		asset: &AssetData,
		desired: U256,
	) -> Result<(), AssetError> {
		let unlimited = desired == UNLIMITED_ALLOWANCE;
		if desired > U256::from(1) && !unlimited {
			return Err(AssetError::Configuration(format!(
				"Allowance for {} can only be set to 0, 1 or unlimited, got {}",
				asset, desired
			)));
		}
		let (token, token_id) = self.token(asset)?;
		if token.owner_of(token_id).await?.is_none() {
			return Err(AssetError::Configuration(format!(
				"Cannot set allowance on non-existent token {}",
				asset
			)));
		}

		// Clearing approve-for-all would change the allowance of every other
		// token the owner holds on this contract.
		if token.is_approved_for_all(owner, self.proxy).await? {
			if unlimited {
				return Ok(());
			}
			return Err(AssetError::Configuration(format!(
				"Cannot set exact allowance for {} while {} has approved the proxy for all tokens",
				asset, owner
			)));
		}

		if unlimited {
			debug!("Approving proxy for all tokens of {} on {}", owner, asset);
			return token.set_approval_for_all(owner, self.proxy, true).await;
		}

		let approved = token.get_approved(token_id).await? == self.proxy;
		match (approved, desired == U256::from(1)) {
			(false, true) => {
				debug!("Approving proxy for {}", asset);
				token.approve(self.proxy, token_id).await
			}
			(true, false) => {
				debug!("Revoking proxy approval for {}", asset);
				token.approve(Address::ZERO, token_id).await
			}
			_ => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryErc721Token;

	const PROXY: Address = Address::repeat_byte(0xaa);
	const OWNER: Address = Address::repeat_byte(1);
	const OTHER: Address = Address::repeat_byte(2);
	const HOLDER: Address = Address::repeat_byte(3);

	fn setup(holders: Vec<Address>) -> (Erc721Adapter, Arc<MemoryErc721Token>, AssetData) {
		let token = Arc::new(MemoryErc721Token::new(Address::repeat_byte(0x72)));
		let adapter = Erc721Adapter::new(PROXY, holders).with_token(token.clone());
		let asset = AssetData::erc721(token.address(), U256::from(7));
		(adapter, token, asset)
	}

	#[tokio::test]
	async fn test_set_balance_mints_transfers_and_moves_away() {
		let (adapter, token, asset) = setup(vec![HOLDER]);
		let one = U256::from(1);

		adapter.set_balance(OWNER, &asset, one).await.unwrap();
		assert_eq!(token.owner_of(U256::from(7)).await.unwrap(), Some(OWNER));

		adapter.set_balance(OTHER, &asset, one).await.unwrap();
		assert_eq!(adapter.balance(OTHER, &asset).await.unwrap(), one);
		assert_eq!(adapter.balance(OWNER, &asset).await.unwrap(), U256::ZERO);

		// already at the desired value
		adapter.set_balance(OTHER, &asset, one).await.unwrap();
		adapter.set_balance(OWNER, &asset, U256::ZERO).await.unwrap();
		assert_eq!(token.owner_of(U256::from(7)).await.unwrap(), Some(OTHER));

		adapter.set_balance(OTHER, &asset, U256::ZERO).await.unwrap();
		assert_eq!(token.owner_of(U256::from(7)).await.unwrap(), Some(HOLDER));
	}

	#[tokio::test]
	async fn test_zero_balance_burns_without_holders() {
		let (adapter, token, asset) = setup(vec![]);
		adapter.set_balance(OWNER, &asset, U256::from(1)).await.unwrap();
		adapter.set_balance(OWNER, &asset, U256::ZERO).await.unwrap();
		assert_eq!(token.owner_of(U256::from(7)).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_balance_above_one_rejected() {
		let (adapter, _, asset) = setup(vec![]);
		let err = adapter
			.set_balance(OWNER, &asset, U256::from(2))
			.await
			.unwrap_err();
		assert!(err.is_configuration());
	}

	#[tokio::test]
	async fn test_single_token_allowance() {
		let (adapter, _, asset) = setup(vec![]);
		adapter.set_balance(OWNER, &asset, U256::from(1)).await.unwrap();

		adapter.set_allowance(OWNER, &asset, U256::from(1)).await.unwrap();
		assert_eq!(adapter.allowance(OWNER, &asset).await.unwrap(), U256::from(1));

		adapter.set_allowance(OWNER, &asset, U256::ZERO).await.unwrap();
		assert_eq!(adapter.allowance(OWNER, &asset).await.unwrap(), U256::ZERO);

		adapter
			.set_allowance(OWNER, &asset, UNLIMITED_ALLOWANCE)
			.await
			.unwrap();
		assert_eq!(
			adapter.allowance(OWNER, &asset).await.unwrap(),
			UNLIMITED_ALLOWANCE
		);
	}

	#[tokio::test]
	async fn test_exact_allowance_refused_under_approve_for_all() {
		let (adapter, token, asset) = setup(vec![]);
		adapter.set_balance(OWNER, &asset, U256::from(1)).await.unwrap();
		token.set_approval_for_all(OWNER, PROXY, true).await.unwrap();

		for desired in [U256::ZERO, U256::from(1)] {
			let err = adapter
				.set_allowance(OWNER, &asset, desired)
				.await
				.unwrap_err();
			assert!(err.is_configuration());
		}
		// blanket approval untouched
		assert!(token.is_approved_for_all(OWNER, PROXY).await.unwrap());
		adapter
			.set_allowance(OWNER, &asset, UNLIMITED_ALLOWANCE)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_allowance_on_missing_token_rejected() {
		let (adapter, _, asset) = setup(vec![]);
		let err = adapter
			.set_allowance(OWNER, &asset, U256::from(1))
			.await
			.unwrap_err();
		assert!(err.is_configuration());
	}
}
