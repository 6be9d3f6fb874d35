//! In-memory token contracts.
//!
//! These stand in for deployed dummy tokens on a development chain: state
//! lives behind a lock, privileged mutators are plain method calls, and
//! transfers enforce the same balance and approval rules the real contracts
//! do.

use crate::{AssetError, Erc20Token, Erc721Token, UNLIMITED_ALLOWANCE};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Erc20State {
	balances: HashMap<Address, U256>,
	/// (owner, spender) -> amount
	allowances: HashMap<(Address, Address), U256>,
}

/// Fungible token with freely settable balances.
#[derive(Debug)]
pub struct MemoryErc20Token {
	address: Address,
	decimals: u8,
	state: RwLock<Erc20State>,
}

impl MemoryErc20Token {
	pub fn new(address: Address, decimals: u8) -> Self {
		Self {
			address,
			decimals,
			state: RwLock::new(Erc20State::default()),
		}
	}
}

#[async_trait]
impl Erc20Token for MemoryErc20Token {
	fn address(&self) -> Address {
		self.address
	}

	fn decimals(&self) -> u8 {
		self.decimals
	}

	async fn balance_of(&self, owner: Address) -> Result<U256, AssetError> {
		let state = self.state.read().await;
		Ok(state.balances.get(&owner).copied().unwrap_or_default())
	}

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, AssetError> {
		let state = self.state.read().await;
		Ok(state
			.allowances
			.get(&(owner, spender))
			.copied()
			.unwrap_or_default())
	}

	async fn set_balance(&self, owner: Address, amount: U256) -> Result<(), AssetError> {
		self.state.write().await.balances.insert(owner, amount);
		Ok(())
	}

	async fn approve(
		&self,
		owner: Address,
		spender: Address,
		amount: U256,
	) -> Result<(), AssetError> {
		self.state
			.write()
			.await
			.allowances
			.insert((owner, spender), amount);
		Ok(())
	}

	async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), AssetError> {
		let mut state = self.state.write().await;

		let balance = state.balances.get(&from).copied().unwrap_or_default();
		if balance < amount {
			return Err(AssetError::TransferRejected(format!(
				"{} holds {} of {}, needs {}",
				from, balance, self.address, amount
			)));
		}
		let allowance = state
			.allowances
			.get(&(from, spender))
			.copied()
			.unwrap_or_default();
		if allowance < amount {
			return Err(AssetError::TransferRejected(format!(
				"{} allows {} to move {} of {}, needs {}",
				from, spender, allowance, self.address, amount
			)));
		}
		let receiver = state.balances.get(&to).copied().unwrap_or_default();
		if to != from && receiver.checked_add(amount).is_none() {
			return Err(AssetError::TransferRejected(format!(
				"balance of {} would overflow",
				to
			)));
		}

		if allowance != UNLIMITED_ALLOWANCE {
			state.allowances.insert((from, spender), allowance - amount);
		}
		state.balances.insert(from, balance - amount);
		let receiver = state.balances.get(&to).copied().unwrap_or_default();
		state.balances.insert(to, receiver + amount);
		Ok(())
	}
}

#[derive(Debug, Default)]
struct Erc721State {
	owners: HashMap<U256, Address>,
	approvals: HashMap<U256, Address>,
	/// (owner, operator)
	operators: HashSet<(Address, Address)>,
}

/// Non-fungible token with privileged mint, burn and transfer.
#[derive(Debug)]
pub struct MemoryErc721Token {
	address: Address,
	state: RwLock<Erc721State>,
}

impl MemoryErc721Token {
	pub fn new(address: Address) -> Self {
		Self {
			address,
			state: RwLock::new(Erc721State::default()),
		}
	}

	fn missing(&self, token_id: U256) -> AssetError {
		AssetError::Token(format!("token {}#{} does not exist", self.address, token_id))
	}
}

#[async_trait]
impl Erc721Token for MemoryErc721Token {
	fn address(&self) -> Address {
		self.address
	}

	async fn owner_of(&self, token_id: U256) -> Result<Option<Address>, AssetError> {
		Ok(self.state.read().await.owners.get(&token_id).copied())
	}

	async fn get_approved(&self, token_id: U256) -> Result<Address, AssetError> {
		let state = self.state.read().await;
		Ok(state
			.approvals
			.get(&token_id)
			.copied()
			.unwrap_or(Address::ZERO))
	}

	async fn is_approved_for_all(
		&self,
		owner: Address,
		operator: Address,
	) -> Result<bool, AssetError> {
		Ok(self.state.read().await.operators.contains(&(owner, operator)))
	}

	async fn mint(&self, to: Address, token_id: U256) -> Result<(), AssetError> {
		let mut state = self.state.write().await;
		if to == Address::ZERO {
			return Err(AssetError::Token("cannot mint to the zero address".into()));
		}
		if state.owners.contains_key(&token_id) {
			return Err(AssetError::Token(format!(
				"token {}#{} already exists",
				self.address, token_id
			)));
		}
		state.owners.insert(token_id, to);
		Ok(())
	}

	async fn burn(&self, token_id: U256) -> Result<(), AssetError> {
		let mut state = self.state.write().await;
		state
			.owners
			.remove(&token_id)
			.ok_or_else(|| self.missing(token_id))?;
		state.approvals.remove(&token_id);
		Ok(())
	}

	async fn force_transfer(
		&self,
		from: Address,
		to: Address,
		token_id: U256,
	) -> Result<(), AssetError> {
		let mut state = self.state.write().await;
		let owner = state
			.owners
			.get(&token_id)
			.copied()
			.ok_or_else(|| self.missing(token_id))?;
		if owner != from {
			return Err(AssetError::Token(format!(
				"token {}#{} is owned by {}, not {}",
				self.address, token_id, owner, from
			)));
		}
		state.approvals.remove(&token_id);
		state.owners.insert(token_id, to);
		Ok(())
	}

	async fn approve(&self, approved: Address, token_id: U256) -> Result<(), AssetError> {
		let mut state = self.state.write().await;
		if !state.owners.contains_key(&token_id) {
			return Err(self.missing(token_id));
		}
		if approved == Address::ZERO {
			state.approvals.remove(&token_id);
		} else {
			state.approvals.insert(token_id, approved);
		}
		Ok(())
	}

	async fn set_approval_for_all(
		&self,
		owner: Address,
		operator: Address,
		approved: bool,
	) -> Result<(), AssetError> {
		let mut state = self.state.write().await;
		if approved {
			state.operators.insert((owner, operator));
		} else {
			state.operators.remove(&(owner, operator));
		}
		Ok(())
	}

	async fn transfer_from(
		&self,
		spender: Address,
		from: Address,
		to: Address,
		token_id: U256,
	) -> Result<(), AssetError> {
		let mut state = self.state.write().await;
		let owner = state
			.owners
			.get(&token_id)
			.copied()
			.ok_or_else(|| AssetError::TransferRejected(self.missing(token_id).to_string()))?;
		if owner != from {
			return Err(AssetError::TransferRejected(format!(
				"token {}#{} is owned by {}, not {}",
				self.address, token_id, owner, from
			)));
		}
		if to == Address::ZERO {
			return Err(AssetError::TransferRejected(
				"cannot transfer to the zero address".into(),
			));
		}
		let authorized = spender == owner
			|| state.approvals.get(&token_id) == Some(&spender)
			|| state.operators.contains(&(owner, spender));
		if !authorized {
			return Err(AssetError::TransferRejected(format!(
				"{} is not approved to move {}#{}",
				spender, self.address, token_id
			)));
		}
		state.approvals.remove(&token_id);
		state.owners.insert(token_id, to);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SPENDER: Address = Address::repeat_byte(0xaa);
	const ALICE: Address = Address::repeat_byte(1);
	const BOB: Address = Address::repeat_byte(2);

	#[tokio::test]
	async fn test_erc20_transfer_respects_allowance() {
		let token = MemoryErc20Token::new(Address::repeat_byte(0x20), 18);
		token.set_balance(ALICE, U256::from(100)).await.unwrap();
		token.approve(ALICE, SPENDER, U256::from(40)).await.unwrap();

		assert!(token
			.transfer_from(SPENDER, ALICE, BOB, U256::from(41))
			.await
			.is_err());
		token
			.transfer_from(SPENDER, ALICE, BOB, U256::from(40))
			.await
			.unwrap();
		assert_eq!(token.balance_of(ALICE).await.unwrap(), U256::from(60));
		assert_eq!(token.balance_of(BOB).await.unwrap(), U256::from(40));
		assert_eq!(token.allowance(ALICE, SPENDER).await.unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn test_erc20_unlimited_allowance_not_decremented() {
		let token = MemoryErc20Token::new(Address::repeat_byte(0x20), 18);
		token.set_balance(ALICE, U256::from(100)).await.unwrap();
		token
			.approve(ALICE, SPENDER, UNLIMITED_ALLOWANCE)
			.await
			.unwrap();
		token
			.transfer_from(SPENDER, ALICE, BOB, U256::from(100))
			.await
			.unwrap();
		assert_eq!(
			token.allowance(ALICE, SPENDER).await.unwrap(),
			UNLIMITED_ALLOWANCE
		);
	}

	#[tokio::test]
	async fn test_erc721_transfer_clears_approval() {
		let token = MemoryErc721Token::new(Address::repeat_byte(0x72));
		let id = U256::from(1);
		token.mint(ALICE, id).await.unwrap();
		assert!(token.transfer_from(SPENDER, ALICE, BOB, id).await.is_err());

		token.approve(SPENDER, id).await.unwrap();
		token.transfer_from(SPENDER, ALICE, BOB, id).await.unwrap();
		assert_eq!(token.owner_of(id).await.unwrap(), Some(BOB));
		assert_eq!(token.get_approved(id).await.unwrap(), Address::ZERO);
	}

	#[tokio::test]
	async fn test_erc721_operator_can_move_any_token() {
		let token = MemoryErc721Token::new(Address::repeat_byte(0x72));
		token.mint(ALICE, U256::from(1)).await.unwrap();
		token.mint(ALICE, U256::from(2)).await.unwrap();
		token.set_approval_for_all(ALICE, SPENDER, true).await.unwrap();
		for id in [U256::from(1), U256::from(2)] {
			token.transfer_from(SPENDER, ALICE, BOB, id).await.unwrap();
		}
		assert!(token.mint(BOB, U256::from(1)).await.is_err());
	}
}
