//! In-memory single-order settlement.
//!
//! Replays the exchange's fill path against in-memory token contracts: order
//! status, sender and taker checks, signature validation on the first fill,
//! fill clamping, the rounding-error guard, and the four proxy transfers.
//! A failing transfer unwinds every transfer before it so a rejected fill
//! leaves no trace, the way a reverted transaction would.

use crate::{ExchangeError, ExchangeInterface};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use oracle_assets::{AssetError, Erc20Token, Erc721Token};
use oracle_types::{
	is_rounding_error, AssetData, ExchangeDomain, FillEvent, FillReceipt, FillResults, Order,
	OrderSignature, OrderStatus, RevertReason,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct ExchangeState {
	filled: HashMap<B256, U256>,
	cancelled: HashSet<B256>,
	timestamp: u64,
}

/// Pre-transfer values needed to undo one transfer.
enum Undo {
	Erc20 {
		token: Arc<dyn Erc20Token>,
		from: Address,
		to: Address,
		from_balance: U256,
		to_balance: U256,
		allowance: U256,
	},
	Erc721 {
		token: Arc<dyn Erc721Token>,
		from: Address,
		to: Address,
		token_id: U256,
		approved: Address,
	},
}

/// Exchange fixture backed by in-memory token contracts.
pub struct MemoryExchange {
	domain: ExchangeDomain,
	erc20_proxy: Address,
	erc721_proxy: Address,
	fee_asset_data: AssetData,
	erc20_tokens: HashMap<Address, Arc<dyn Erc20Token>>,
	erc721_tokens: HashMap<Address, Arc<dyn Erc721Token>>,
	state: RwLock<ExchangeState>,
}

impl MemoryExchange {
	/// Creates an exchange whose fees are paid in `fee_token`.
	pub fn new(
		domain: ExchangeDomain,
		erc20_proxy: Address,
		erc721_proxy: Address,
		fee_token: Address,
		timestamp: u64,
	) -> Self {
		Self {
			domain,
			erc20_proxy,
			erc721_proxy,
			fee_asset_data: AssetData::erc20(fee_token),
			erc20_tokens: HashMap::new(),
			erc721_tokens: HashMap::new(),
			state: RwLock::new(ExchangeState {
				timestamp,
				..Default::default()
			}),
		}
	}

	pub fn with_erc20_token(mut self, token: Arc<dyn Erc20Token>) -> Self {
		self.erc20_tokens.insert(token.address(), token);
		self
	}

	pub fn with_erc721_token(mut self, token: Arc<dyn Erc721Token>) -> Self {
		self.erc721_tokens.insert(token.address(), token);
		self
	}

	pub async fn set_block_timestamp(&self, timestamp: u64) {
		self.state.write().await.timestamp = timestamp;
	}

	/// Marks an order cancelled, as if its maker had cancelled it.
	pub async fn cancel_order(&self, order: &Order) {
		let hash = order.hash(&self.domain);
		info!("Cancelling order {}", hash);
		self.state.write().await.cancelled.insert(hash);
	}

	fn order_status(order: &Order, filled: U256, cancelled: bool, now: u64) -> OrderStatus {
		if order.maker_asset_amount.is_zero() {
			return OrderStatus::InvalidMakerAssetAmount;
		}
		if order.taker_asset_amount.is_zero() {
			return OrderStatus::InvalidTakerAssetAmount;
		}
		if filled >= order.taker_asset_amount {
			return OrderStatus::FullyFilled;
		}
		if U256::from(now) >= order.expiration {
			return OrderStatus::Expired;
		}
		if cancelled {
			return OrderStatus::Cancelled;
		}
		OrderStatus::Fillable
	}

	/// Moves `amount` of `asset_data` through the matching proxy.
	async fn transfer(
		&self,
		asset_data: &[u8],
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<Undo, ExchangeError> {
		let asset = AssetData::decode(asset_data)
			.map_err(|e| ExchangeError::Upstream(format!("Unroutable asset data: {}", e)))?;

		match asset {
			AssetData::Erc20 { token } => {
				let contract = self
					.erc20_tokens
					.get(&token)
					.ok_or_else(|| ExchangeError::Upstream(format!("No token at {}", token)))?;
				let undo = Undo::Erc20 {
					token: contract.clone(),
					from,
					to,
					from_balance: contract.balance_of(from).await.map_err(upstream)?,
					to_balance: contract.balance_of(to).await.map_err(upstream)?,
					allowance: contract
						.allowance(from, self.erc20_proxy)
						.await
						.map_err(upstream)?,
				};
				contract
					.transfer_from(self.erc20_proxy, from, to, amount)
					.await
					.map_err(rejected)?;
				Ok(undo)
			}
			AssetData::Erc721 {
				token, token_id, ..
			} => {
				if amount != U256::from(1) {
					return Err(ExchangeError::Reverted(RevertReason::InvalidAmount));
				}
				let contract = self
					.erc721_tokens
					.get(&token)
					.ok_or_else(|| ExchangeError::Upstream(format!("No token at {}", token)))?;
				let undo = Undo::Erc721 {
					token: contract.clone(),
					from,
					to,
					token_id,
					approved: contract.get_approved(token_id).await.map_err(upstream)?,
				};
				contract
					.transfer_from(self.erc721_proxy, from, to, token_id)
					.await
					.map_err(rejected)?;
				Ok(undo)
			}
		}
	}

	async fn unwind(&self, journal: Vec<Undo>) -> Result<(), ExchangeError> {
		for undo in journal.into_iter().rev() {
			match undo {
				Undo::Erc20 {
					token,
					from,
					to,
					from_balance,
					to_balance,
					allowance,
				} => {
					token.set_balance(to, to_balance).await.map_err(upstream)?;
					token.set_balance(from, from_balance).await.map_err(upstream)?;
					token
						.approve(from, self.erc20_proxy, allowance)
						.await
						.map_err(upstream)?;
				}
				Undo::Erc721 {
					token,
					from,
					to,
					token_id,
					approved,
				} => {
					token
						.force_transfer(to, from, token_id)
						.await
						.map_err(upstream)?;
					if approved != Address::ZERO {
						token.approve(approved, token_id).await.map_err(upstream)?;
					}
				}
			}
		}
		Ok(())
	}

	/// Runs the four settlement transfers, undoing all of them if one fails.
	async fn settle(
		&self,
		order: &Order,
		taker: Address,
		results: &FillResults,
	) -> Result<(), ExchangeError> {
		let fee_asset_data = self.fee_asset_data.encode();
		let transfers = [
			(
				&order.maker_asset_data,
				order.maker,
				taker,
				results.maker_asset_filled_amount,
			),
			(
				&order.taker_asset_data,
				taker,
				order.maker,
				results.taker_asset_filled_amount,
			),
			(
				&fee_asset_data,
				order.maker,
				order.fee_recipient,
				results.maker_fee_paid,
			),
			(
				&fee_asset_data,
				taker,
				order.fee_recipient,
				results.taker_fee_paid,
			),
		];

		let mut journal = Vec::with_capacity(transfers.len());
		for (asset_data, from, to, amount) in transfers {
			match self.transfer(asset_data, from, to, amount).await {
				Ok(undo) => journal.push(undo),
				Err(e) => {
					debug!("Transfer of {} from {} failed: {}", amount, from, e);
					self.unwind(journal).await?;
					return Err(e);
				}
			}
		}
		Ok(())
	}
}

fn upstream(e: AssetError) -> ExchangeError {
	ExchangeError::Upstream(e.to_string())
}

fn rejected(e: AssetError) -> ExchangeError {
	match e {
		AssetError::TransferRejected(_) => ExchangeError::Reverted(RevertReason::TransferFailed),
		other => upstream(other),
	}
}

#[async_trait]
impl ExchangeInterface for MemoryExchange {
	fn domain(&self) -> &ExchangeDomain {
		&self.domain
	}

	async fn fill_order(
		&self,
		taker: Address,
		order: &Order,
		signature: &OrderSignature,
		taker_asset_fill_amount: U256,
	) -> Result<FillReceipt, ExchangeError> {
		let order_hash = order.hash(&self.domain);
		let (filled, cancelled, now) = {
			let state = self.state.read().await;
			(
				state.filled.get(&order_hash).copied().unwrap_or_default(),
				state.cancelled.contains(&order_hash),
				state.timestamp,
			)
		};

		let status = Self::order_status(order, filled, cancelled, now);
		if status != OrderStatus::Fillable {
			debug!("Order {} is {:?}", order_hash, status);
			return Err(ExchangeError::Reverted(RevertReason::OrderUnfillable));
		}
		if order.sender != Address::ZERO && order.sender != taker {
			return Err(ExchangeError::Reverted(RevertReason::InvalidSender));
		}
		if order.taker != Address::ZERO && order.taker != taker {
			return Err(ExchangeError::Reverted(RevertReason::InvalidTaker));
		}
		if filled.is_zero() {
			match signature.recover(&order_hash) {
				Ok(signer) if signer == order.maker => {}
				_ => return Err(ExchangeError::Reverted(RevertReason::InvalidOrderSignature)),
			}
		}

		let remaining = order.taker_asset_amount - filled;
		let taker_filled = taker_asset_fill_amount.min(remaining);
		if taker_asset_fill_amount.is_zero() {
			return Err(ExchangeError::Reverted(RevertReason::InvalidTakerAmount));
		}
		if is_rounding_error(
			taker_filled,
			order.taker_asset_amount,
			order.maker_asset_amount,
		)
		.map_err(|e| ExchangeError::Upstream(e.to_string()))?
		{
			return Err(ExchangeError::Reverted(RevertReason::RoundingError));
		}
		let results = FillResults::compute(order, taker_filled)
			.map_err(|e| ExchangeError::Upstream(e.to_string()))?;

		self.settle(order, taker, &results).await?;
		self.state
			.write()
			.await
			.filled
			.insert(order_hash, filled + taker_filled);

		info!(
			"Filled {} of order {} ({} of {})",
			taker_filled,
			order_hash,
			filled + taker_filled,
			order.taker_asset_amount
		);
		Ok(FillReceipt {
			event: FillEvent {
				maker: order.maker,
				taker,
				fee_recipient: order.fee_recipient,
				sender: taker,
				maker_asset_data: order.maker_asset_data.clone(),
				taker_asset_data: order.taker_asset_data.clone(),
				results,
				order_hash,
			},
		})
	}

	async fn filled(&self, order_hash: B256) -> Result<U256, ExchangeError> {
		let state = self.state.read().await;
		Ok(state.filled.get(&order_hash).copied().unwrap_or_default())
	}

	async fn cancelled(&self, order_hash: B256) -> Result<bool, ExchangeError> {
		Ok(self.state.read().await.cancelled.contains(&order_hash))
	}

	async fn block_timestamp(&self) -> Result<u64, ExchangeError> {
		Ok(self.state.read().await.timestamp)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use oracle_account::{AccountInterface, LocalWallet};
	use oracle_assets::implementations::memory::{MemoryErc20Token, MemoryErc721Token};
	use oracle_assets::UNLIMITED_ALLOWANCE;

	const MAKER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
	const TAKER: Address = Address::repeat_byte(0x0b);
	const RECIPIENT: Address = Address::repeat_byte(0x0f);
	const ERC20_PROXY: Address = Address::repeat_byte(0xa2);
	const ERC721_PROXY: Address = Address::repeat_byte(0xa7);
	const NOW: u64 = 1_700_000_000;

	struct Fixture {
		exchange: MemoryExchange,
		maker: LocalWallet,
		maker_token: Arc<MemoryErc20Token>,
		taker_token: Arc<MemoryErc20Token>,
		fee_token: Arc<MemoryErc20Token>,
		nft: Arc<MemoryErc721Token>,
	}

	fn domain() -> ExchangeDomain {
		ExchangeDomain {
			name: "0x Protocol".to_string(),
			version: "2".to_string(),
			chain_id: 1337,
			verifying_contract: Address::repeat_byte(0xee),
		}
	}

	async fn fixture() -> Fixture {
		let maker = LocalWallet::new(MAKER_KEY).unwrap();
		let maker_token = Arc::new(MemoryErc20Token::new(Address::repeat_byte(0x21), 18));
		let taker_token = Arc::new(MemoryErc20Token::new(Address::repeat_byte(0x22), 18));
		let fee_token = Arc::new(MemoryErc20Token::new(Address::repeat_byte(0x2f), 18));
		let nft = Arc::new(MemoryErc721Token::new(Address::repeat_byte(0x72)));
		for token in [&maker_token, &taker_token, &fee_token] {
			for owner in [maker.address(), TAKER] {
				token.set_balance(owner, U256::from(1_000)).await.unwrap();
				token
					.approve(owner, ERC20_PROXY, UNLIMITED_ALLOWANCE)
					.await
					.unwrap();
			}
		}
		let exchange = MemoryExchange::new(
			domain(),
			ERC20_PROXY,
			ERC721_PROXY,
			fee_token.address(),
			NOW,
		)
		.with_erc20_token(maker_token.clone())
		.with_erc20_token(taker_token.clone())
		.with_erc20_token(fee_token.clone())
		.with_erc721_token(nft.clone());
		Fixture {
			exchange,
			maker,
			maker_token,
			taker_token,
			fee_token,
			nft,
		}
	}

	fn order(f: &Fixture) -> Order {
		Order {
			maker: f.maker.address(),
			taker: Address::ZERO,
			fee_recipient: RECIPIENT,
			sender: Address::ZERO,
			maker_asset_amount: U256::from(200),
			taker_asset_amount: U256::from(100),
			maker_fee: U256::from(10),
			taker_fee: U256::from(10),
			expiration: U256::from(NOW + 600),
			salt: U256::from(1),
			maker_asset_data: AssetData::erc20(f.maker_token.address()).encode(),
			taker_asset_data: AssetData::erc20(f.taker_token.address()).encode(),
		}
	}

	async fn sign(f: &Fixture, order: &Order) -> OrderSignature {
		f.maker
			.sign_order_hash(&order.hash(f.exchange.domain()))
			.await
			.unwrap()
	}

	fn reason(result: Result<FillReceipt, ExchangeError>) -> RevertReason {
		match result {
			Err(ExchangeError::Reverted(reason)) => reason,
			other => panic!("expected a revert, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_partial_then_clamped_fill() {
		let f = fixture().await;
		let order = order(&f);
		let signature = sign(&f, &order).await;

		let receipt = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(50))
			.await
			.unwrap();
		assert_eq!(receipt.event.results.maker_asset_filled_amount, U256::from(100));
		assert_eq!(receipt.event.results.maker_fee_paid, U256::from(5));
		assert_eq!(f.fee_token.balance_of(RECIPIENT).await.unwrap(), U256::from(10));

		// asks for more than remains
		let receipt = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(51))
			.await
			.unwrap();
		assert_eq!(receipt.event.results.taker_asset_filled_amount, U256::from(50));
		assert_eq!(
			f.exchange.filled(receipt.event.order_hash).await.unwrap(),
			U256::from(100)
		);
		assert_eq!(f.maker_token.balance_of(TAKER).await.unwrap(), U256::from(1_200));
		assert_eq!(
			f.taker_token.balance_of(f.maker.address()).await.unwrap(),
			U256::from(1_100)
		);

		let again = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(1))
			.await;
		assert_eq!(reason(again), RevertReason::OrderUnfillable);
	}

	#[tokio::test]
	async fn test_checks_run_in_order() {
		let f = fixture().await;
		let mut order = order(&f);
		order.sender = Address::repeat_byte(0x99);
		order.taker = Address::repeat_byte(0x98);
		let signature = sign(&f, &order).await;
		let fill = |o: Order, s: OrderSignature, amount: u64| {
			let exchange = &f.exchange;
			async move { exchange.fill_order(TAKER, &o, &s, U256::from(amount)).await }
		};

		assert_eq!(
			reason(fill(order.clone(), signature.clone(), 10).await),
			RevertReason::InvalidSender
		);
		order.sender = Address::ZERO;
		let signature = sign(&f, &order).await;
		assert_eq!(
			reason(fill(order.clone(), signature.clone(), 10).await),
			RevertReason::InvalidTaker
		);
		order.taker = TAKER;
		assert_eq!(
			reason(fill(order.clone(), signature, 10).await),
			RevertReason::InvalidOrderSignature
		);
		let signature = sign(&f, &order).await;
		assert_eq!(
			reason(fill(order.clone(), signature.clone(), 0).await),
			RevertReason::InvalidTakerAmount
		);

		order.maker_asset_amount = U256::from(3);
		order.taker_asset_amount = U256::from(1_000);
		let signature = sign(&f, &order).await;
		assert_eq!(
			reason(fill(order.clone(), signature, 1).await),
			RevertReason::RoundingError
		);
	}

	#[tokio::test]
	async fn test_expired_and_cancelled_orders_are_unfillable() {
		let f = fixture().await;
		let order = order(&f);
		let signature = sign(&f, &order).await;

		f.exchange.set_block_timestamp(NOW + 600).await;
		let result = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(1))
			.await;
		assert_eq!(reason(result), RevertReason::OrderUnfillable);

		f.exchange.set_block_timestamp(NOW).await;
		f.exchange.cancel_order(&order).await;
		assert!(f
			.exchange
			.cancelled(order.hash(f.exchange.domain()))
			.await
			.unwrap());
		let result = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(1))
			.await;
		assert_eq!(reason(result), RevertReason::OrderUnfillable);
	}

	#[tokio::test]
	async fn test_failed_fee_transfer_unwinds_earlier_transfers() {
		let f = fixture().await;
		let order = order(&f);
		let signature = sign(&f, &order).await;
		f.fee_token.set_balance(TAKER, U256::from(9)).await.unwrap();

		let result = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(100))
			.await;
		assert_eq!(reason(result), RevertReason::TransferFailed);

		for (token, owner) in [
			(&f.maker_token, f.maker.address()),
			(&f.maker_token, TAKER),
			(&f.taker_token, f.maker.address()),
			(&f.taker_token, TAKER),
			(&f.fee_token, f.maker.address()),
		] {
			assert_eq!(token.balance_of(owner).await.unwrap(), U256::from(1_000));
			assert_eq!(
				token.allowance(owner, ERC20_PROXY).await.unwrap(),
				UNLIMITED_ALLOWANCE
			);
		}
		assert_eq!(f.fee_token.balance_of(RECIPIENT).await.unwrap(), U256::ZERO);
		assert!(f
			.exchange
			.filled(order.hash(f.exchange.domain()))
			.await
			.unwrap()
			.is_zero());
	}

	#[tokio::test]
	async fn test_non_fungible_fill_moves_token() {
		let f = fixture().await;
		let token_id = U256::from(5);
		f.nft.mint(f.maker.address(), token_id).await.unwrap();
		f.nft
			.set_approval_for_all(f.maker.address(), ERC721_PROXY, true)
			.await
			.unwrap();

		let mut order = order(&f);
		order.maker_asset_amount = U256::from(1);
		order.maker_asset_data = AssetData::erc721(f.nft.address(), token_id).encode();
		let signature = sign(&f, &order).await;

		let result = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(99))
			.await;
		assert_eq!(reason(result), RevertReason::RoundingError);

		f.exchange
			.fill_order(TAKER, &order, &signature, U256::from(100))
			.await
			.unwrap();
		assert_eq!(f.nft.owner_of(token_id).await.unwrap(), Some(TAKER));
	}

	#[tokio::test]
	async fn test_non_fungible_amount_must_be_one() {
		let f = fixture().await;
		let token_id = U256::from(6);
		f.nft.mint(f.maker.address(), token_id).await.unwrap();
		f.nft.approve(ERC721_PROXY, token_id).await.unwrap();

		let mut order = order(&f);
		order.maker_asset_amount = U256::from(2);
		order.maker_asset_data = AssetData::erc721(f.nft.address(), token_id).encode();
		let signature = sign(&f, &order).await;
		let result = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(100))
			.await;
		assert_eq!(reason(result), RevertReason::InvalidAmount);
		assert_eq!(
			f.nft.owner_of(token_id).await.unwrap(),
			Some(f.maker.address())
		);
		assert_eq!(f.nft.get_approved(token_id).await.unwrap(), ERC721_PROXY);
	}

	#[tokio::test]
	async fn test_unwind_restores_single_token_approval() {
		let f = fixture().await;
		let token_id = U256::from(8);
		f.nft.mint(f.maker.address(), token_id).await.unwrap();
		f.nft.approve(ERC721_PROXY, token_id).await.unwrap();
		f.taker_token.set_balance(TAKER, U256::ZERO).await.unwrap();

		let mut order = order(&f);
		order.maker_asset_amount = U256::from(1);
		order.maker_asset_data = AssetData::erc721(f.nft.address(), token_id).encode();
		let signature = sign(&f, &order).await;
		let result = f
			.exchange
			.fill_order(TAKER, &order, &signature, U256::from(100))
			.await;
		assert_eq!(reason(result), RevertReason::TransferFailed);
		assert_eq!(
			f.nft.owner_of(token_id).await.unwrap(),
			Some(f.maker.address())
		);
		assert_eq!(f.nft.get_approved(token_id).await.unwrap(), ERC721_PROXY);
	}
}
