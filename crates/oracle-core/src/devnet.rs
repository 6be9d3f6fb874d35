//! Self-contained development chain.
//!
//! Deploys the dummy tokens at deterministic addresses, pre-funds both
//! traders, and wires an in-memory exchange and asset router over the same
//! token contracts. Every scenario gets its own devnet so no state leaks
//! between runs.

use crate::oracle::FillOracle;
use crate::OracleError;
use alloy_primitives::{keccak256, Address, U256};
use oracle_account::AccountInterface;
use oracle_assets::implementations::memory::{MemoryErc20Token, MemoryErc721Token};
use oracle_assets::{AssetRouter, Erc20Adapter, Erc20Token, Erc721Adapter, Erc721Token};
use oracle_exchange::MemoryExchange;
use oracle_scenario::{ActorPool, AmountConstants, AssetPools, OrderFactory};
use oracle_types::ExchangeDomain;
use std::sync::Arc;
use tracing::{debug, info};

/// Token id minted to the maker.
pub const MAKER_TOKEN_ID: u64 = 1;
/// Token id minted to the taker.
pub const TAKER_TOKEN_ID: u64 = 2;

/// Balance and proxy allowance each trader starts with on every fungible token.
pub fn prefunded_amount() -> U256 {
	U256::from(10u64).pow(U256::from(30))
}

fn contract_address(label: &str) -> Address {
	Address::from_word(keccak256(label))
}

#[derive(Debug, Clone)]
pub struct DevnetSettings {
	pub domain: ExchangeDomain,
	pub erc20_proxy: Address,
	pub erc721_proxy: Address,
	pub fee_recipient: Address,
	pub other_taker: Address,
	pub token_holders: Vec<Address>,
	pub amounts: AmountConstants,
	/// Block time at start-up.
	pub timestamp: u64,
}

/// The deployed token contracts.
pub struct DevnetTokens {
	pub erc20_eighteen_decimals: [Arc<MemoryErc20Token>; 2],
	pub erc20_five_decimals: [Arc<MemoryErc20Token>; 2],
	pub fee_token: Arc<MemoryErc20Token>,
	pub erc721: Arc<MemoryErc721Token>,
}

impl DevnetTokens {
	fn deploy() -> Self {
		let erc20 = |label: &str, decimals: u8| {
			Arc::new(MemoryErc20Token::new(contract_address(label), decimals))
		};
		Self {
			erc20_eighteen_decimals: [erc20("erc20-18-a", 18), erc20("erc20-18-b", 18)],
			erc20_five_decimals: [erc20("erc20-5-a", 5), erc20("erc20-5-b", 5)],
			fee_token: erc20("fee-token", 18),
			erc721: Arc::new(MemoryErc721Token::new(contract_address("erc721"))),
		}
	}

	/// Every fungible token, fee token included.
	pub fn erc20(&self) -> impl Iterator<Item = &Arc<MemoryErc20Token>> {
		self.erc20_eighteen_decimals
			.iter()
			.chain(self.erc20_five_decimals.iter())
			.chain(std::iter::once(&self.fee_token))
	}

	pub fn pools(&self) -> AssetPools {
		AssetPools {
			erc20_eighteen_decimals: [
				self.erc20_eighteen_decimals[0].address(),
				self.erc20_eighteen_decimals[1].address(),
			],
			erc20_five_decimals: [
				self.erc20_five_decimals[0].address(),
				self.erc20_five_decimals[1].address(),
			],
			erc721: self.erc721.address(),
			maker_token_ids: vec![U256::from(MAKER_TOKEN_ID)],
			taker_token_ids: vec![U256::from(TAKER_TOKEN_ID)],
			fee_token: self.fee_token.address(),
		}
	}
}

/// One freshly deployed chain with funded traders.
pub struct Devnet {
	pub exchange: Arc<MemoryExchange>,
	pub router: Arc<AssetRouter>,
	pub tokens: DevnetTokens,
	factory: OrderFactory,
	maker: Arc<dyn AccountInterface>,
}

impl Devnet {
	pub async fn start(
		settings: &DevnetSettings,
		maker: Arc<dyn AccountInterface>,
		taker: Address,
	) -> Result<Self, OracleError> {
		let tokens = DevnetTokens::deploy();
		let maker_address = maker.address();

		let prefunded = prefunded_amount();
		for token in tokens.erc20() {
			debug!(
				"Deployed token {} with {} decimals",
				token.address(),
				token.decimals()
			);
			for owner in [maker_address, taker] {
				token.set_balance(owner, prefunded).await?;
				token.approve(owner, settings.erc20_proxy, prefunded).await?;
			}
		}
		for (owner, id) in [(maker_address, MAKER_TOKEN_ID), (taker, TAKER_TOKEN_ID)] {
			let id = U256::from(id);
			tokens.erc721.mint(owner, id).await?;
			tokens.erc721.approve(settings.erc721_proxy, id).await?;
		}
		debug!("Funded maker {} and taker {}", maker_address, taker);

		let mut erc20_adapter = Erc20Adapter::new(settings.erc20_proxy);
		let mut exchange = MemoryExchange::new(
			settings.domain.clone(),
			settings.erc20_proxy,
			settings.erc721_proxy,
			tokens.fee_token.address(),
			settings.timestamp,
		)
		.with_erc721_token(tokens.erc721.clone());
		for token in tokens.erc20() {
			erc20_adapter = erc20_adapter.with_token(token.clone());
			exchange = exchange.with_erc20_token(token.clone());
		}
		let erc721_adapter =
			Erc721Adapter::new(settings.erc721_proxy, settings.token_holders.clone())
				.with_token(tokens.erc721.clone());
		let router = AssetRouter::new(Box::new(erc20_adapter), Box::new(erc721_adapter))?;

		let factory = OrderFactory::new(
			ActorPool {
				maker: maker_address,
				taker,
				fee_recipient: settings.fee_recipient,
				other_taker: settings.other_taker,
			},
			tokens.pools(),
			settings.amounts.clone(),
		)?;

		info!(
			"Devnet started at {} with exchange {}",
			settings.timestamp, settings.domain.verifying_contract
		);
		Ok(Self {
			exchange: Arc::new(exchange),
			router: Arc::new(router),
			tokens,
			factory,
			maker,
		})
	}

	pub fn maker_address(&self) -> Address {
		self.maker.address()
	}

	/// An oracle bound to this devnet's exchange and tokens.
	pub fn oracle(&self) -> Result<FillOracle, OracleError> {
		FillOracle::new(
			self.exchange.clone(),
			self.router.clone(),
			self.factory.clone(),
			self.maker.clone(),
		)
	}
}
