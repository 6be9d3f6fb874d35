//! Runs one scenario against the exchange under test.

use crate::expectation::{self, Expectation, FillContext, FillOutcome};
use crate::fillable::{max_fillable_taker_amount, Transferable};
use crate::ledger::{LazyStateStore, StateKind};
use crate::OracleError;
use alloy_primitives::{Address, Bytes, B256, U256};
use oracle_account::AccountInterface;
use oracle_assets::{AssetRouter, UNLIMITED_ALLOWANCE};
use oracle_exchange::{ExchangeError, ExchangeInterface};
use oracle_scenario::OrderFactory;
use oracle_types::{
	partial_amount, AllowanceLevel, AssetData, BalanceLevel, FillAmountKind, FillReceipt,
	FillResults, Order, OrderSignature, Scenario, TraderStateScenario,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Steps of a scenario run, in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleState {
	Init,
	OrderGenerated,
	Signed,
	FillAmountComputed,
	StateMutated,
	ExpectationComputed,
	Executed,
	Asserted,
}

/// Outcome of a scenario whose fill matched the prediction.
#[derive(Debug, Clone)]
pub struct FillReport {
	pub scenario: Scenario,
	pub order_hash: B256,
	pub fill_amount: U256,
	pub outcome: FillOutcome,
}

struct Progress {
	id: String,
	state: OracleState,
}

impl Progress {
	fn advance(&mut self, next: OracleState) {
		debug!("[{}] {:?} -> {:?}", self.id, self.state, next);
		self.state = next;
	}
}

/// Values one trader's asset is forced to before the fill. `None` leaves
/// the current value alone.
#[derive(Debug)]
struct FundingTarget {
	trader: Address,
	asset_data: Bytes,
	balance: Option<U256>,
	allowance: Option<U256>,
}

impl FundingTarget {
	fn new(
		trader: Address,
		asset_data: &Bytes,
		requirement: U256,
		balance: BalanceLevel,
		allowance: AllowanceLevel,
	) -> Result<Self, OracleError> {
		let too_low = || {
			requirement.checked_sub(U256::from(1)).ok_or_else(|| {
				OracleError::Configuration(format!(
					"{} needs nothing of {}, so it cannot be funded below the requirement",
					trader,
					describe(asset_data)
				))
			})
		};
		let balance = match balance {
			BalanceLevel::TooLow => Some(too_low()?),
			BalanceLevel::Exact => Some(requirement),
			BalanceLevel::Higher => None,
		};
		let allowance = match allowance {
			AllowanceLevel::TooLow => Some(too_low()?),
			AllowanceLevel::Exact => Some(requirement),
			AllowanceLevel::Higher => None,
			AllowanceLevel::Unlimited => Some(UNLIMITED_ALLOWANCE),
		};
		Ok(Self {
			trader,
			asset_data: asset_data.clone(),
			balance,
			allowance,
		})
	}
}

fn describe(asset_data: &Bytes) -> String {
	AssetData::decode(asset_data)
		.map(|asset| asset.to_string())
		.unwrap_or_else(|_| asset_data.to_string())
}

fn check<T>(field: &str, expected: T, actual: T) -> Result<(), OracleError>
where
	T: PartialEq + fmt::Display,
{
	if expected == actual {
		Ok(())
	} else {
		Err(OracleError::mismatch(field, expected, actual))
	}
}

/// Drives one scenario from order generation to assertion.
///
/// The oracle owns no chain state of its own. Everything it predicts is
/// derived from reads taken after the traders were funded and before the
/// fill was submitted, so a fresh chain per scenario keeps runs independent.
pub struct FillOracle {
	exchange: Arc<dyn ExchangeInterface>,
	router: Arc<AssetRouter>,
	factory: OrderFactory,
	maker: Arc<dyn AccountInterface>,
	fee_asset_data: Bytes,
}

impl FillOracle {
	pub fn new(
		exchange: Arc<dyn ExchangeInterface>,
		router: Arc<AssetRouter>,
		factory: OrderFactory,
		maker: Arc<dyn AccountInterface>,
	) -> Result<Self, OracleError> {
		if maker.address() != factory.actors().maker {
			return Err(OracleError::Configuration(format!(
				"maker signer {} does not match maker address {}",
				maker.address(),
				factory.actors().maker
			)));
		}
		let fee_asset_data = AssetData::erc20(factory.assets().fee_token).encode();
		Ok(Self {
			exchange,
			router,
			factory,
			maker,
			fee_asset_data,
		})
	}

	pub fn taker(&self) -> Address {
		self.factory.actors().taker
	}

	pub fn factory(&self) -> &OrderFactory {
		&self.factory
	}

	/// Builds the scenario's order against the current block time and runs it.
	pub async fn run(&self, scenario: &Scenario) -> Result<FillReport, OracleError> {
		let now = self.exchange.block_timestamp().await?;
		let order = self.factory.new_order(scenario, now)?;
		self.run_order(scenario, order).await
	}

	/// Runs an already built order. The scenario supplies the fill sizing and
	/// funding levels; its order fields are not consulted.
	pub async fn run_order(
		&self,
		scenario: &Scenario,
		order: Order,
	) -> Result<FillReport, OracleError> {
		let mut progress = Progress {
			id: format!("{:016x}", order.salt >> 192usize),
			state: OracleState::Init,
		};
		let order_hash = order.hash(self.exchange.domain());
		progress.advance(OracleState::OrderGenerated);

		let signature = self.maker.sign_order_hash(&order_hash).await?;
		progress.advance(OracleState::Signed);

		let fill_amount = self
			.compute_taker_fill_amount(scenario, &order, order_hash)
			.await?;
		progress.advance(OracleState::FillAmountComputed);

		self.mutate_trader_state(scenario, &order, order_hash, fill_amount)
			.await?;
		progress.advance(OracleState::StateMutated);

		let expectation = self
			.compute_expected_outcome(&order, order_hash, &signature, fill_amount)
			.await?;
		debug!("[{}] Expecting {:?}", progress.id, expectation.outcome);
		progress.advance(OracleState::ExpectationComputed);

		let result = self
			.exchange
			.fill_order(self.taker(), &order, &signature, fill_amount)
			.await;
		progress.advance(OracleState::Executed);

		let outcome = self
			.assert_outcome(&order, order_hash, &expectation, result)
			.await?;
		progress.advance(OracleState::Asserted);

		info!("[{}] Order {} behaved as expected", progress.id, order_hash);
		Ok(FillReport {
			scenario: *scenario,
			order_hash,
			fill_amount,
			outcome,
		})
	}

	/// Sizes the fill relative to the largest amount every party can fund
	/// right now.
	pub async fn compute_taker_fill_amount(
		&self,
		scenario: &Scenario,
		order: &Order,
		order_hash: B256,
	) -> Result<U256, OracleError> {
		if scenario.fill_amount == FillAmountKind::LessThanRemaining {
			let maker_asset = AssetData::decode(&order.maker_asset_data)?;
			let taker_asset = AssetData::decode(&order.taker_asset_data)?;
			if !maker_asset.is_fungible() || !taker_asset.is_fungible() {
				return Err(OracleError::Configuration(
					"A fill below the remaining amount needs fungible assets on both sides"
						.to_string(),
				));
			}
		}

		let filled = self.exchange.filled(order_hash).await?;
		let cancelled = self.exchange.cancelled(order_hash).await?;
		let taker = self.taker();
		let transferable = Transferable {
			maker_asset: self
				.router
				.transferable(order.maker, &order.maker_asset_data)
				.await?,
			maker_fee: self
				.router
				.transferable(order.maker, &self.fee_asset_data)
				.await?,
			taker_asset: self
				.router
				.transferable(taker, &order.taker_asset_data)
				.await?,
			taker_fee: self
				.router
				.transferable(taker, &self.fee_asset_data)
				.await?,
		};
		let max = max_fillable_taker_amount(
			order,
			order.maker_asset_data == self.fee_asset_data,
			order.taker_asset_data == self.fee_asset_data,
			filled,
			cancelled,
			&transferable,
		)?;

		let amount = match scenario.fill_amount {
			FillAmountKind::Zero => U256::ZERO,
			FillAmountKind::LessThanRemaining => max / U256::from(2),
			FillAmountKind::ExactlyRemaining => max,
			FillAmountKind::GreaterThanRemaining => {
				max.checked_add(U256::from(1)).ok_or_else(|| {
					OracleError::Configuration(
						"Fill amount above the maximum overflows".to_string(),
					)
				})?
			}
		};
		debug!(
			"Fill amount {} ({:?}) of maximum {}",
			amount, scenario.fill_amount, max
		);
		Ok(amount)
	}

	/// Forces both traders' balances and allowances to the scenario's levels,
	/// measured against what the clamped fill requires of them.
	///
	/// Every target is resolved before anything is written, so an impossible
	/// level leaves the chain untouched.
	pub async fn mutate_trader_state(
		&self,
		scenario: &Scenario,
		order: &Order,
		order_hash: B256,
		fill_amount: U256,
	) -> Result<(), OracleError> {
		let filled = self.exchange.filled(order_hash).await?;
		let taker_total = order.taker_asset_amount;
		let clamped = fill_amount.min(taker_total.saturating_sub(filled));
		let share = |total: U256| -> Result<U256, OracleError> {
			if taker_total.is_zero() {
				return Ok(U256::ZERO);
			}
			Ok(partial_amount(clamped, taker_total, total)?)
		};

		let mut targets = self.funding_targets(
			order.maker,
			&order.maker_asset_data,
			share(order.maker_asset_amount)?,
			share(order.maker_fee)?,
			&scenario.maker_state,
		)?;
		targets.extend(self.funding_targets(
			self.taker(),
			&order.taker_asset_data,
			share(taker_total)?,
			share(order.taker_fee)?,
			&scenario.taker_state,
		)?);

		for target in targets {
			// Balance first: moving a non-fungible token clears its approval.
			if let Some(balance) = target.balance {
				debug!(
					"Setting balance of {} in {} to {}",
					target.trader,
					describe(&target.asset_data),
					balance
				);
				self.router
					.set_balance(target.trader, &target.asset_data, balance)
					.await?;
			}
			if let Some(allowance) = target.allowance {
				debug!(
					"Setting allowance of {} in {} to {}",
					target.trader,
					describe(&target.asset_data),
					allowance
				);
				self.router
					.set_allowance(target.trader, &target.asset_data, allowance)
					.await?;
			}
		}
		Ok(())
	}

	fn funding_targets(
		&self,
		trader: Address,
		asset_data: &Bytes,
		primary: U256,
		fee: U256,
		levels: &TraderStateScenario,
	) -> Result<Vec<FundingTarget>, OracleError> {
		if *asset_data == self.fee_asset_data {
			// One pool of funds pays both; the fee axis has nothing left to vary.
			let combined = primary.checked_add(fee).ok_or_else(|| {
				OracleError::Upstream(format!("Requirement of {} overflows", trader))
			})?;
			return Ok(vec![FundingTarget::new(
				trader,
				asset_data,
				combined,
				levels.asset_balance,
				levels.asset_allowance,
			)?]);
		}
		Ok(vec![
			FundingTarget::new(
				trader,
				asset_data,
				primary,
				levels.asset_balance,
				levels.asset_allowance,
			)?,
			FundingTarget::new(
				trader,
				&self.fee_asset_data,
				fee,
				levels.fee_balance,
				levels.fee_allowance,
			)?,
		])
	}

	/// Snapshots the touched state and predicts the fill.
	pub async fn compute_expected_outcome(
		&self,
		order: &Order,
		order_hash: B256,
		signature: &OrderSignature,
		fill_amount: U256,
	) -> Result<Expectation, OracleError> {
		let ctx = FillContext {
			order,
			order_hash,
			signature,
			taker: self.taker(),
			fee_asset_data: &self.fee_asset_data,
			filled: self.exchange.filled(order_hash).await?,
			cancelled: self.exchange.cancelled(order_hash).await?,
			now: self.exchange.block_timestamp().await?,
			fill_amount,
		};
		let mut store = LazyStateStore::new(&self.router);
		expectation::compute_expected_outcome(&ctx, &mut store).await
	}

	async fn assert_outcome(
		&self,
		order: &Order,
		order_hash: B256,
		expectation: &Expectation,
		result: Result<FillReceipt, ExchangeError>,
	) -> Result<FillOutcome, OracleError> {
		match (expectation.outcome, result) {
			(_, Err(ExchangeError::Upstream(e))) => return Err(OracleError::Upstream(e)),
			(FillOutcome::Revert(expected), Err(ExchangeError::Reverted(actual))) => {
				check("revert_reason", expected, actual)?;
			}
			(FillOutcome::Revert(expected), Ok(_)) => {
				return Err(OracleError::mismatch(
					"outcome",
					format!("revert {}", expected),
					"successful fill",
				));
			}
			(FillOutcome::Fill(_), Err(ExchangeError::Reverted(actual))) => {
				return Err(OracleError::mismatch(
					"outcome",
					"successful fill",
					format!("revert {}", actual),
				));
			}
			(FillOutcome::Fill(results), Ok(receipt)) => {
				self.assert_event(order, order_hash, &results, &receipt)?;
			}
		}

		for (key, expected) in &expectation.after {
			let actual = match key.kind {
				StateKind::Balance => self.router.balance(key.account, &key.asset_data).await?,
				StateKind::Allowance => {
					self.router
						.allowance(key.account, &key.asset_data)
						.await?
				}
			};
			check(&key.to_string(), *expected, actual)?;
		}
		let filled = self.exchange.filled(order_hash).await?;
		check("filled", expectation.filled_after, filled)?;

		Ok(expectation.outcome)
	}

	fn assert_event(
		&self,
		order: &Order,
		order_hash: B256,
		results: &FillResults,
		receipt: &FillReceipt,
	) -> Result<(), OracleError> {
		let event = &receipt.event;
		let taker = self.taker();
		check("event.maker", order.maker, event.maker)?;
		check("event.taker", taker, event.taker)?;
		check("event.fee_recipient", order.fee_recipient, event.fee_recipient)?;
		check("event.sender", taker, event.sender)?;
		check(
			"event.maker_asset_data",
			&order.maker_asset_data,
			&event.maker_asset_data,
		)?;
		check(
			"event.taker_asset_data",
			&order.taker_asset_data,
			&event.taker_asset_data,
		)?;
		check("event.order_hash", order_hash, event.order_hash)?;
		check(
			"event.maker_asset_filled_amount",
			results.maker_asset_filled_amount,
			event.results.maker_asset_filled_amount,
		)?;
		check(
			"event.taker_asset_filled_amount",
			results.taker_asset_filled_amount,
			event.results.taker_asset_filled_amount,
		)?;
		check(
			"event.maker_fee_paid",
			results.maker_fee_paid,
			event.results.maker_fee_paid,
		)?;
		check(
			"event.taker_fee_paid",
			results.taker_fee_paid,
			event.results.taker_fee_paid,
		)
	}
}
