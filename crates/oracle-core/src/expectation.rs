//! Predicting what one fill will do.
//!
//! Every balance and allowance the fill can touch is read into a
//! [`LazyStateStore`] first. The exchange's checks are then replayed against
//! that snapshot, and the four settlement transfers are simulated on a copy
//! of it, so the prediction never depends on reading state the fill changes.

use crate::ledger::{LazyStateStore, StateKey, StateKind};
use crate::OracleError;
use alloy_primitives::{Address, Bytes, B256, U256};
use oracle_assets::UNLIMITED_ALLOWANCE;
use oracle_types::{
	is_rounding_error, AssetData, FillResults, Order, OrderSignature, OrderStatus, RevertReason,
};

/// Predicted result of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
	Fill(FillResults),
	Revert(RevertReason),
}

/// Everything the prediction needs besides token state.
#[derive(Debug, Clone)]
pub struct FillContext<'a> {
	pub order: &'a Order,
	pub order_hash: B256,
	pub signature: &'a OrderSignature,
	/// Fills and submits the transaction.
	pub taker: Address,
	pub fee_asset_data: &'a Bytes,
	pub filled: U256,
	pub cancelled: bool,
	pub now: u64,
	pub fill_amount: U256,
}

/// Prediction plus the touched state on both sides of the fill.
#[derive(Debug, Clone)]
pub struct Expectation {
	pub outcome: FillOutcome,
	pub before: Vec<(StateKey, U256)>,
	/// Same as `before` when a revert is predicted.
	pub after: Vec<(StateKey, U256)>,
	pub filled_before: U256,
	pub filled_after: U256,
}

/// Status the exchange assigns an order before filling it.
pub fn order_status(order: &Order, filled: U256, cancelled: bool, now: u64) -> OrderStatus {
	if order.maker_asset_amount.is_zero() {
		OrderStatus::InvalidMakerAssetAmount
	} else if order.taker_asset_amount.is_zero() {
		OrderStatus::InvalidTakerAssetAmount
	} else if filled >= order.taker_asset_amount {
		OrderStatus::FullyFilled
	} else if U256::from(now) >= order.expiration {
		OrderStatus::Expired
	} else if cancelled {
		OrderStatus::Cancelled
	} else {
		OrderStatus::Fillable
	}
}

/// Balances and allowances a fill of `order` by `taker` can change.
pub fn touched_keys(order: &Order, taker: Address, fee_asset_data: &Bytes) -> Vec<StateKey> {
	let assets = [
		&order.maker_asset_data,
		&order.taker_asset_data,
		fee_asset_data,
	];
	let mut keys = Vec::new();
	let mut push = |key: StateKey| {
		if !keys.contains(&key) {
			keys.push(key);
		}
	};
	for trader in [order.maker, taker] {
		for asset in assets {
			push(StateKey::balance(asset, trader));
			push(StateKey::allowance(asset, trader));
		}
	}
	push(StateKey::balance(fee_asset_data, order.fee_recipient));
	keys
}

/// Snapshots the touched state and predicts the fill against it.
pub async fn compute_expected_outcome(
	ctx: &FillContext<'_>,
	store: &mut LazyStateStore<'_>,
) -> Result<Expectation, OracleError> {
	let keys = touched_keys(ctx.order, ctx.taker, ctx.fee_asset_data);
	let mut before = Vec::with_capacity(keys.len());
	for key in &keys {
		before.push((key.clone(), store.get(key).await?));
	}

	let mut simulated = store.clone();
	let outcome = predict(ctx, &mut simulated)?;

	let (after, filled_after) = match outcome {
		FillOutcome::Revert(_) => (before.clone(), ctx.filled),
		FillOutcome::Fill(results) => {
			let after = keys
				.iter()
				.map(|key| Ok((key.clone(), snapshot_value(&simulated, key)?)))
				.collect::<Result<Vec<_>, OracleError>>()?;
			(after, ctx.filled + results.taker_asset_filled_amount)
		}
	};

	Ok(Expectation {
		outcome,
		before,
		after,
		filled_before: ctx.filled,
		filled_after,
	})
}

/// Replays the exchange's checks in order and simulates settlement.
/// `state` must already hold every touched key.
pub fn predict(
	ctx: &FillContext<'_>,
	state: &mut LazyStateStore<'_>,
) -> Result<FillOutcome, OracleError> {
	let order = ctx.order;

	if order_status(order, ctx.filled, ctx.cancelled, ctx.now) != OrderStatus::Fillable {
		return Ok(FillOutcome::Revert(RevertReason::OrderUnfillable));
	}
	if order.sender != Address::ZERO && order.sender != ctx.taker {
		return Ok(FillOutcome::Revert(RevertReason::InvalidSender));
	}
	if order.taker != Address::ZERO && order.taker != ctx.taker {
		return Ok(FillOutcome::Revert(RevertReason::InvalidTaker));
	}
	if ctx.filled.is_zero() && ctx.signature.recover(&ctx.order_hash).ok() != Some(order.maker) {
		return Ok(FillOutcome::Revert(RevertReason::InvalidOrderSignature));
	}
	if ctx.fill_amount.is_zero() {
		return Ok(FillOutcome::Revert(RevertReason::InvalidTakerAmount));
	}

	let remaining = order.taker_asset_amount - ctx.filled;
	let taker_filled = ctx.fill_amount.min(remaining);
	if is_rounding_error(
		taker_filled,
		order.taker_asset_amount,
		order.maker_asset_amount,
	)? {
		return Ok(FillOutcome::Revert(RevertReason::RoundingError));
	}
	let results = FillResults::compute(order, taker_filled)?;

	let transfers = [
		(
			&order.maker_asset_data,
			order.maker,
			ctx.taker,
			results.maker_asset_filled_amount,
		),
		(
			&order.taker_asset_data,
			ctx.taker,
			order.maker,
			results.taker_asset_filled_amount,
		),
		(
			ctx.fee_asset_data,
			order.maker,
			order.fee_recipient,
			results.maker_fee_paid,
		),
		(
			ctx.fee_asset_data,
			ctx.taker,
			order.fee_recipient,
			results.taker_fee_paid,
		),
	];
	for (asset_data, from, to, amount) in transfers {
		if let Some(reason) = simulate_transfer(state, asset_data, from, to, amount)? {
			return Ok(FillOutcome::Revert(reason));
		}
	}

	Ok(FillOutcome::Fill(results))
}

fn snapshot_value(state: &LazyStateStore<'_>, key: &StateKey) -> Result<U256, OracleError> {
	state
		.cached(key)
		.ok_or_else(|| OracleError::Upstream(format!("{} missing from snapshot", key)))
}

/// Applies one proxy transfer to `state`, or returns why it would fail.
fn simulate_transfer(
	state: &mut LazyStateStore<'_>,
	asset_data: &Bytes,
	from: Address,
	to: Address,
	amount: U256,
) -> Result<Option<RevertReason>, OracleError> {
	let asset = AssetData::decode(asset_data)?;
	let from_balance_key = StateKey::balance(asset_data, from);
	let from_allowance_key = StateKey::allowance(asset_data, from);
	let to_balance_key = StateKey::balance(asset_data, to);
	let from_balance = snapshot_value(state, &from_balance_key)?;
	let allowance = snapshot_value(state, &from_allowance_key)?;

	if asset.is_fungible() {
		if from_balance < amount || allowance < amount {
			return Ok(Some(RevertReason::TransferFailed));
		}
		if from != to {
			let to_balance = snapshot_value(state, &to_balance_key)?;
			let Some(credited) = to_balance.checked_add(amount) else {
				return Ok(Some(RevertReason::TransferFailed));
			};
			state.set(from_balance_key, from_balance - amount);
			state.set(to_balance_key, credited);
		}
		if allowance != UNLIMITED_ALLOWANCE {
			state.set(from_allowance_key, allowance - amount);
		}
		return Ok(None);
	}

	if amount != U256::from(1) {
		return Ok(Some(RevertReason::InvalidAmount));
	}
	if from_balance != U256::from(1) || allowance.is_zero() || to == Address::ZERO {
		return Ok(Some(RevertReason::TransferFailed));
	}
	state.set(from_balance_key, U256::ZERO);
	state.set(to_balance_key, U256::from(1));
	// A move clears the token's single approval; operator approvals remain.
	for account in [from, to] {
		let key = StateKey {
			asset_data: asset_data.clone(),
			account,
			kind: StateKind::Allowance,
		};
		if let Some(value) = state.cached(&key) {
			if value != UNLIMITED_ALLOWANCE {
				state.set(key, U256::ZERO);
			}
		}
	}
	Ok(None)
}
