//! Scenario vocabulary.
//!
//! A scenario is one point in the space of independent test dimensions. Each
//! dimension is a small closed enum; a [`ScenarioField`] pairs a value with
//! the dimension it belongs to so a scenario can be assembled by name rather
//! than by position.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Who receives the fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRecipientKind {
	NullAddress,
	UserAddress,
}

impl FeeRecipientKind {
	pub const ALL: [Self; 2] = [Self::NullAddress, Self::UserAddress];
}

/// How the order's taker field is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakerKind {
	/// Zero address: anyone may fill.
	Unspecified,
	/// The address that actually fills.
	Specified,
	/// Some other address, so the fill must be rejected.
	Mismatched,
}

impl TakerKind {
	pub const ALL: [Self; 3] = [Self::Unspecified, Self::Specified, Self::Mismatched];
}

/// Size of an asset amount, scaled per the asset's decimal class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountMagnitude {
	Zero,
	Small,
	Large,
}

impl AmountMagnitude {
	pub const ALL: [Self; 3] = [Self::Zero, Self::Small, Self::Large];
}

/// Size of a fee, denominated in the fee token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMagnitude {
	Zero,
	Small,
	Large,
}

impl FeeMagnitude {
	pub const ALL: [Self; 3] = [Self::Zero, Self::Small, Self::Large];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationKind {
	Future,
	Past,
}

impl ExpirationKind {
	pub const ALL: [Self; 2] = [Self::Future, Self::Past];
}

/// Which asset pool an order side draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
	Erc20EighteenDecimals,
	Erc20FiveDecimals,
	Erc721,
	/// The token fees are paid in.
	FeeToken,
}

impl AssetKind {
	pub const ALL: [Self; 4] = [
		Self::Erc20EighteenDecimals,
		Self::Erc20FiveDecimals,
		Self::Erc721,
		Self::FeeToken,
	];

	pub fn is_fungible(&self) -> bool {
		!matches!(self, AssetKind::Erc721)
	}
}

/// Requested fill relative to the maximum fillable amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillAmountKind {
	Zero,
	LessThanRemaining,
	ExactlyRemaining,
	GreaterThanRemaining,
}

impl FillAmountKind {
	pub const ALL: [Self; 4] = [
		Self::Zero,
		Self::LessThanRemaining,
		Self::ExactlyRemaining,
		Self::GreaterThanRemaining,
	];
}

/// Balance a trader is funded with, relative to what the fill requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceLevel {
	TooLow,
	Exact,
	/// Leave the pre-funded balance alone.
	#[default]
	Higher,
}

impl BalanceLevel {
	pub const ALL: [Self; 3] = [Self::TooLow, Self::Exact, Self::Higher];
}

/// Allowance a trader grants the asset proxy, relative to the requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowanceLevel {
	TooLow,
	Exact,
	/// Leave the pre-funded allowance alone.
	#[default]
	Higher,
	Unlimited,
}

impl AllowanceLevel {
	pub const ALL: [Self; 4] = [Self::TooLow, Self::Exact, Self::Higher, Self::Unlimited];
}

/// Funding targets for one trader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraderStateScenario {
	pub asset_balance: BalanceLevel,
	pub asset_allowance: AllowanceLevel,
	pub fee_balance: BalanceLevel,
	pub fee_allowance: AllowanceLevel,
}

/// Order-shaping dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderScenario {
	pub fee_recipient: FeeRecipientKind,
	pub taker: TakerKind,
	pub maker_asset_amount: AmountMagnitude,
	pub taker_asset_amount: AmountMagnitude,
	pub maker_fee: FeeMagnitude,
	pub taker_fee: FeeMagnitude,
	pub expiration: ExpirationKind,
	pub maker_asset: AssetKind,
	pub taker_asset: AssetKind,
}

impl Default for OrderScenario {
	fn default() -> Self {
		Self {
			fee_recipient: FeeRecipientKind::UserAddress,
			taker: TakerKind::Unspecified,
			maker_asset_amount: AmountMagnitude::Large,
			taker_asset_amount: AmountMagnitude::Large,
			maker_fee: FeeMagnitude::Small,
			taker_fee: FeeMagnitude::Small,
			expiration: ExpirationKind::Future,
			maker_asset: AssetKind::Erc20EighteenDecimals,
			taker_asset: AssetKind::Erc20EighteenDecimals,
		}
	}
}

/// One test case. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scenario {
	pub order: OrderScenario,
	pub fill_amount: FillAmountKind,
	pub maker_state: TraderStateScenario,
	pub taker_state: TraderStateScenario,
}

impl Default for Scenario {
	fn default() -> Self {
		Self {
			order: OrderScenario::default(),
			fill_amount: FillAmountKind::ExactlyRemaining,
			maker_state: TraderStateScenario::default(),
			taker_state: TraderStateScenario::default(),
		}
	}
}

impl Scenario {
	/// Builds a scenario from the default by applying each field in turn.
	pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a ScenarioField>) -> Self {
		fields
			.into_iter()
			.fold(Self::default(), |scenario, field| scenario.with(*field))
	}

	/// Returns a copy with one dimension replaced.
	pub fn with(mut self, field: ScenarioField) -> Self {
		match field {
			ScenarioField::FeeRecipient(v) => self.order.fee_recipient = v,
			ScenarioField::Taker(v) => self.order.taker = v,
			ScenarioField::MakerAssetAmount(v) => self.order.maker_asset_amount = v,
			ScenarioField::TakerAssetAmount(v) => self.order.taker_asset_amount = v,
			ScenarioField::MakerFee(v) => self.order.maker_fee = v,
			ScenarioField::TakerFee(v) => self.order.taker_fee = v,
			ScenarioField::Expiration(v) => self.order.expiration = v,
			ScenarioField::MakerAsset(v) => self.order.maker_asset = v,
			ScenarioField::TakerAsset(v) => self.order.taker_asset = v,
			ScenarioField::FillAmount(v) => self.fill_amount = v,
			ScenarioField::MakerAssetBalance(v) => self.maker_state.asset_balance = v,
			ScenarioField::MakerAssetAllowance(v) => self.maker_state.asset_allowance = v,
			ScenarioField::MakerFeeBalance(v) => self.maker_state.fee_balance = v,
			ScenarioField::MakerFeeAllowance(v) => self.maker_state.fee_allowance = v,
			ScenarioField::TakerAssetBalance(v) => self.taker_state.asset_balance = v,
			ScenarioField::TakerAssetAllowance(v) => self.taker_state.asset_allowance = v,
			ScenarioField::TakerFeeBalance(v) => self.taker_state.fee_balance = v,
			ScenarioField::TakerFeeAllowance(v) => self.taker_state.fee_allowance = v,
		}
		self
	}

	/// Whether either side trades a non-fungible asset.
	pub fn has_non_fungible_side(&self) -> bool {
		!self.order.maker_asset.is_fungible() || !self.order.taker_asset.is_fungible()
	}
}

impl fmt::Display for Scenario {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let o = &self.order;
		write!(
			f,
			"maker[{:?} {:?} fee:{:?} {}] taker[{:?} {:?} fee:{:?} {}] fill:{:?} exp:{:?} recipient:{:?} taker_field:{:?}",
			o.maker_asset,
			o.maker_asset_amount,
			o.maker_fee,
			TraderLevels(&self.maker_state),
			o.taker_asset,
			o.taker_asset_amount,
			o.taker_fee,
			TraderLevels(&self.taker_state),
			self.fill_amount,
			o.expiration,
			o.fee_recipient,
			o.taker,
		)
	}
}

struct TraderLevels<'a>(&'a TraderStateScenario);

impl fmt::Display for TraderLevels<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"bal:{:?}/{:?} allow:{:?}/{:?}",
			self.0.asset_balance, self.0.fee_balance, self.0.asset_allowance, self.0.fee_allowance
		)
	}
}

/// Names of the scenario dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
	FeeRecipient,
	Taker,
	MakerAssetAmount,
	TakerAssetAmount,
	MakerFee,
	TakerFee,
	Expiration,
	MakerAsset,
	TakerAsset,
	FillAmount,
	MakerAssetBalance,
	MakerAssetAllowance,
	MakerFeeBalance,
	MakerFeeAllowance,
	TakerAssetBalance,
	TakerAssetAllowance,
	TakerFeeBalance,
	TakerFeeAllowance,
}

impl fmt::Display for Axis {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown axis: {0}")]
pub struct UnknownAxis(pub String);

impl FromStr for Axis {
	type Err = UnknownAxis;

	/// Parses the snake_case axis name used in configuration files.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		serde_json::from_value(serde_json::Value::String(s.to_string()))
			.map_err(|_| UnknownAxis(s.to_string()))
	}
}

/// A value tagged with the dimension it sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioField {
	FeeRecipient(FeeRecipientKind),
	Taker(TakerKind),
	MakerAssetAmount(AmountMagnitude),
	TakerAssetAmount(AmountMagnitude),
	MakerFee(FeeMagnitude),
	TakerFee(FeeMagnitude),
	Expiration(ExpirationKind),
	MakerAsset(AssetKind),
	TakerAsset(AssetKind),
	FillAmount(FillAmountKind),
	MakerAssetBalance(BalanceLevel),
	MakerAssetAllowance(AllowanceLevel),
	MakerFeeBalance(BalanceLevel),
	MakerFeeAllowance(AllowanceLevel),
	TakerAssetBalance(BalanceLevel),
	TakerAssetAllowance(AllowanceLevel),
	TakerFeeBalance(BalanceLevel),
	TakerFeeAllowance(AllowanceLevel),
}

impl ScenarioField {
	pub fn axis(&self) -> Axis {
		match self {
			ScenarioField::FeeRecipient(_) => Axis::FeeRecipient,
			ScenarioField::Taker(_) => Axis::Taker,
			ScenarioField::MakerAssetAmount(_) => Axis::MakerAssetAmount,
			ScenarioField::TakerAssetAmount(_) => Axis::TakerAssetAmount,
			ScenarioField::MakerFee(_) => Axis::MakerFee,
			ScenarioField::TakerFee(_) => Axis::TakerFee,
			ScenarioField::Expiration(_) => Axis::Expiration,
			ScenarioField::MakerAsset(_) => Axis::MakerAsset,
			ScenarioField::TakerAsset(_) => Axis::TakerAsset,
			ScenarioField::FillAmount(_) => Axis::FillAmount,
			ScenarioField::MakerAssetBalance(_) => Axis::MakerAssetBalance,
			ScenarioField::MakerAssetAllowance(_) => Axis::MakerAssetAllowance,
			ScenarioField::MakerFeeBalance(_) => Axis::MakerFeeBalance,
			ScenarioField::MakerFeeAllowance(_) => Axis::MakerFeeAllowance,
			ScenarioField::TakerAssetBalance(_) => Axis::TakerAssetBalance,
			ScenarioField::TakerAssetAllowance(_) => Axis::TakerAssetAllowance,
			ScenarioField::TakerFeeBalance(_) => Axis::TakerFeeBalance,
			ScenarioField::TakerFeeAllowance(_) => Axis::TakerFeeAllowance,
		}
	}
}
