//! Cartesian-product enumeration of scenario dimensions.

use crate::ScenarioError;
use oracle_types::{
	AllowanceLevel, AmountMagnitude, AssetKind, Axis, BalanceLevel, ExpirationKind, FeeMagnitude,
	FeeRecipientKind, FillAmountKind, Scenario, ScenarioField, TakerKind,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Every combination taking one value from each axis.
///
/// The first axis varies slowest and the last fastest. No axes, or any axis
/// without values, yields no combinations.
pub fn generate_combinations<T: Clone>(axes: &[Vec<T>]) -> Vec<Vec<T>> {
	match axes {
		[] => Vec::new(),
		[only] => only.iter().map(|value| vec![value.clone()]).collect(),
		[first, rest @ ..] => {
			let tails = generate_combinations(rest);
			first
				.iter()
				.flat_map(|value| {
					tails.iter().map(move |tail| {
						let mut combination = Vec::with_capacity(tail.len() + 1);
						combination.push(value.clone());
						combination.extend(tail.iter().cloned());
						combination
					})
				})
				.collect()
		}
	}
}

/// The values each scenario dimension ranges over.
///
/// Dimensions without an entry stay at their default. Axes are enumerated in
/// [`Axis`] order regardless of the order they were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioSpace {
	axes: BTreeMap<Axis, Vec<ScenarioField>>,
}

impl ScenarioSpace {
	/// A space holding only the default scenario.
	pub fn pinned() -> Self {
		Self::default()
	}

	/// Every value of every dimension.
	pub fn all() -> Self {
		let axes = Self::axes()
			.into_iter()
			.map(|axis| (axis, Self::values(axis)))
			.collect();
		Self { axes }
	}

	/// Varies `axis` over `values`.
	pub fn with_axis(
		mut self,
		axis: Axis,
		values: Vec<ScenarioField>,
	) -> Result<Self, ScenarioError> {
		if values.is_empty() {
			return Err(ScenarioError::EmptyAxis(axis));
		}
		if let Some(stray) = values.iter().find(|field| field.axis() != axis) {
			return Err(ScenarioError::MixedAxis {
				expected: axis,
				found: stray.axis(),
			});
		}
		if self.axes.contains_key(&axis) {
			return Err(ScenarioError::DuplicateAxis(axis));
		}
		self.axes.insert(axis, values);
		Ok(self)
	}

	/// Builds a space from value names keyed by axis, e.g.
	/// `maker_asset = ["erc20_five_decimals", "erc721"]`.
	pub fn from_names(names: &BTreeMap<Axis, Vec<String>>) -> Result<Self, ScenarioError> {
		names.iter().try_fold(Self::pinned(), |space, (axis, values)| {
			let fields = values
				.iter()
				.map(|name| Self::parse_value(*axis, name))
				.collect::<Result<Vec<_>, _>>()?;
			space.with_axis(*axis, fields)
		})
	}

	/// Number of scenarios in the space.
	pub fn len(&self) -> usize {
		self.axes.values().map(Vec::len).product()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Axes that are varied, in enumeration order.
	pub fn varied_axes(&self) -> impl Iterator<Item = Axis> + '_ {
		self.axes.keys().copied()
	}

	/// Materializes every scenario.
	pub fn scenarios(&self) -> Vec<Scenario> {
		if self.axes.is_empty() {
			return vec![Scenario::default()];
		}
		let axes: Vec<Vec<ScenarioField>> = self.axes.values().cloned().collect();
		generate_combinations(&axes)
			.iter()
			.map(|fields| Scenario::from_fields(fields))
			.collect()
	}

	/// Scenario at `index` in enumeration order, without materializing the
	/// space.
	pub fn get(&self, index: usize) -> Option<Scenario> {
		if index >= self.len() {
			return None;
		}
		let mut rest = index;
		let mut scenario = Scenario::default();
		let mut picked = Vec::with_capacity(self.axes.len());
		for values in self.axes.values().rev() {
			picked.push(values[rest % values.len()]);
			rest /= values.len();
		}
		for field in picked.into_iter().rev() {
			scenario = scenario.with(field);
		}
		Some(scenario)
	}

	/// Lazily walks the space in enumeration order.
	pub fn iter(&self) -> impl Iterator<Item = Scenario> + '_ {
		(0..self.len()).filter_map(move |index| self.get(index))
	}

	pub fn axes() -> [Axis; 18] {
		[
			Axis::FeeRecipient,
			Axis::Taker,
			Axis::MakerAssetAmount,
			Axis::TakerAssetAmount,
			Axis::MakerFee,
			Axis::TakerFee,
			Axis::Expiration,
			Axis::MakerAsset,
			Axis::TakerAsset,
			Axis::FillAmount,
			Axis::MakerAssetBalance,
			Axis::MakerAssetAllowance,
			Axis::MakerFeeBalance,
			Axis::MakerFeeAllowance,
			Axis::TakerAssetBalance,
			Axis::TakerAssetAllowance,
			Axis::TakerFeeBalance,
			Axis::TakerFeeAllowance,
		]
	}

	/// Every value `axis` can take.
	pub fn values(axis: Axis) -> Vec<ScenarioField> {
		fn each<T: Copy>(all: &[T], wrap: fn(T) -> ScenarioField) -> Vec<ScenarioField> {
			all.iter().copied().map(wrap).collect()
		}
		match axis {
			Axis::FeeRecipient => each(&FeeRecipientKind::ALL, ScenarioField::FeeRecipient),
			Axis::Taker => each(&TakerKind::ALL, ScenarioField::Taker),
			Axis::MakerAssetAmount => each(&AmountMagnitude::ALL, ScenarioField::MakerAssetAmount),
			Axis::TakerAssetAmount => each(&AmountMagnitude::ALL, ScenarioField::TakerAssetAmount),
			Axis::MakerFee => each(&FeeMagnitude::ALL, ScenarioField::MakerFee),
			Axis::TakerFee => each(&FeeMagnitude::ALL, ScenarioField::TakerFee),
			Axis::Expiration => each(&ExpirationKind::ALL, ScenarioField::Expiration),
			Axis::MakerAsset => each(&AssetKind::ALL, ScenarioField::MakerAsset),
			Axis::TakerAsset => each(&AssetKind::ALL, ScenarioField::TakerAsset),
			Axis::FillAmount => each(&FillAmountKind::ALL, ScenarioField::FillAmount),
			Axis::MakerAssetBalance => each(&BalanceLevel::ALL, ScenarioField::MakerAssetBalance),
			Axis::MakerAssetAllowance => {
				each(&AllowanceLevel::ALL, ScenarioField::MakerAssetAllowance)
			}
			Axis::MakerFeeBalance => each(&BalanceLevel::ALL, ScenarioField::MakerFeeBalance),
			Axis::MakerFeeAllowance => each(&AllowanceLevel::ALL, ScenarioField::MakerFeeAllowance),
			Axis::TakerAssetBalance => each(&BalanceLevel::ALL, ScenarioField::TakerAssetBalance),
			Axis::TakerAssetAllowance => {
				each(&AllowanceLevel::ALL, ScenarioField::TakerAssetAllowance)
			}
			Axis::TakerFeeBalance => each(&BalanceLevel::ALL, ScenarioField::TakerFeeBalance),
			Axis::TakerFeeAllowance => each(&AllowanceLevel::ALL, ScenarioField::TakerFeeAllowance),
		}
	}

	/// Parses a snake_case value name for `axis`.
	pub fn parse_value(axis: Axis, name: &str) -> Result<ScenarioField, ScenarioError> {
		fn parse<T: DeserializeOwned>(axis: Axis, name: &str) -> Result<T, ScenarioError> {
			serde_json::from_value(serde_json::Value::String(name.to_string())).map_err(|_| {
				ScenarioError::UnknownValue {
					axis,
					name: name.to_string(),
				}
			})
		}
		Ok(match axis {
			Axis::FeeRecipient => ScenarioField::FeeRecipient(parse(axis, name)?),
			Axis::Taker => ScenarioField::Taker(parse(axis, name)?),
			Axis::MakerAssetAmount => ScenarioField::MakerAssetAmount(parse(axis, name)?),
			Axis::TakerAssetAmount => ScenarioField::TakerAssetAmount(parse(axis, name)?),
			Axis::MakerFee => ScenarioField::MakerFee(parse(axis, name)?),
			Axis::TakerFee => ScenarioField::TakerFee(parse(axis, name)?),
			Axis::Expiration => ScenarioField::Expiration(parse(axis, name)?),
			Axis::MakerAsset => ScenarioField::MakerAsset(parse(axis, name)?),
			Axis::TakerAsset => ScenarioField::TakerAsset(parse(axis, name)?),
			Axis::FillAmount => ScenarioField::FillAmount(parse(axis, name)?),
			Axis::MakerAssetBalance => ScenarioField::MakerAssetBalance(parse(axis, name)?),
			Axis::MakerAssetAllowance => ScenarioField::MakerAssetAllowance(parse(axis, name)?),
			Axis::MakerFeeBalance => ScenarioField::MakerFeeBalance(parse(axis, name)?),
			Axis::MakerFeeAllowance => ScenarioField::MakerFeeAllowance(parse(axis, name)?),
			Axis::TakerAssetBalance => ScenarioField::TakerAssetBalance(parse(axis, name)?),
			Axis::TakerAssetAllowance => ScenarioField::TakerAssetAllowance(parse(axis, name)?),
			Axis::TakerFeeBalance => ScenarioField::TakerFeeBalance(parse(axis, name)?),
			Axis::TakerFeeAllowance => ScenarioField::TakerFeeAllowance(parse(axis, name)?),
		})
	}
}
