//! Scenario to order translation.

use crate::ScenarioError;
use alloy_primitives::{keccak256, Address, U256};
use oracle_types::{
	AmountMagnitude, AssetData, AssetKind, ExpirationKind, FeeMagnitude, FeeRecipientKind, Order,
	Scenario, TakerKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Addresses that play the fixed roles of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPool {
	pub maker: Address,
	pub taker: Address,
	pub fee_recipient: Address,
	/// Named as the order's taker when the scenario wants a mismatch.
	pub other_taker: Address,
}

/// Tokens an order side can draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPools {
	/// Two 18-decimal tokens; the maker side uses the first, the taker the second.
	pub erc20_eighteen_decimals: [Address; 2],
	pub erc20_five_decimals: [Address; 2],
	pub erc721: Address,
	/// Token ids minted to the maker.
	pub maker_token_ids: Vec<U256>,
	/// Token ids minted to the taker.
	pub taker_token_ids: Vec<U256>,
	pub fee_token: Address,
}

/// Concrete values behind the magnitude axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountConstants {
	pub small_eighteen_decimals: U256,
	pub large_eighteen_decimals: U256,
	pub small_five_decimals: U256,
	pub large_five_decimals: U256,
	pub small_fee: U256,
	pub large_fee: U256,
	pub expiration_offset_secs: u64,
}

fn units(whole: u64, decimals: u8) -> U256 {
	U256::from(whole) * U256::from(10u64).pow(U256::from(decimals))
}

impl Default for AmountConstants {
	fn default() -> Self {
		Self {
			small_eighteen_decimals: units(10, 18),
			large_eighteen_decimals: units(1_000, 18),
			small_five_decimals: units(10, 5),
			large_five_decimals: units(1_000, 5),
			small_fee: units(1, 16),
			large_fee: units(100, 18),
			expiration_offset_secs: 600,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
	Maker,
	Taker,
}

/// Deterministically derives an unsigned order from a scenario.
#[derive(Debug, Clone)]
pub struct OrderFactory {
	actors: ActorPool,
	assets: AssetPools,
	amounts: AmountConstants,
}

impl OrderFactory {
	pub fn new(
		actors: ActorPool,
		assets: AssetPools,
		amounts: AmountConstants,
	) -> Result<Self, ScenarioError> {
		if assets.maker_token_ids.is_empty() || assets.taker_token_ids.is_empty() {
			return Err(ScenarioError::Pool(
				"both traders need at least one non-fungible token id".to_string(),
			));
		}
		if let Some(id) = assets
			.maker_token_ids
			.iter()
			.find(|id| assets.taker_token_ids.contains(id))
		{
			return Err(ScenarioError::Pool(format!(
				"token id {} is assigned to both traders",
				id
			)));
		}
		Ok(Self {
			actors,
			assets,
			amounts,
		})
	}

	pub fn actors(&self) -> &ActorPool {
		&self.actors
	}

	pub fn assets(&self) -> &AssetPools {
		&self.assets
	}

	/// Builds the order for `scenario` with expiration relative to `now`.
	pub fn new_order(&self, scenario: &Scenario, now: u64) -> Result<Order, ScenarioError> {
		let o = &scenario.order;
		let offset = self.amounts.expiration_offset_secs;
		let expiration = match o.expiration {
			ExpirationKind::Future => now.saturating_add(offset),
			ExpirationKind::Past => now.saturating_sub(offset),
		};

		let order = Order {
			maker: self.actors.maker,
			taker: match o.taker {
				TakerKind::Unspecified => Address::ZERO,
				TakerKind::Specified => self.actors.taker,
				TakerKind::Mismatched => self.actors.other_taker,
			},
			fee_recipient: match o.fee_recipient {
				FeeRecipientKind::NullAddress => Address::ZERO,
				FeeRecipientKind::UserAddress => self.actors.fee_recipient,
			},
			sender: Address::ZERO,
			maker_asset_amount: self.asset_amount(o.maker_asset, o.maker_asset_amount),
			taker_asset_amount: self.asset_amount(o.taker_asset, o.taker_asset_amount),
			maker_fee: self.fee_amount(o.maker_fee),
			taker_fee: self.fee_amount(o.taker_fee),
			expiration: U256::from(expiration),
			salt: Self::salt(scenario)?,
			maker_asset_data: self.asset_data(o.maker_asset, Side::Maker).encode(),
			taker_asset_data: self.asset_data(o.taker_asset, Side::Taker).encode(),
		};
		debug!("Built order for scenario {}", scenario);
		Ok(order)
	}

	fn asset_data(&self, kind: AssetKind, side: Side) -> AssetData {
		let index = match side {
			Side::Maker => 0,
			Side::Taker => 1,
		};
		match kind {
			AssetKind::Erc20EighteenDecimals => {
				AssetData::erc20(self.assets.erc20_eighteen_decimals[index])
			}
			AssetKind::Erc20FiveDecimals => {
				AssetData::erc20(self.assets.erc20_five_decimals[index])
			}
			AssetKind::FeeToken => AssetData::erc20(self.assets.fee_token),
			AssetKind::Erc721 => {
				let ids = match side {
					Side::Maker => &self.assets.maker_token_ids,
					Side::Taker => &self.assets.taker_token_ids,
				};
				// non-empty, checked in new()
				AssetData::erc721(self.assets.erc721, ids[0])
			}
		}
	}

	fn asset_amount(&self, kind: AssetKind, magnitude: AmountMagnitude) -> U256 {
		let a = &self.amounts;
		match (kind, magnitude) {
			(_, AmountMagnitude::Zero) => U256::ZERO,
			(AssetKind::Erc721, _) => U256::from(1),
			(AssetKind::Erc20FiveDecimals, AmountMagnitude::Small) => a.small_five_decimals,
			(AssetKind::Erc20FiveDecimals, AmountMagnitude::Large) => a.large_five_decimals,
			(_, AmountMagnitude::Small) => a.small_eighteen_decimals,
			(_, AmountMagnitude::Large) => a.large_eighteen_decimals,
		}
	}

	fn fee_amount(&self, magnitude: FeeMagnitude) -> U256 {
		match magnitude {
			FeeMagnitude::Zero => U256::ZERO,
			FeeMagnitude::Small => self.amounts.small_fee,
			FeeMagnitude::Large => self.amounts.large_fee,
		}
	}

	/// Hash of the scenario's JSON form, so equal scenarios share a salt.
	fn salt(scenario: &Scenario) -> Result<U256, ScenarioError> {
		let json =
			serde_json::to_vec(scenario).map_err(|e| ScenarioError::Serialization(e.to_string()))?;
		Ok(U256::from_be_bytes(keccak256(json).0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use oracle_types::ScenarioField;

	fn factory() -> OrderFactory {
		OrderFactory::new(
			ActorPool {
				maker: Address::repeat_byte(0x0a),
				taker: Address::repeat_byte(0x0b),
				fee_recipient: Address::repeat_byte(0x0f),
				other_taker: Address::repeat_byte(0x0c),
			},
			AssetPools {
				erc20_eighteen_decimals: [Address::repeat_byte(0x21), Address::repeat_byte(0x22)],
				erc20_five_decimals: [Address::repeat_byte(0x51), Address::repeat_byte(0x52)],
				erc721: Address::repeat_byte(0x72),
				maker_token_ids: vec![U256::from(1)],
				taker_token_ids: vec![U256::from(2)],
				fee_token: Address::repeat_byte(0x2f),
			},
			AmountConstants::default(),
		)
		.unwrap()
	}

	#[test]
	fn test_default_scenario() {
		let factory = factory();
		let order = factory.new_order(&Scenario::default(), 1_000_000).unwrap();
		assert_eq!(order.taker, Address::ZERO);
		assert_eq!(order.sender, Address::ZERO);
		assert_eq!(order.fee_recipient, Address::repeat_byte(0x0f));
		assert_eq!(order.expiration, U256::from(1_000_600));
		assert_eq!(order.maker_asset_amount, units(1_000, 18));
		assert_eq!(
			AssetData::decode(&order.maker_asset_data).unwrap(),
			AssetData::erc20(Address::repeat_byte(0x21))
		);
		assert_eq!(
			AssetData::decode(&order.taker_asset_data).unwrap(),
			AssetData::erc20(Address::repeat_byte(0x22))
		);
	}

	#[test]
	fn test_amounts_follow_decimal_class() {
		let factory = factory();
		let scenario = Scenario::from_fields(&[
			ScenarioField::MakerAsset(AssetKind::Erc20FiveDecimals),
			ScenarioField::TakerAsset(AssetKind::Erc721),
			ScenarioField::MakerAssetAmount(AmountMagnitude::Small),
			ScenarioField::MakerFee(FeeMagnitude::Large),
			ScenarioField::TakerFee(FeeMagnitude::Zero),
			ScenarioField::Expiration(ExpirationKind::Past),
			ScenarioField::FeeRecipient(FeeRecipientKind::NullAddress),
			ScenarioField::Taker(TakerKind::Mismatched),
		]);
		let order = factory.new_order(&scenario, 1_000_000).unwrap();
		assert_eq!(order.maker_asset_amount, units(10, 5));
		assert_eq!(order.taker_asset_amount, U256::from(1));
		assert_eq!(order.maker_fee, units(100, 18));
		assert_eq!(order.taker_fee, U256::ZERO);
		assert_eq!(order.expiration, U256::from(999_400));
		assert_eq!(order.fee_recipient, Address::ZERO);
		assert_eq!(order.taker, Address::repeat_byte(0x0c));
		assert_eq!(
			AssetData::decode(&order.taker_asset_data).unwrap(),
			AssetData::erc721(Address::repeat_byte(0x72), U256::from(2))
		);
	}

	#[test]
	fn test_zero_non_fungible_amount_stays_zero() {
		let scenario = Scenario::from_fields(&[
			ScenarioField::MakerAsset(AssetKind::Erc721),
			ScenarioField::MakerAssetAmount(AmountMagnitude::Zero),
		]);
		let order = factory().new_order(&scenario, 0).unwrap();
		assert_eq!(order.maker_asset_amount, U256::ZERO);
		// past expiration saturates at zero
		let past = scenario.with(ScenarioField::Expiration(ExpirationKind::Past));
		assert_eq!(factory().new_order(&past, 0).unwrap().expiration, U256::ZERO);
	}

	#[test]
	fn test_salt_is_deterministic_per_scenario() {
		let factory = factory();
		let a = Scenario::default();
		let b = a.with(ScenarioField::TakerFee(FeeMagnitude::Large));
		let salt = |s: &Scenario| factory.new_order(s, 0).unwrap().salt;
		assert_eq!(salt(&a), salt(&a));
		assert_ne!(salt(&a), salt(&b));
	}

	#[test]
	fn test_overlapping_token_ids_rejected() {
		let mut assets = factory().assets().clone();
		assets.taker_token_ids.push(U256::from(1));
		let err = OrderFactory::new(
			factory().actors().clone(),
			assets,
			AmountConstants::default(),
		)
		.unwrap_err();
		assert!(matches!(err, ScenarioError::Pool(_)));
	}
}
