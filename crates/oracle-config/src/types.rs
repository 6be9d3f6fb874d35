//! Configuration types for the oracle runner.

use crate::serde_helpers::{deserialize_decimal_amount, serialize_decimal_amount};
use alloy_primitives::{Address, U256};
use oracle_scenario::AmountConstants;
use oracle_types::ExchangeDomain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete runner configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
	/// Runner identity and logging
	pub oracle: OracleSettings,
	/// Exchange under test
	pub exchange: ExchangeConfig,
	/// Trader keys and passive addresses
	pub accounts: AccountsConfig,
	/// Values behind the magnitude axes
	#[serde(default)]
	pub amounts: AmountsConfig,
	/// Value names per varied axis; absent axes stay at their default
	#[serde(default)]
	pub scenarios: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleSettings {
	pub name: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
	pub chain_id: u64,
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Exchange deployment the orders are signed for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
	/// EIP-712 domain name
	pub name: String,
	/// EIP-712 domain version
	pub version: String,
	pub verifying_contract: Address,
	pub erc20_proxy: Address,
	pub erc721_proxy: Address,
}

impl ExchangeConfig {
	pub fn domain(&self, chain_id: u64) -> ExchangeDomain {
		ExchangeDomain {
			name: self.name.clone(),
			version: self.version.clone(),
			chain_id,
			verifying_contract: self.verifying_contract,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsConfig {
	/// Signer table for the maker, e.g. `{ private_key = "0x..." }`
	pub maker: toml::Value,
	/// Signer table for the taker
	pub taker: toml::Value,
	pub fee_recipient: Address,
	/// Address named as taker when a scenario wants a mismatch
	pub other_taker: Address,
	/// Accounts that take non-fungible tokens off a trader's hands
	#[serde(default)]
	pub token_holders: Vec<Address>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AmountsConfig {
	#[serde(
		deserialize_with = "deserialize_decimal_amount",
		serialize_with = "serialize_decimal_amount"
	)]
	pub small_eighteen_decimals: U256,
	#[serde(
		deserialize_with = "deserialize_decimal_amount",
		serialize_with = "serialize_decimal_amount"
	)]
	pub large_eighteen_decimals: U256,
	#[serde(
		deserialize_with = "deserialize_decimal_amount",
		serialize_with = "serialize_decimal_amount"
	)]
	pub small_five_decimals: U256,
	#[serde(
		deserialize_with = "deserialize_decimal_amount",
		serialize_with = "serialize_decimal_amount"
	)]
	pub large_five_decimals: U256,
	#[serde(
		deserialize_with = "deserialize_decimal_amount",
		serialize_with = "serialize_decimal_amount"
	)]
	pub small_fee: U256,
	#[serde(
		deserialize_with = "deserialize_decimal_amount",
		serialize_with = "serialize_decimal_amount"
	)]
	pub large_fee: U256,
	pub expiration_offset_secs: u64,
}

impl Default for AmountsConfig {
	fn default() -> Self {
		AmountConstants::default().into()
	}
}

impl From<AmountConstants> for AmountsConfig {
	fn from(c: AmountConstants) -> Self {
		Self {
			small_eighteen_decimals: c.small_eighteen_decimals,
			large_eighteen_decimals: c.large_eighteen_decimals,
			small_five_decimals: c.small_five_decimals,
			large_five_decimals: c.large_five_decimals,
			small_fee: c.small_fee,
			large_fee: c.large_fee,
			expiration_offset_secs: c.expiration_offset_secs,
		}
	}
}

impl From<&AmountsConfig> for AmountConstants {
	fn from(c: &AmountsConfig) -> Self {
		Self {
			small_eighteen_decimals: c.small_eighteen_decimals,
			large_eighteen_decimals: c.large_eighteen_decimals,
			small_five_decimals: c.small_five_decimals,
			large_five_decimals: c.large_five_decimals,
			small_fee: c.small_fee,
			large_fee: c.large_fee,
			expiration_offset_secs: c.expiration_offset_secs,
		}
	}
}
