//! Serde helpers for configuration deserialization

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serializer};

/// Reads a `U256` from a base-10 string; TOML integers stop at 63 bits.
pub fn deserialize_decimal_amount<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	U256::from_str_radix(&s, 10)
		.map_err(|e| serde::de::Error::custom(format!("Invalid amount '{}': {}", s, e)))
}

/// Writes a `U256` as a base-10 string.
pub fn serialize_decimal_amount<S>(amount: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&amount.to_string())
}
