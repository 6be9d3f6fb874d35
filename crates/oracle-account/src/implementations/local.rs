//! Local private-key wallet.
//!
//! Suitable for development chains and tests, where keys are well known and
//! live in configuration.

use crate::{AccountError, AccountInterface};
use alloy_primitives::{Address, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use oracle_types::{ConfigSchema, Field, FieldType, OrderSignature, Schema, ValidationError};

/// Wallet holding a single private key in memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex-encoded private key, with or without `0x`.
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		check_private_key(private_key_hex).map_err(AccountError::InvalidKey)?;
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}
}

fn check_private_key(key: &str) -> Result<(), String> {
	let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);

	if key_without_prefix.len() != 64 {
		return Err("Private key must be 64 hex characters (32 bytes)".to_string());
	}

	if hex::decode(key_without_prefix).is_err() {
		return Err("Private key must be valid hexadecimal".to_string());
	}

	Ok(())
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(key) => check_private_key(key),
						None => Err("Private key must be a string".to_string()),
					}
				}),
			],
			// Optional fields
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn address(&self) -> Address {
		self.signer.address()
	}

	async fn sign_order_hash(&self, hash: &B256) -> Result<OrderSignature, AccountError> {
		let signature = self
			.signer
			.sign_hash(hash)
			.await
			.map_err(|e| AccountError::SigningFailed(format!("Failed to sign order: {}", e)))?;

		Ok(OrderSignature::from_eip712(&signature))
	}
}

/// Creates an account provider from a `{ private_key = "..." }` table.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;
	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	Ok(Box::new(LocalWallet::new(private_key)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	// First development-chain account.
	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_signature_recovers_to_wallet() {
		let wallet = LocalWallet::new(KEY).unwrap();
		assert_eq!(
			wallet.address(),
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
				.parse::<Address>()
				.unwrap()
		);

		let hash = B256::repeat_byte(0x42);
		let signature = wallet.sign_order_hash(&hash).await.unwrap();
		assert_eq!(signature.0.len(), OrderSignature::LENGTH);
		assert_eq!(signature.recover(&hash).unwrap(), wallet.address());
		assert_ne!(
			signature.recover(&B256::repeat_byte(0x43)).unwrap(),
			wallet.address()
		);
	}

	#[test]
	fn test_rejects_malformed_keys() {
		assert!(LocalWallet::new("0x1234").is_err());
		assert!(LocalWallet::new(&"zz".repeat(32)).is_err());
	}

	#[tokio::test]
	async fn test_create_from_config() {
		let config: toml::Value = toml::from_str(&format!("private_key = \"{}\"", KEY)).unwrap();
		let account = create_account(&config).unwrap();
		let hash = B256::repeat_byte(7);
		let signature = account.sign_order_hash(&hash).await.unwrap();
		assert_eq!(signature.recover(&hash).unwrap(), account.address());

		let missing: toml::Value = toml::from_str("key = 1").unwrap();
		assert!(create_account(&missing).is_err());
	}
}
