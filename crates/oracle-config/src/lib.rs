//! Configuration loading for the oracle runner.
//!
//! A TOML file is read, `${VAR}` references are substituted from the
//! environment, the raw document is checked against [`OracleConfigSchema`],
//! and only then deserialized into [`OracleConfig`]. `ORACLE_`-prefixed
//! environment variables override a few runtime settings.

use oracle_scenario::{ScenarioError, ScenarioSpace};
use oracle_types::{Axis, ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

mod serde_helpers;
pub mod types;

pub use types::{AccountsConfig, AmountsConfig, ExchangeConfig, OracleConfig, OracleSettings};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

impl From<ValidationError> for ConfigError {
	fn from(e: ValidationError) -> Self {
		ConfigError::ValidationError(e.to_string())
	}
}

impl From<ScenarioError> for ConfigError {
	fn from(e: ScenarioError) -> Self {
		ConfigError::ValidationError(e.to_string())
	}
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ORACLE_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<OracleConfig, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;
		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		debug!("Read {} bytes of configuration from {}", content.len(), file_path);
		self.parse(&content)
	}

	/// Runs every loading step except reading the file.
	pub fn parse(&self, content: &str) -> Result<OracleConfig, ConfigError> {
		let substituted_content = self.substitute_env_vars(content)?;

		let raw: toml::Value = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;
		OracleConfigSchema.validate(&raw)?;

		let mut config: OracleConfig = raw
			.try_into()
			.map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = regex::Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut OracleConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.oracle.log_level = log_level;
		}

		if let Ok(chain_id) = env::var(format!("{}CHAIN_ID", self.env_prefix)) {
			config.oracle.chain_id = chain_id
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid chain id: {}", e)))?;
		}

		Ok(())
	}

	fn validate_config(&self, config: &OracleConfig) -> Result<(), ConfigError> {
		let exchange = &config.exchange;
		if exchange.erc20_proxy == exchange.erc721_proxy {
			return Err(ConfigError::ValidationError(
				"ERC20 and ERC721 proxies must be different contracts".to_string(),
			));
		}

		let a = &config.amounts;
		for (name, small, large) in [
			("eighteen_decimals", a.small_eighteen_decimals, a.large_eighteen_decimals),
			("five_decimals", a.small_five_decimals, a.large_five_decimals),
			("fee", a.small_fee, a.large_fee),
		] {
			if small.is_zero() || small >= large {
				return Err(ConfigError::ValidationError(format!(
					"amounts.small_{name} must be non-zero and below amounts.large_{name}"
				)));
			}
		}

		// surfaces unknown axis or value names at load time
		scenario_space(config)?;
		Ok(())
	}
}

/// The scenario space named in `[scenarios]`.
pub fn scenario_space(config: &OracleConfig) -> Result<ScenarioSpace, ConfigError> {
	let mut names = BTreeMap::new();
	for (axis, values) in &config.scenarios {
		let axis: Axis = axis
			.parse()
			.map_err(|e: oracle_types::UnknownAxis| ConfigError::ValidationError(e.to_string()))?;
		names.insert(axis, values.clone());
	}
	Ok(ScenarioSpace::from_names(&names)?)
}

/// Configuration schema for the whole runner file.
pub struct OracleConfigSchema;

impl OracleConfigSchema {
	fn signer() -> FieldType {
		FieldType::Table(Schema::new(
			vec![Field::new("private_key", FieldType::String)],
			vec![],
		))
	}

	fn amount(name: &str) -> Field {
		Field::new(name, FieldType::Amount)
	}
}

impl ConfigSchema for OracleConfigSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let oracle = Schema::new(
			vec![
				Field::new("name", FieldType::String),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![Field::new("log_level", FieldType::String)],
		);

		let exchange = Schema::new(
			vec![
				Field::new("name", FieldType::String),
				Field::new("version", FieldType::String),
				Field::new("verifying_contract", FieldType::Address),
				Field::new("erc20_proxy", FieldType::Address),
				Field::new("erc721_proxy", FieldType::Address),
			],
			vec![],
		);

		let accounts = Schema::new(
			vec![
				Field::new("maker", Self::signer()),
				Field::new("taker", Self::signer()),
				Field::new("fee_recipient", FieldType::Address),
				Field::new("other_taker", FieldType::Address),
			],
			vec![Field::new(
				"token_holders",
				FieldType::Array(Box::new(FieldType::Address)),
			)],
		);

		let amounts = Schema::new(
			vec![],
			vec![
				Self::amount("small_eighteen_decimals"),
				Self::amount("large_eighteen_decimals"),
				Self::amount("small_five_decimals"),
				Self::amount("large_five_decimals"),
				Self::amount("small_fee"),
				Self::amount("large_fee"),
				Field::new(
					"expiration_offset_secs",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);

		let scenarios = Field::new("scenarios", FieldType::Table(Schema::new(vec![], vec![])))
			.with_validator(|value| {
				let table = value
					.as_table()
					.ok_or_else(|| "scenarios must be a table".to_string())?;
				for (axis, values) in table {
					let values = values
						.as_array()
						.ok_or_else(|| format!("scenarios.{} must be an array", axis))?;
					if values.iter().any(|v| !v.is_str()) {
						return Err(format!("scenarios.{} must list value names", axis));
					}
				}
				Ok(())
			});

		let schema = Schema::new(
			// Required fields
			vec![
				Field::new("oracle", FieldType::Table(oracle)),
				Field::new("exchange", FieldType::Table(exchange)),
				Field::new("accounts", FieldType::Table(accounts)),
			],
			// Optional fields
			vec![Field::new("amounts", FieldType::Table(amounts)), scenarios],
		);

		schema.validate(config)
	}
}
