//! Fill-order test oracle.
//!
//! For one scenario the oracle builds and signs an order, sizes the fill,
//! forces both traders into the scenario's funding state, predicts the
//! exchange's behaviour from a snapshot of the touched token state, submits
//! the fill and checks that the exchange did exactly what was predicted.

use oracle_account::AccountError;
use oracle_assets::AssetError;
use oracle_exchange::ExchangeError;
use oracle_scenario::ScenarioError;
use oracle_types::{AssetDataError, MathError};
use thiserror::Error;

pub mod devnet;
pub mod expectation;
pub mod fillable;
pub mod ledger;
pub mod oracle;

pub use devnet::{Devnet, DevnetSettings, DevnetTokens};
pub use expectation::{Expectation, FillContext, FillOutcome};
pub use fillable::{max_fillable_taker_amount, remaining_taker_amount, Transferable};
pub use ledger::{LazyStateStore, StateKey, StateKind};
pub use oracle::{FillOracle, FillReport, OracleState};

/// Errors that end a scenario run.
#[derive(Debug, Error)]
pub enum OracleError {
	/// The scenario asks for a state that cannot exist. Raised before the
	/// fill is submitted.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The exchange disagreed with the prediction.
	#[error("Mismatch in {field}: expected {expected}, got {actual}")]
	Mismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// A collaborator failed for reasons unrelated to the scenario.
	#[error("Upstream error: {0}")]
	Upstream(String),
}

impl OracleError {
	pub fn mismatch(
		field: impl Into<String>,
		expected: impl std::fmt::Display,
		actual: impl std::fmt::Display,
	) -> Self {
		OracleError::Mismatch {
			field: field.into(),
			expected: expected.to_string(),
			actual: actual.to_string(),
		}
	}
}

impl From<AssetError> for OracleError {
	fn from(err: AssetError) -> Self {
		if err.is_configuration() {
			OracleError::Configuration(err.to_string())
		} else {
			OracleError::Upstream(err.to_string())
		}
	}
}

impl From<AssetDataError> for OracleError {
	fn from(err: AssetDataError) -> Self {
		OracleError::Configuration(err.to_string())
	}
}

impl From<ScenarioError> for OracleError {
	fn from(err: ScenarioError) -> Self {
		OracleError::Configuration(err.to_string())
	}
}

impl From<ExchangeError> for OracleError {
	fn from(err: ExchangeError) -> Self {
		OracleError::Upstream(err.to_string())
	}
}

impl From<AccountError> for OracleError {
	fn from(err: AccountError) -> Self {
		OracleError::Upstream(err.to_string())
	}
}

impl From<MathError> for OracleError {
	fn from(err: MathError) -> Self {
		OracleError::Upstream(err.to_string())
	}
}
