//! Scenario enumeration and order construction.
//!
//! [`ScenarioSpace`] describes which values each test dimension may take and
//! enumerates their cartesian product; [`OrderFactory`] turns a single
//! scenario into a concrete, unsigned order.

use oracle_types::Axis;
use thiserror::Error;

pub mod factory;
pub mod generator;

pub use factory::{ActorPool, AmountConstants, AssetPools, OrderFactory};
pub use generator::{generate_combinations, ScenarioSpace};

#[derive(Debug, Error)]
pub enum ScenarioError {
	#[error("Axis {0} has no values")]
	EmptyAxis(Axis),
	#[error("Axis {0} is listed twice")]
	DuplicateAxis(Axis),
	#[error("Value for axis {found} listed under axis {expected}")]
	MixedAxis { expected: Axis, found: Axis },
	#[error("Unknown value '{name}' for axis {axis}")]
	UnknownValue { axis: Axis, name: String },
	#[error("Asset pool error: {0}")]
	Pool(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
}
