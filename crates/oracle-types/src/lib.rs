//! Shared types for the fill-order oracle.
//!
//! Everything that crosses a crate boundary lives here: the order model and
//! its EIP-712 hashing, the asset-data codec, the scenario vocabulary, the
//! exchange's revert taxonomy and the proportional-amount arithmetic.

pub mod asset;
pub mod math;
pub mod order;
pub mod scenario;
pub mod validation;

pub use asset::*;
pub use math::*;
pub use order::*;
pub use scenario::*;
pub use validation::*;

/// Re-exported so downstream crates agree on one primitive stack.
pub use alloy_primitives::{Address, Bytes, B256, U256};
