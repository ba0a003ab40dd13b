//! Domain layer types and invariants.

pub mod builds;
pub mod entities;
pub mod error;
pub mod pricing;
pub mod types;
