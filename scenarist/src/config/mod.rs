//! Configuration module
//!
//! Scenario file loading, plus re-exports of the declarative schema and
//! validator from `scenarist-core`.

pub mod loader;

pub use loader::{LoadResult, LoadWarning, LoaderLimits, ScenarioLoader};
pub use scenarist_core::config::schema;
pub use scenarist_core::config::schema::*;
pub use scenarist_core::config::validation;
pub use scenarist_core::config::validation::{ValidationResult, Validator};
