//! Scenario configuration types and validation.

pub mod schema;
pub mod validation;
