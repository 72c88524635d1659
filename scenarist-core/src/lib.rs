//! `Scenarist` Core: declarative scenario definitions
//!
//! This crate provides the serializable scenario, mock and matcher types,
//! the schema validator applied at every trust boundary, dot-path parsing
//! shared with the state manager, and the configuration error types used by
//! the `scenarist` engine and CLI.

pub mod config;
pub mod error;
pub mod path;
