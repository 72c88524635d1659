//! `Scenarist` - scenario-based HTTP mocking for parallel end-to-end tests
//!
//! Tests switch between named sets of mock responses ("scenarios") at
//! runtime. Every piece of runtime state (active scenario, captured
//! values, sequence cursors) is partitioned by a test id carried on each
//! request, so many tests can share one process without seeing each
//! other.
//!
//! The [`Scenarist`] context turns an [`InterceptedRequest`] into a
//! [`Resolution`]; [`transport`] exposes it over HTTP.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod dynamic;
pub mod error;
pub mod observability;
pub mod scenarios;
pub mod state;
pub mod transport;

pub use dispatch::{Interceptor, Resolution, Scenarist};
pub use dynamic::context::InterceptedRequest;
pub use error::{DispatchError, ScenarioError, ScenaristError, SelectionError};
pub use scenarios::ScenarioManager;
