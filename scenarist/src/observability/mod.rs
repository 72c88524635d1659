//! Observability module
//!
//! Structured logging and Prometheus metrics.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, init_logging};
pub use metrics::{RequestOutcome, init_metrics};
