//! Transport layer.
//!
//! The axum adapter that exposes the engine over HTTP.

pub mod http;

pub use http::{AppState, bind, build_router, parse_bind_addr, serve};
