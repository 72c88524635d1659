//! Error types for `Scenarist`
//!
//! One enum per domain, aggregated into [`ScenaristError`] for the CLI.
//! Engine-facing errors carry a stable code string so adapters can map them
//! to HTTP responses deterministically.

use thiserror::Error;

pub use scenarist_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `scenarist` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Scenario file error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (bind failed, upstream unreachable)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Usage error (invalid arguments)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `scenarist` operations.
#[derive(Debug, Error)]
pub enum ScenaristError {
    /// Scenario file loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scenario registration or switching error
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Request dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Transport layer error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScenaristError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Scenario(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Dispatch(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Scenario Errors
// ============================================================================

/// Errors from registering or switching scenarios.
///
/// Returned as values, never panicked, so adapters can map them to `400`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    /// Switch to an id that was never registered
    #[error("scenario '{id}' is not registered{}", suggestion.as_ref().map_or_else(String::new, |s| format!(" (did you mean '{s}'?)")))]
    NotFound {
        /// Requested scenario id
        id: String,
        /// Closest registered id, if any is similar enough
        suggestion: Option<String>,
    },

    /// Registration of an id already bound to a different definition
    #[error("scenario '{id}' is already registered with a different definition")]
    Duplicate {
        /// Conflicting scenario id
        id: String,
    },

    /// Definition rejected by validation or pattern compilation
    #[error("scenario '{id}' is invalid: {}", issues.first().map_or_else(String::new, ToString::to_string))]
    Invalid {
        /// Scenario id as given
        id: String,
        /// Every error-level issue found
        issues: Vec<ValidationIssue>,
    },
}

impl ScenarioError {
    /// Stable code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "SCENARIO_NOT_FOUND",
            Self::Duplicate { .. } => "DUPLICATE_SCENARIO",
            Self::Invalid { .. } => "INVALID_SCENARIO",
        }
    }
}

// ============================================================================
// Selection Errors
// ============================================================================

/// Typed outcome when the response selector cannot produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// No candidate mock matched the request
    #[error("no mock matched {method} {url}")]
    NoMockMatched {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// The only matching mocks were exhausted `repeat: none` sequences
    #[error("sequence exhausted for {method} {url}")]
    SequenceExhausted {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// Unexpected failure while resolving a response
    #[error("handler error: {0}")]
    Handler(String),
}

impl SelectionError {
    /// Stable code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoMockMatched { .. } => "NO_MOCK_MATCHED",
            Self::SequenceExhausted { .. } => "SEQUENCE_EXHAUSTED",
            Self::Handler(_) => "HANDLER_ERROR",
        }
    }
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Errors surfaced by the interceptor when the configured behaviour is `throw`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The request carried no test id
    #[error("request has no '{header}' header")]
    MissingTestId {
        /// Header that was consulted
        header: String,
    },

    /// Selection failed
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl DispatchError {
    /// Stable code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingTestId { .. } => "MISSING_TEST_ID",
            Self::Selection(e) => e.code(),
        }
    }
}

// ============================================================================
// Transport Errors
// ============================================================================

/// HTTP adapter errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during transport operations
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid bind address
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    /// Failed to bind the listener
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Scenario endpoint path cannot be routed
    #[error("invalid scenario endpoint '{0}': {1}")]
    InvalidEndpoint(String, String),

    /// Forwarding to the real backend failed
    #[error("upstream request failed: {0}")]
    Upstream(String),
}
