//! CLI argument definitions
//!
//! All Clap derive structs for `scenarist` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use scenarist_core::config::schema::{
    DEFAULT_SCENARIO_ENDPOINT, DEFAULT_SCENARIO_ID, DEFAULT_TEST_ID, DEFAULT_TEST_ID_HEADER,
    ErrorBehavior,
};

use crate::observability::LogFormat;

/// Default listen address for `serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:9090";

// ============================================================================
// Root CLI
// ============================================================================

/// Scenario-based HTTP mocking for parallel end-to-end tests.
#[derive(Parser, Debug)]
#[command(name = "scenarist", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "SCENARIST_COLOR")]
    pub color: ColorChoice,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve scenarios over HTTP.
    Serve(ServeArgs),

    /// Validate scenario files without serving them.
    Validate(ValidateArgs),

    /// List the scenarios defined in scenario files.
    List(ListArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Serve Command
// ============================================================================

/// Arguments for `serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Scenario files (YAML or JSON) to register.
    #[arg(
        short,
        long = "scenarios",
        required = true,
        num_args = 1..,
        value_delimiter = ',',
        env = "SCENARIST_SCENARIOS"
    )]
    pub scenarios: Vec<PathBuf>,

    /// Listen on `[host:]port`.
    #[arg(short, long, default_value = DEFAULT_BIND, env = "SCENARIST_BIND")]
    pub bind: String,

    /// Answer unmatched requests with 501 instead of passing through.
    #[arg(long, env = "SCENARIST_STRICT")]
    pub strict: bool,

    /// Base URL that pass-through requests are forwarded to.
    #[arg(long, env = "SCENARIST_UPSTREAM")]
    pub upstream: Option<url::Url>,

    /// Scenario consulted after the active one.
    #[arg(long, default_value = DEFAULT_SCENARIO_ID, env = "SCENARIST_DEFAULT_SCENARIO")]
    pub default_scenario: String,

    /// Header carrying the test id.
    #[arg(long, default_value = DEFAULT_TEST_ID_HEADER, env = "SCENARIST_TEST_ID_HEADER")]
    pub test_id_header: String,

    /// Test id used for requests without one.
    #[arg(long, default_value = DEFAULT_TEST_ID, env = "SCENARIST_DEFAULT_TEST_ID")]
    pub default_test_id: String,

    /// Path of the scenario switch/query endpoint.
    #[arg(
        long,
        default_value = DEFAULT_SCENARIO_ENDPOINT,
        env = "SCENARIST_SCENARIO_ENDPOINT"
    )]
    pub scenario_endpoint: String,

    /// Serve the state and scenario-list debug endpoints.
    #[arg(long, env = "SCENARIST_DEBUG_ENDPOINTS")]
    pub debug_endpoints: bool,

    /// Include internal error messages in 500 responses.
    #[arg(long, env = "SCENARIST_EXPOSE_ERROR_DETAILS")]
    pub expose_error_details: bool,

    /// Behaviour when no mock matches.
    #[arg(long, default_value = "warn", env = "SCENARIST_ON_NO_MOCK_FOUND")]
    pub on_no_mock_found: ErrorBehavior,

    /// Behaviour when a `repeat: none` sequence is exhausted.
    #[arg(long, default_value = "warn", env = "SCENARIST_ON_SEQUENCE_EXHAUSTED")]
    pub on_sequence_exhausted: ErrorBehavior,

    /// Behaviour when a request has no test id.
    #[arg(long, default_value = "warn", env = "SCENARIST_ON_MISSING_TEST_ID")]
    pub on_missing_test_id: ErrorBehavior,

    /// Behaviour when resolving a response fails unexpectedly.
    #[arg(long, default_value = "throw", env = "SCENARIST_ON_HANDLER_ERROR")]
    pub on_handler_error: ErrorBehavior,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "SCENARIST_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log output format.
    #[arg(long, default_value = "human", env = "SCENARIST_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Validate / List Commands
// ============================================================================

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Scenario files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Scenario files to read.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    pub shell: Shell,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
