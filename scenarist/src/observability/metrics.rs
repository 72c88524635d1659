//! Metrics collection.
//!
//! Prometheus-compatible counters and histograms through the `metrics`
//! facade. Labels come from closed enums, never from request data, so
//! cardinality stays bounded whatever the traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ScenaristError;

/// Guard against installing the recorder twice.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// How an intercepted request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A mock response was returned
    Mocked,
    /// The request went to the real network
    Passthrough,
    /// No mock matched (including exhausted sequences)
    NoMatch,
    /// Selection or handler failure
    Error,
    /// The request carried no test id and the behaviour is `throw`
    MissingTestId,
}

impl RequestOutcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mocked => "mocked",
            Self::Passthrough => "passthrough",
            Self::NoMatch => "no_match",
            Self::Error => "error",
            Self::MissingTestId => "missing_test_id",
        }
    }
}

/// Installs the global recorder.
///
/// With `Some(port)` a Prometheus scrape endpoint listens on
/// `127.0.0.1:<port>`; with `None` metrics are recorded without an
/// endpoint. Calls after a successful install are no-ops.
///
/// # Errors
///
/// Returns `ScenaristError::Io` if the recorder or listener cannot be
/// installed (e.g. the port is taken).
pub fn init_metrics(port: Option<u16>) -> Result<(), ScenaristError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }

    let installed = match port {
        Some(p) => PrometheusBuilder::new()
            .with_http_listener(([127, 0, 0, 1], p))
            .install(),
        None => PrometheusBuilder::new().install_recorder().map(|_| ()),
    };
    if let Err(e) = installed {
        METRICS_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(ScenaristError::Io(std::io::Error::other(e.to_string())));
    }

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "scenarist_requests_total",
        "Intercepted requests by outcome"
    );
    describe_counter!(
        "scenarist_scenario_switches_total",
        "Scenario switches across all test ids"
    );
    describe_histogram!(
        "scenarist_selection_duration_seconds",
        "Time spent selecting and resolving a response"
    );
    describe_gauge!(
        "scenarist_scenarios_registered",
        "Number of registered scenarios"
    );
}

/// Records the outcome of an intercepted request.
pub fn record_request(outcome: RequestOutcome) {
    counter!("scenarist_requests_total", "outcome" => outcome.as_str()).increment(1);
}

/// Records a scenario switch.
pub fn record_scenario_switch() {
    counter!("scenarist_scenario_switches_total").increment(1);
}

/// Records how long selection took.
pub fn record_selection_duration(duration: Duration) {
    histogram!("scenarist_selection_duration_seconds").record(duration.as_secs_f64());
}

/// Sets the registered-scenario gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_scenarios_registered(count: usize) {
    gauge!("scenarist_scenarios_registered").set(count as f64);
}
