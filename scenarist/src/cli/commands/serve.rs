//! `serve` command.
//!
//! Loads and registers every scenario file, then runs the HTTP adapter
//! until the cancellation token fires.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scenarist_core::config::schema::{ErrorBehaviors, ScenaristConfig};

use crate::cli::args::ServeArgs;
use crate::config::loader::ScenarioLoader;
use crate::dispatch::Scenarist;
use crate::error::ScenaristError;
use crate::transport::http::{self, AppState};

/// Serve scenarios over HTTP.
///
/// # Errors
///
/// Returns a config error if a scenario file fails to load or register,
/// or a transport error if the listener cannot bind.
pub async fn run(args: &ServeArgs, cancel: CancellationToken) -> Result<(), ScenaristError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let scenarist = Arc::new(load_scenarist(args)?);
    scenarist.start();

    let addr = http::parse_bind_addr(&args.bind)?;
    let state = Arc::new(AppState::new(
        Arc::clone(&scenarist),
        args.upstream.clone(),
        cancel.clone(),
    ));
    let router = http::build_router(state)?;
    let (listener, bound) = http::bind(&addr).await?;
    tracing::info!(
        %bound,
        endpoint = %scenarist.config().scenario_endpoint,
        upstream = args.upstream.as_ref().map(url::Url::as_str),
        "ready"
    );

    http::serve(listener, router, cancel).await?;
    scenarist.stop();
    Ok(())
}

/// Runtime options from command-line arguments.
#[must_use]
pub fn runtime_config(args: &ServeArgs) -> ScenaristConfig {
    ScenaristConfig {
        enabled: true,
        strict_mode: args.strict,
        default_scenario_id: args.default_scenario.clone(),
        test_id_header: args.test_id_header.to_ascii_lowercase(),
        default_test_id: args.default_test_id.clone(),
        scenario_endpoint: args.scenario_endpoint.clone(),
        debug_endpoints: args.debug_endpoints,
        expose_error_details: args.expose_error_details,
        error_behaviors: ErrorBehaviors {
            on_no_mock_found: args.on_no_mock_found,
            on_sequence_exhausted: args.on_sequence_exhausted,
            on_missing_test_id: args.on_missing_test_id,
            on_handler_error: args.on_handler_error,
        },
    }
}

/// Builds the engine and registers every scenario file in order.
///
/// # Errors
///
/// Returns the first load or registration error.
pub fn load_scenarist(args: &ServeArgs) -> Result<Scenarist, ScenaristError> {
    let scenarist = Scenarist::new(runtime_config(args));
    let loader = ScenarioLoader::with_defaults();

    for path in &args.scenarios {
        tracing::info!(file = %path.display(), "loading scenarios");
        let loaded = loader.load(path)?;
        for warning in &loaded.warnings {
            tracing::warn!(
                file = %path.display(),
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }
        for definition in loaded.scenarios {
            scenarist.manager().register_scenario(definition)?;
        }
    }

    let default_id = &scenarist.config().default_scenario_id;
    if scenarist.manager().get_scenario_by_id(default_id).is_none() {
        tracing::warn!(
            scenario = %default_id,
            "default scenario is not registered; requests without an active scenario match nothing"
        );
    }
    Ok(scenarist)
}
