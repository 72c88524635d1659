//! Request dispatch.
//!
//! [`Scenarist`] is the context object an interception layer holds: it
//! owns the scenario manager, the response selector and the runtime
//! options, and turns an [`InterceptedRequest`] into a [`Resolution`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use scenarist_core::config::schema::{ErrorBehavior, MockResponse, ScenaristConfig};

use crate::dynamic::context::{HttpRequestContext, InterceptedRequest, extract_context};
use crate::dynamic::selector::{Candidate, ResponseSelector};
use crate::error::{DispatchError, SelectionError};
use crate::observability::metrics::{self, RequestOutcome};
use crate::scenarios::ScenarioManager;

/// Status returned for unmatched requests in strict mode.
pub const STRICT_MODE_STATUS: u16 = 501;

/// What the interception layer should do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Answer with this response
    Respond(MockResponse),
    /// Let the request reach the real network
    Passthrough,
}

/// Routes outgoing requests to mocked responses or the real network.
///
/// How requests are captured (proxy, client middleware, test harness)
/// is up to the implementor's caller; this is the only contract.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Resolves a request.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] when the configured behaviour for the
    /// failure is `throw`.
    async fn intercept(&self, request: InterceptedRequest) -> Result<Resolution, DispatchError>;
}

/// The engine context: scenario manager, selector and options.
#[derive(Debug)]
pub struct Scenarist {
    config: ScenaristConfig,
    manager: ScenarioManager,
    selector: ResponseSelector,
    started: AtomicBool,
}

impl Scenarist {
    /// Creates a context with in-process stores.
    #[must_use]
    pub fn new(config: ScenaristConfig) -> Self {
        Self::with_manager(config, ScenarioManager::in_memory())
    }

    /// Creates a context over an existing manager; the selector shares
    /// its state and sequence stores.
    #[must_use]
    pub fn with_manager(config: ScenaristConfig, manager: ScenarioManager) -> Self {
        let selector = ResponseSelector::new(
            std::sync::Arc::clone(manager.state()),
            std::sync::Arc::clone(manager.sequences()),
        );
        Self {
            config,
            manager,
            selector,
            started: AtomicBool::new(false),
        }
    }

    /// Starts intercepting. Returns `false` if already started.
    pub fn start(&self) -> bool {
        let first = !self.started.swap(true, Ordering::SeqCst);
        if first {
            tracing::info!(
                enabled = self.config.enabled,
                strict = self.config.strict_mode,
                default_scenario = %self.config.default_scenario_id,
                "scenarist started"
            );
        }
        first
    }

    /// Stops intercepting; later requests pass through.
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Runtime options.
    #[must_use]
    pub const fn config(&self) -> &ScenaristConfig {
        &self.config
    }

    /// Scenario manager.
    #[must_use]
    pub const fn manager(&self) -> &ScenarioManager {
        &self.manager
    }

    /// Determines the test id of a request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingTestId`] when the header is absent
    /// and `on_missing_test_id` is `throw`.
    pub fn resolve_test_id(&self, request: &InterceptedRequest) -> Result<String, DispatchError> {
        self.test_id_or_default(request.header(&self.config.test_id_header))
    }

    /// Applies the missing-test-id policy to an already extracted header value.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingTestId`] when `header` is absent or
    /// empty and `on_missing_test_id` is `throw`.
    pub fn test_id_or_default(&self, header: Option<&str>) -> Result<String, DispatchError> {
        if let Some(id) = header
            && !id.is_empty()
        {
            return Ok(id.to_string());
        }
        match self.config.error_behaviors.on_missing_test_id {
            ErrorBehavior::Throw => Err(DispatchError::MissingTestId {
                header: self.config.test_id_header.clone(),
            }),
            ErrorBehavior::Warn => {
                tracing::warn!(
                    header = %self.config.test_id_header,
                    default = %self.config.default_test_id,
                    "request has no test id, using default"
                );
                Ok(self.config.default_test_id.clone())
            }
            ErrorBehavior::Ignore => Ok(self.config.default_test_id.clone()),
        }
    }

    /// Mocks whose method and URL match, in precedence order.
    ///
    /// Active scenario mocks come first. Default scenario mocks follow
    /// unless the active scenario has a criteria-less mock for the same
    /// endpoint.
    #[must_use]
    pub fn candidates(&self, test_id: &str, ctx: &HttpRequestContext) -> Vec<Candidate> {
        let default_id = self.config.default_scenario_id.as_str();
        let mut candidates = Vec::new();
        let mut active_has_fallback = false;

        let active = self
            .manager
            .get_active_scenario(test_id)
            .filter(|active| active.scenario_id != default_id)
            .and_then(|active| self.manager.get_scenario_by_id(&active.scenario_id));
        if let Some(scenario) = active {
            for (mock_index, mock) in scenario.mocks().iter().enumerate() {
                if let Some(params) = mock.matches_endpoint(ctx) {
                    active_has_fallback |= mock.is_fallback();
                    candidates.push(Candidate {
                        scenario: std::sync::Arc::clone(&scenario),
                        mock_index,
                        params,
                    });
                }
            }
        }

        if !active_has_fallback && let Some(scenario) = self.manager.get_scenario_by_id(default_id) {
            for (mock_index, mock) in scenario.mocks().iter().enumerate() {
                if let Some(params) = mock.matches_endpoint(ctx) {
                    candidates.push(Candidate {
                        scenario: std::sync::Arc::clone(&scenario),
                        mock_index,
                        params,
                    });
                }
            }
        }

        candidates
    }

    /// Resolves a request without applying the response delay.
    ///
    /// # Errors
    ///
    /// See [`Interceptor::intercept`].
    pub fn dispatch(&self, request: &InterceptedRequest) -> Result<Resolution, DispatchError> {
        if !self.config.enabled || !self.is_started() {
            metrics::record_request(RequestOutcome::Passthrough);
            return Ok(Resolution::Passthrough);
        }

        let test_id = self.resolve_test_id(request).inspect_err(|_| {
            metrics::record_request(RequestOutcome::MissingTestId);
        })?;
        let ctx = extract_context(request);
        let candidates = self.candidates(&test_id, &ctx);

        let started = Instant::now();
        let selected = self.selector.select_response(&test_id, &ctx, &candidates);
        metrics::record_selection_duration(started.elapsed());

        match selected {
            Ok(selected) => {
                metrics::record_request(RequestOutcome::Mocked);
                Ok(Resolution::Respond(selected.response))
            }
            Err(error) => self.on_selection_error(&test_id, error),
        }
    }

    fn on_selection_error(
        &self,
        test_id: &str,
        error: SelectionError,
    ) -> Result<Resolution, DispatchError> {
        let behaviors = &self.config.error_behaviors;
        let behavior = match &error {
            SelectionError::NoMockMatched { .. } => behaviors.on_no_mock_found,
            SelectionError::SequenceExhausted { .. } => behaviors.on_sequence_exhausted,
            SelectionError::Handler(detail) => {
                metrics::record_request(RequestOutcome::Error);
                tracing::error!(test_id, code = error.code(), "failed to resolve mock response");
                tracing::debug!(test_id, detail = %detail, "handler error detail");
                return match behaviors.on_handler_error {
                    ErrorBehavior::Throw => Err(error.into()),
                    ErrorBehavior::Warn | ErrorBehavior::Ignore => Ok(Resolution::Passthrough),
                };
            }
        };
        metrics::record_request(RequestOutcome::NoMatch);

        if self.config.strict_mode {
            tracing::debug!(test_id, code = error.code(), "strict mode: answering 501");
            return Ok(Resolution::Respond(MockResponse::json(
                STRICT_MODE_STATUS,
                json!({"error": error.code(), "message": error.to_string()}),
            )));
        }

        match behavior {
            ErrorBehavior::Throw => Err(error.into()),
            ErrorBehavior::Warn => {
                tracing::warn!(test_id, code = error.code(), "{error}; passing through");
                Ok(Resolution::Passthrough)
            }
            ErrorBehavior::Ignore => Ok(Resolution::Passthrough),
        }
    }
}

#[async_trait]
impl Interceptor for Scenarist {
    /// Resolves a request, then waits out the response `delay`.
    ///
    /// Dropping the returned future cancels the delay.
    async fn intercept(&self, request: InterceptedRequest) -> Result<Resolution, DispatchError> {
        let resolution = self.dispatch(&request)?;
        if let Resolution::Respond(response) = &resolution
            && let Some(delay) = response.delay.filter(|d| *d > 0)
        {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(resolution)
    }
}
