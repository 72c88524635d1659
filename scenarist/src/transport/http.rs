//! HTTP adapter.
//!
//! Serves the scenario control endpoints and intercepts every other
//! request with axum. Mocked responses are synthesized from the selected
//! [`MockResponse`]; pass-through requests are forwarded with `reqwest`
//! to the absolute request URI (forward-proxy style) or the configured
//! upstream.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use scenarist_core::config::schema::MockResponse;

use crate::dispatch::{Interceptor, Resolution, Scenarist};
use crate::dynamic::context::InterceptedRequest;
use crate::error::{DispatchError, SelectionError, TransportError};

/// Path of the per-test state debug endpoint.
pub const DEBUG_STATE_PATH: &str = "/__scenarist__/state";

/// Path of the scenario list debug endpoint.
pub const DEBUG_SCENARIOS_PATH: &str = "/__scenarist__/scenarios";

/// Maximum accepted request body size.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Shared state behind every handler.
#[derive(Debug)]
pub struct AppState {
    scenarist: Arc<Scenarist>,
    client: reqwest::Client,
    upstream: Option<Url>,
    cancel: CancellationToken,
}

impl AppState {
    /// Creates handler state with a default HTTP client.
    #[must_use]
    pub fn new(scenarist: Arc<Scenarist>, upstream: Option<Url>, cancel: CancellationToken) -> Self {
        Self::with_client(scenarist, reqwest::Client::new(), upstream, cancel)
    }

    /// Creates handler state with a caller-supplied HTTP client.
    #[must_use]
    pub const fn with_client(
        scenarist: Arc<Scenarist>,
        client: reqwest::Client,
        upstream: Option<Url>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            scenarist,
            client,
            upstream,
            cancel,
        }
    }

    /// The engine context.
    #[must_use]
    pub const fn scenarist(&self) -> &Arc<Scenarist> {
        &self.scenarist
    }

    fn test_id(&self, headers: &HeaderMap) -> Result<String, DispatchError> {
        let name = &self.scenarist.config().test_id_header;
        let value = headers.get(name.as_str()).and_then(|v| v.to_str().ok());
        self.scenarist.test_id_or_default(value)
    }
}

// ============================================================================
// Axum Router
// ============================================================================

/// Builds the router: control endpoints, optional debug endpoints, and a
/// fallback that intercepts everything else.
///
/// # Errors
///
/// Returns [`TransportError::InvalidEndpoint`] if the configured scenario
/// endpoint is not a plain absolute path.
pub fn build_router(state: Arc<AppState>) -> Result<Router, TransportError> {
    let config = state.scenarist.config();
    let endpoint = config.scenario_endpoint.clone();
    check_endpoint(&endpoint)?;

    let mut router = Router::new().route(&endpoint, get(get_active_scenario).post(switch_scenario));
    if config.debug_endpoints {
        router = router
            .route(DEBUG_STATE_PATH, get(debug_state))
            .route(DEBUG_SCENARIOS_PATH, get(debug_scenarios));
    }

    Ok(router
        .fallback(intercept)
        .layer(DefaultBodyLimit::max(DEFAULT_MAX_BODY_SIZE))
        .with_state(state))
}

fn check_endpoint(endpoint: &str) -> Result<(), TransportError> {
    let invalid = |reason: &str| TransportError::InvalidEndpoint(endpoint.to_string(), reason.to_string());
    if !endpoint.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if endpoint.contains(['{', '}', '*', '?', '#']) || endpoint.split('/').any(|s| s.starts_with(':')) {
        return Err(invalid("must be a literal path"));
    }
    if endpoint.starts_with("/__scenarist__/") {
        return Err(invalid("collides with the debug endpoints"));
    }
    Ok(())
}

// ============================================================================
// Control Endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    scenario: String,
    #[serde(default)]
    variant: Option<String>,
}

/// `POST <scenario_endpoint>`: switch the caller's active scenario.
async fn switch_scenario(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let test_id = match state.test_id(&headers) {
        Ok(id) => id,
        Err(e) => return dispatch_error(&state, &e),
    };

    let request: SwitchRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({"error": format!("invalid request body: {e}")})),
            )
                .into_response();
        }
    };

    match state
        .scenarist
        .manager()
        .switch_scenario(&test_id, &request.scenario, request.variant)
    {
        Ok(active) => {
            let mut body = json!({
                "success": true,
                "testId": test_id,
                "scenarioId": active.scenario_id,
            });
            if let Some(variant) = active.variant_name {
                body["variant"] = Value::String(variant);
            }
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"error": e.to_string(), "code": e.code()})),
        )
            .into_response(),
    }
}

/// `GET <scenario_endpoint>`: the caller's active scenario.
async fn get_active_scenario(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let test_id = match state.test_id(&headers) {
        Ok(id) => id,
        Err(e) => return dispatch_error(&state, &e),
    };

    let manager = state.scenarist.manager();
    let Some(active) = manager.get_active_scenario(&test_id) else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"error": "no active scenario for this test id", "testId": test_id})),
        )
            .into_response();
    };

    let name = manager
        .get_scenario_by_id(&active.scenario_id)
        .map_or_else(|| active.scenario_id.clone(), |s| s.definition().name.clone());
    let mut body = json!({
        "testId": test_id,
        "scenarioId": active.scenario_id,
        "scenarioName": name,
    });
    if let Some(variant) = active.variant_name {
        body["variantName"] = Value::String(variant);
    }
    (StatusCode::OK, axum::Json(body)).into_response()
}

/// `GET /__scenarist__/state`: raw state of the caller's test id.
async fn debug_state(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match state.test_id(&headers) {
        Ok(test_id) => {
            let values = state.scenarist.manager().state().get_all(&test_id);
            axum::Json(json!({"testId": test_id, "state": values})).into_response()
        }
        Err(e) => dispatch_error(&state, &e),
    }
}

/// `GET /__scenarist__/scenarios`: registered scenarios.
async fn debug_scenarios(State(state): State<Arc<AppState>>) -> Response {
    let scenarios: Vec<Value> = state
        .scenarist
        .manager()
        .list_scenarios()
        .iter()
        .map(|s| {
            let definition = s.definition();
            json!({
                "id": definition.id,
                "name": definition.name,
                "description": definition.description,
                "mockCount": s.mocks().len(),
            })
        })
        .collect();
    axum::Json(Value::Array(scenarios)).into_response()
}

// ============================================================================
// Interception
// ============================================================================

/// Fallback handler: resolve, then answer with the mock or forward.
///
/// A client disconnect drops this future, which cancels any pending
/// response delay; shutdown cancels it through the token.
async fn intercept(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = InterceptedRequest {
        method: method.as_str().to_string(),
        url: request_url(&uri, &headers),
        headers: header_pairs(&headers),
        body: body.clone(),
    };

    let resolution = tokio::select! {
        resolution = state.scenarist.intercept(request) => resolution,
        () = state.cancel.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
        }
    };

    match resolution {
        Ok(Resolution::Respond(response)) => mock_response(response),
        Ok(Resolution::Passthrough) => forward(&state, method, &uri, &headers, body).await,
        Err(e) => dispatch_error(&state, &e),
    }
}

/// Reconstructs the request URL: absolute-form URIs as-is, otherwise
/// `http://<host><path>` or just the path without a `Host` header.
fn request_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path.to_string(),
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Converts a selected mock into an HTTP response.
///
/// Bodies are always JSON-encoded; `content-type` defaults to
/// `application/json` when a body is present and the mock sets none.
fn mock_response(mock: MockResponse) -> Response {
    let status = StatusCode::from_u16(mock.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    for (name, value) in &mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!(header = %name, "skipping mock header that is not valid HTTP"),
        }
    }

    let body = match &mock.body {
        Some(value) => {
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            match serde_json::to_vec(value) {
                Ok(bytes) => Body::from(bytes),
                Err(e) => {
                    warn!(error = %e, "failed to encode mock body");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }
        None => Body::empty(),
    };

    (status, headers, body).into_response()
}

/// Forwards a pass-through request and relays the real response.
async fn forward(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let Some(target) = pass_through_target(uri, state.upstream.as_ref()) else {
        debug!(%uri, "pass-through without upstream");
        return (
            StatusCode::BAD_GATEWAY,
            axum::Json(json!({"error": "no upstream configured for pass-through"})),
        )
            .into_response();
    };

    let outgoing = state
        .client
        .request(method, target.clone())
        .headers(strip_hop_by_hop(headers))
        .body(body);

    let result = tokio::select! {
        result = outgoing.send() => result,
        () = state.cancel.cancelled() => {
            return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
        }
    };

    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => {
            let error = TransportError::Upstream(e.to_string());
            warn!(%target, "{error}");
            return (
                StatusCode::BAD_GATEWAY,
                axum::Json(json!({"error": "upstream request failed"})),
            )
                .into_response();
        }
    };

    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());
    match upstream.bytes().await {
        Ok(bytes) => (status, headers, bytes).into_response(),
        Err(e) => {
            warn!(%target, error = %e, "failed to read upstream body");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Absolute-form request URIs are forwarded as-is; origin-form paths are
/// resolved against the upstream base URL.
fn pass_through_target(uri: &Uri, upstream: Option<&Url>) -> Option<Url> {
    if uri.scheme().is_some() {
        return Url::parse(&uri.to_string()).ok();
    }
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    upstream.and_then(|base| base.join(path).ok())
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP {
        out.remove(*name);
    }
    out
}

/// Maps a dispatch failure to a response.
///
/// A missing test id is the caller's fault and answers `400`. Everything
/// else answers `500`; the message is included only with
/// `expose_error_details`.
fn dispatch_error(state: &AppState, error: &DispatchError) -> Response {
    if let DispatchError::MissingTestId { .. } = error {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"error": error.code(), "message": error.to_string()})),
        )
            .into_response();
    }

    if let DispatchError::Selection(SelectionError::Handler(_)) = error {
        tracing::error!(code = error.code(), "request handling failed");
    }

    let mut body = json!({"error": error.code()});
    if state.scenarist.config().expose_error_details {
        body["message"] = Value::String(error.to_string());
    }
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}

// ============================================================================
// Server
// ============================================================================

/// Binds the listener.
///
/// Returns the listener and the actual bound address (useful when binding
/// to port 0 in tests).
///
/// # Errors
///
/// Returns [`TransportError::BindFailed`] if the TCP listener cannot bind.
pub async fn bind(addr: &str) -> Result<(TcpListener, SocketAddr), TransportError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TransportError::BindFailed(format!("{addr}: {e}")))?;
    let bound = listener.local_addr()?;
    Ok((listener, bound))
}

/// Serves `router` until `cancel` fires.
///
/// # Errors
///
/// Returns [`TransportError::Io`] if the server fails.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> Result<(), TransportError> {
    let bound = listener.local_addr()?;
    info!(%bound, "HTTP server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;
    debug!("HTTP server shut down");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses a bind address string into a full `host:port` form.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`TransportError::InvalidAddress`] if the result cannot be
/// parsed as a valid socket address.
pub fn parse_bind_addr(input: &str) -> Result<String, TransportError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|e| TransportError::InvalidAddress(format!("{input}: {e}")))?;
    Ok(addr)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use scenarist_core::config::schema::{ScenarioDefinition, ScenaristConfig};
    use tower::util::ServiceExt;

    const TEST_ID: &str = "x-scenarist-test-id";

    fn app_state(config: ScenaristConfig) -> Arc<AppState> {
        let scenarist = Scenarist::new(config);
        for value in [
            json!({"id": "default", "name": "Default", "mocks": [
                {"method": "GET", "url": "/api/user", "response": {
                    "body": {"tier": "standard"}, "headers": {"x-mock": "yes"}}}
            ]}),
            json!({"id": "premium", "name": "Premium", "mocks": [
                {"method": "GET", "url": "/api/user", "response": {"status": 201, "body": {"tier": "premium"}}}
            ]}),
        ] {
            let definition: ScenarioDefinition = serde_json::from_value(value).unwrap();
            scenarist.manager().register_scenario(definition).unwrap();
        }
        scenarist.start();
        Arc::new(AppState::new(
            Arc::new(scenarist),
            None,
            CancellationToken::new(),
        ))
    }

    fn router(config: ScenaristConfig) -> Router {
        build_router(app_state(config)).unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn switch(test_id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/__scenario__")
            .header(TEST_ID, test_id)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str, test_id: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(TEST_ID, test_id)
            .body(Body::empty())
            .unwrap()
    }

    // ------------------------------------------------------------------
    // parse_bind_addr
    // ------------------------------------------------------------------

    #[test]
    fn parse_bind_addr_colon_port() {
        assert_eq!(parse_bind_addr(":8080").unwrap(), "0.0.0.0:8080");
    }

    #[test]
    fn parse_bind_addr_port_only() {
        assert_eq!(parse_bind_addr("8080").unwrap(), "0.0.0.0:8080");
    }

    #[test]
    fn parse_bind_addr_full() {
        assert_eq!(parse_bind_addr("127.0.0.1:3000").unwrap(), "127.0.0.1:3000");
    }

    #[test]
    fn parse_bind_addr_invalid() {
        assert!(parse_bind_addr("not-an-address").is_err());
    }

    #[test]
    fn endpoint_must_be_literal_path() {
        assert!(check_endpoint("/__scenario__").is_ok());
        assert!(check_endpoint("__scenario__").is_err());
        assert!(check_endpoint("/scenario/:id").is_err());
        assert!(check_endpoint("/scenario/{id}").is_err());
        assert!(check_endpoint("/__scenarist__/state").is_err());
    }

    #[test]
    fn request_url_forms() {
        let mut headers = HeaderMap::new();
        let origin: Uri = "/api/user?x=1".parse().unwrap();
        assert_eq!(request_url(&origin, &headers), "/api/user?x=1");
        headers.insert(header::HOST, HeaderValue::from_static("api.test"));
        assert_eq!(request_url(&origin, &headers), "http://api.test/api/user?x=1");
        let absolute: Uri = "https://api.example.com/v1/users".parse().unwrap();
        assert_eq!(request_url(&absolute, &headers), "https://api.example.com/v1/users");
    }

    #[test]
    fn pass_through_targets() {
        let base = Url::parse("http://backend:3000").unwrap();
        let origin: Uri = "/api/user?x=1".parse().unwrap();
        assert_eq!(
            pass_through_target(&origin, Some(&base)).unwrap().as_str(),
            "http://backend:3000/api/user?x=1"
        );
        assert!(pass_through_target(&origin, None).is_none());
        let absolute: Uri = "http://real.example/a".parse().unwrap();
        assert_eq!(
            pass_through_target(&absolute, None).unwrap().as_str(),
            "http://real.example/a"
        );
    }

    #[tokio::test]
    async fn mock_response_skips_invalid_headers() {
        let mut headers = indexmap::IndexMap::new();
        headers.insert("x-ok".to_string(), "1".to_string());
        headers.insert("bad header".to_string(), "2".to_string());
        headers.insert("content-type".to_string(), "application/vnd.api+json".to_string());
        let resp = mock_response(MockResponse {
            status: 202,
            body: Some(json!([1, 2])),
            headers,
            delay: None,
        });
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(resp.headers()["x-ok"], "1");
        assert_eq!(resp.headers()["content-type"], "application/vnd.api+json");
        assert_eq!(json_body(resp).await, json!([1, 2]));
    }

    #[test]
    fn mock_response_without_body_is_empty() {
        let resp = mock_response(MockResponse::empty(204));
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(!resp.headers().contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn hop_by_hop_headers_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::HOST, HeaderValue::from_static("x"));
        headers.insert("x-keep", HeaderValue::from_static("1"));
        let out = strip_hop_by_hop(&headers);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("x-keep"));
    }

    // ------------------------------------------------------------------
    // Control endpoints
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn switch_and_query_scenario() {
        let app = router(ScenaristConfig::default());

        let resp = app
            .clone()
            .oneshot(switch("t1", r#"{"scenario":"premium","variant":"mobile"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["testId"], "t1");
        assert_eq!(body["scenarioId"], "premium");
        assert_eq!(body["variant"], "mobile");

        let resp = app.oneshot(get_req("/__scenario__", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["scenarioName"], "Premium");
        assert_eq!(body["variantName"], "mobile");
    }

    #[tokio::test]
    async fn query_without_active_scenario_is_404() {
        let app = router(ScenaristConfig::default());
        let resp = app.oneshot(get_req("/__scenario__", "nobody")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["testId"], "nobody");
    }

    #[tokio::test]
    async fn switch_rejects_bad_requests() {
        let app = router(ScenaristConfig::default());

        let resp = app.clone().oneshot(switch("t1", "not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app.clone().oneshot(switch("t1", r#"{"variant":"x"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app.oneshot(switch("t1", r#"{"scenario":"premum"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["code"], "SCENARIO_NOT_FOUND");
        assert!(body["error"].as_str().unwrap().contains("premium"));
    }

    #[tokio::test]
    async fn debug_endpoints_are_opt_in() {
        let app = router(ScenaristConfig::default());
        let resp = app.oneshot(get_req(DEBUG_SCENARIOS_PATH, "t1")).await.unwrap();
        // Falls through to interception and finds no mock.
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let app = router(ScenaristConfig {
            debug_endpoints: true,
            ..ScenaristConfig::default()
        });
        let resp = app.clone().oneshot(get_req(DEBUG_SCENARIOS_PATH, "t1")).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body[0]["id"], "default");
        assert_eq!(body[1]["mockCount"], 1);

        let resp = app.oneshot(get_req(DEBUG_STATE_PATH, "t1")).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body, json!({"testId": "t1", "state": {}}));
    }

    // ------------------------------------------------------------------
    // Interception
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn mocked_response_carries_status_headers_and_body() {
        let app = router(ScenaristConfig::default());

        let resp = app.clone().oneshot(get_req("/api/user", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-mock"], "yes");
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(json_body(resp).await, json!({"tier": "standard"}));

        app.clone()
            .oneshot(switch("t1", r#"{"scenario":"premium"}"#))
            .await
            .unwrap();
        let resp = app.oneshot(get_req("/api/user", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(json_body(resp).await, json!({"tier": "premium"}));
    }

    #[tokio::test]
    async fn unmatched_without_upstream_is_502() {
        let app = router(ScenaristConfig::default());
        let resp = app.oneshot(get_req("/api/unknown", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn strict_mode_answers_501() {
        let app = router(ScenaristConfig {
            strict_mode: true,
            ..ScenaristConfig::default()
        });
        let resp = app.oneshot(get_req("/api/unknown", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(json_body(resp).await["error"], "NO_MOCK_MATCHED");
    }

    #[tokio::test]
    async fn thrown_errors_hide_details_by_default() {
        use scenarist_core::config::schema::{ErrorBehavior, ErrorBehaviors};
        let throwing = ErrorBehaviors {
            on_no_mock_found: ErrorBehavior::Throw,
            ..ErrorBehaviors::default()
        };

        let app = router(ScenaristConfig {
            error_behaviors: throwing,
            ..ScenaristConfig::default()
        });
        let resp = app.oneshot(get_req("/api/unknown", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await, json!({"error": "NO_MOCK_MATCHED"}));

        let app = router(ScenaristConfig {
            error_behaviors: throwing,
            expose_error_details: true,
            ..ScenaristConfig::default()
        });
        let resp = app.oneshot(get_req("/api/unknown", "t1")).await.unwrap();
        let body = json_body(resp).await;
        assert!(body["message"].as_str().unwrap().contains("/api/unknown"));
    }

    #[tokio::test]
    async fn missing_test_id_with_throw_is_400() {
        use scenarist_core::config::schema::{ErrorBehavior, ErrorBehaviors};
        let app = router(ScenaristConfig {
            error_behaviors: ErrorBehaviors {
                on_missing_test_id: ErrorBehavior::Throw,
                ..ErrorBehaviors::default()
            },
            ..ScenaristConfig::default()
        });
        let req = Request::builder().uri("/api/user").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "MISSING_TEST_ID");
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_delay() {
        let state = app_state(ScenaristConfig::default());
        let definition: ScenarioDefinition = serde_json::from_value(json!({
            "id": "slow", "name": "Slow", "mocks": [
                {"method": "GET", "url": "/slow", "response": {"body": 1, "delay": 60_000}}
            ]
        }))
        .unwrap();
        state.scenarist().manager().register_scenario(definition).unwrap();
        state.scenarist().manager().switch_scenario("t1", "slow", None).unwrap();
        state.cancel.cancel();

        let app = build_router(state).unwrap();
        let resp = app.oneshot(get_req("/slow", "t1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn bind_reports_actual_port() {
        let (listener, addr) = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(addr.port(), 0);
        drop(listener);
    }
}
