//! Request and template contexts.
//!
//! [`InterceptedRequest`] is what an interception layer hands to the
//! engine; [`extract_context`] normalizes it into the
//! [`HttpRequestContext`] the selector consumes. [`TemplateContext`]
//! carries the data visible to `{{...}}` placeholders.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};
use url::Url;

use scenarist_core::path::StatePath;

use crate::state::tree;

/// Base used to resolve relative request URLs (`/users/1`).
const RELATIVE_BASE: &str = "http://localhost";

// ============================================================================
// Intercepted Request
// ============================================================================

/// A raw outgoing HTTP request as seen by an interceptor.
#[derive(Debug, Clone, Default)]
pub struct InterceptedRequest {
    /// HTTP method, any case
    pub method: String,
    /// Absolute or origin-relative URL, including query string
    pub url: String,
    /// Header pairs in arrival order; names in any case
    pub headers: Vec<(String, String)>,
    /// Raw request body
    pub body: Bytes,
}

impl InterceptedRequest {
    /// Creates a bodiless request.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json(self, body: &Value) -> Self {
        self.with_body(body.to_string())
    }

    /// Returns the first header with the given name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Normalized Context
// ============================================================================

/// The normalized request the response selector matches against.
///
/// Header keys are lower-case; the selector performs no case folding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequestContext {
    /// Upper-case method
    pub method: String,
    /// Full request URL
    pub url: String,
    /// Parsed JSON body, a string for non-JSON bodies, or `None` if empty
    pub body: Option<Value>,
    /// Lower-case header name → value
    pub headers: HashMap<String, String>,
    /// Query parameter → first value, percent-decoded
    pub query: HashMap<String, String>,
}

/// Normalizes an intercepted request.
///
/// Repeated headers are joined with `", "`. Query parameters keep their
/// first occurrence. Bodies that parse as JSON are kept as JSON; other
/// non-empty bodies become a JSON string.
#[must_use]
pub fn extract_context(request: &InterceptedRequest) -> HttpRequestContext {
    let mut headers: HashMap<String, String> = HashMap::new();
    for (name, value) in &request.headers {
        headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }

    let mut query = HashMap::new();
    if let Some(url) = parse_request_url(&request.url) {
        for (key, value) in url.query_pairs() {
            query
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    let body = if request.body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&request.body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&request.body).into_owned())
        }))
    };

    HttpRequestContext {
        method: request.method.to_ascii_uppercase(),
        url: request.url.clone(),
        body,
        headers,
        query,
    }
}

/// Parses a request URL, resolving origin-relative URLs against `localhost`.
#[must_use]
pub fn parse_request_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(RELATIVE_BASE).ok()?.join(raw).ok()
        }
        Err(_) => None,
    }
}

// ============================================================================
// Template Context
// ============================================================================

/// Outcome of resolving a placeholder expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A value is stored at the path
    Found(Value),
    /// The path is valid but holds nothing
    Missing,
    /// Unknown prefix, or a malformed or overlong path
    Invalid,
}

/// Data visible to response templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Current per-test state
    pub state: &'a Map<String, Value>,
    /// URL path parameters of the selected mock
    pub params: &'a Map<String, Value>,
}

impl<'a> TemplateContext<'a> {
    /// Creates a template context.
    #[must_use]
    pub const fn new(state: &'a Map<String, Value>, params: &'a Map<String, Value>) -> Self {
        Self { state, params }
    }

    /// Resolves a placeholder expression such as `state.user.tier`.
    #[must_use]
    pub fn resolve(&self, expression: &str) -> Lookup {
        let Some((root, rest)) = expression.split_once('.') else {
            return Lookup::Invalid;
        };
        let source = match root {
            "state" => self.state,
            "params" => self.params,
            _ => return Lookup::Invalid,
        };
        match StatePath::parse(rest) {
            Ok(path) if !path.is_append() => {
                tree::get_path(source, &path).map_or(Lookup::Missing, Lookup::Found)
            }
            _ => Lookup::Invalid,
        }
    }
}
