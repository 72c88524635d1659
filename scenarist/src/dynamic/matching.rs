//! Match criteria evaluation.
//!
//! Compiles declarative [`MatchCriteria`] into evaluatable form at
//! registration time and scores them against a request. A criteria block
//! matches only when every criterion matches; its specificity is the
//! number of criteria.

use serde_json::{Map, Value};

use scenarist_core::config::schema::{MatchCriteria, MatchValue};
use scenarist_core::path::StatePath;

use super::context::HttpRequestContext;
use crate::state::tree;

/// A compiled string matcher.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    /// Exact string equality
    Exact(String),
    /// Substring match
    Contains(String),
    /// Prefix match
    StartsWith(String),
    /// Suffix match
    EndsWith(String),
    /// Regex search (unanchored unless the pattern anchors itself)
    Regex(regex::Regex),
}

impl ValueMatcher {
    /// Compiles a declarative matcher.
    ///
    /// Non-string scalars compile to an exact match on their string form.
    ///
    /// # Errors
    ///
    /// Returns a message if a regex matcher does not compile.
    pub fn compile(value: &MatchValue) -> Result<Self, String> {
        Ok(match value {
            MatchValue::Exact(s) | MatchValue::Equals(s) => Self::Exact(s.clone()),
            MatchValue::Contains(s) => Self::Contains(s.clone()),
            MatchValue::StartsWith(s) => Self::StartsWith(s.clone()),
            MatchValue::EndsWith(s) => Self::EndsWith(s.clone()),
            MatchValue::Regex(re) => Self::Regex(re.compile()?),
            MatchValue::Scalar(v) => Self::Exact(coerce_to_string(v)),
        })
    }

    /// Tests the matcher against a request value.
    #[must_use]
    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Exact(expected) => actual == expected,
            Self::Contains(needle) => actual.contains(needle.as_str()),
            Self::StartsWith(prefix) => actual.starts_with(prefix.as_str()),
            Self::EndsWith(suffix) => actual.ends_with(suffix.as_str()),
            Self::Regex(re) => re.is_match(actual),
        }
    }
}

/// Renders a JSON value the way string matching sees it.
///
/// Strings are taken as-is, scalars in canonical text form, containers as
/// compact JSON.
#[must_use]
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compiled [`MatchCriteria`].
#[derive(Debug, Clone, Default)]
pub struct CompiledCriteria {
    url: Option<ValueMatcher>,
    body: Vec<(StatePath, ValueMatcher)>,
    headers: Vec<(String, ValueMatcher)>,
    query: Vec<(String, ValueMatcher)>,
    state: Vec<(StatePath, Value)>,
}

impl CompiledCriteria {
    /// Compiles criteria; header names are lower-cased here so requests
    /// never need folding.
    ///
    /// # Errors
    ///
    /// Returns `(field, message)` naming the first criterion that failed.
    pub fn compile(criteria: &MatchCriteria) -> Result<Self, (String, String)> {
        let url = criteria
            .url
            .as_ref()
            .map(ValueMatcher::compile)
            .transpose()
            .map_err(|e| ("url".to_string(), e))?;

        let mut body = Vec::with_capacity(criteria.body.len());
        for (key, matcher) in &criteria.body {
            let field = format!("body.{key}");
            let path = StatePath::parse(key).map_err(|e| (field.clone(), e.to_string()))?;
            body.push((path, ValueMatcher::compile(matcher).map_err(|e| (field, e))?));
        }

        let mut headers = Vec::with_capacity(criteria.headers.len());
        for (name, matcher) in &criteria.headers {
            let compiled =
                ValueMatcher::compile(matcher).map_err(|e| (format!("headers.{name}"), e))?;
            headers.push((name.to_ascii_lowercase(), compiled));
        }

        let mut query = Vec::with_capacity(criteria.query.len());
        for (name, matcher) in &criteria.query {
            let compiled =
                ValueMatcher::compile(matcher).map_err(|e| (format!("query.{name}"), e))?;
            query.push((name.clone(), compiled));
        }

        let state = compile_state_expectations(&criteria.state)
            .map_err(|(key, e)| (format!("state.{key}"), e))?;

        Ok(Self {
            url,
            body,
            headers,
            query,
            state,
        })
    }

    /// Number of criteria; the score of a full match.
    #[must_use]
    pub fn specificity(&self) -> usize {
        usize::from(self.url.is_some())
            + self.body.len()
            + self.headers.len()
            + self.query.len()
            + self.state.len()
    }

    /// Scores the criteria against a request and the test's state.
    ///
    /// Returns `None` unless every criterion matches.
    #[must_use]
    pub fn evaluate(&self, ctx: &HttpRequestContext, state: &Map<String, Value>) -> Option<usize> {
        if let Some(url) = &self.url
            && !url.matches(&ctx.url)
        {
            return None;
        }

        for (path, matcher) in &self.body {
            let body = ctx.body.as_ref()?;
            let actual = tree::lookup(body, path.segments())?;
            if !matcher.matches(&coerce_to_string(&actual)) {
                return None;
            }
        }

        for (name, matcher) in &self.headers {
            if !matcher.matches(ctx.headers.get(name)?) {
                return None;
            }
        }

        for (name, matcher) in &self.query {
            if !matcher.matches(ctx.query.get(name)?) {
                return None;
            }
        }

        if !state_matches(&self.state, state) {
            return None;
        }

        Some(self.specificity())
    }
}

/// Parses the keys of a state expectation map.
///
/// # Errors
///
/// Returns `(key, message)` for the first key that is not a valid path.
pub fn compile_state_expectations(
    expected: &Map<String, Value>,
) -> Result<Vec<(StatePath, Value)>, (String, String)> {
    expected
        .iter()
        .map(|(key, value)| {
            StatePath::parse(key)
                .map(|path| (path, value.clone()))
                .map_err(|e| (key.clone(), e.to_string()))
        })
        .collect()
}

/// Returns `true` if every expected path holds an equal value in `state`.
#[must_use]
pub fn state_matches(expected: &[(StatePath, Value)], state: &Map<String, Value>) -> bool {
    expected.iter().all(|(path, value)| {
        tree::get_path(state, path).is_some_and(|actual| tree::values_equal(&actual, value))
    })
}
