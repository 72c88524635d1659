//! Scenario schema types
//!
//! Declarative, serializable definitions for scenarios, mocks, matchers and
//! responses, plus the runtime options shared by every adapter. Nothing in
//! this module is executable: a scenario is data and can be stored, diffed
//! and re-registered.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Scenario Definitions
// ============================================================================

/// A named bundle of mock HTTP responses.
///
/// Immutable once registered. Registering the same id again is accepted
/// only when the definition is identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioDefinition {
    /// Unique scenario identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Ordered mock rules; order decides specificity ties
    #[serde(default)]
    pub mocks: Vec<MockDefinition>,
}

/// A single mock rule: method + URL pattern, optional criteria, and a
/// response strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MockDefinition {
    /// HTTP method this mock answers
    pub method: HttpMethod,

    /// URL pattern (path template, full URL template, or regex)
    pub url: UrlPattern,

    /// Additional request criteria; absent means a fallback mock
    #[serde(
        rename = "match",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub match_criteria: Option<MatchCriteria>,

    /// Single static response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<MockResponse>,

    /// Ordered response sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceConfig>,

    /// Response chosen by current per-test state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_response: Option<StateResponseConfig>,

    /// State key → request extraction path (`body.x`, `headers.y`, `query.z`)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub capture_state: IndexMap<String, String>,

    /// State mutation applied after the response is produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_response: Option<AfterResponse>,
}

impl MockDefinition {
    /// Returns `true` if this mock has no match criteria and therefore
    /// matches on method + URL alone.
    ///
    /// An empty `match` object counts as no criteria.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.match_criteria
            .as_ref()
            .is_none_or(MatchCriteria::is_empty)
    }

    /// Number of response strategies configured (valid definitions have 0 or 1).
    #[must_use]
    pub fn response_kind_count(&self) -> usize {
        usize::from(self.response.is_some())
            + usize::from(self.sequence.is_some())
            + usize::from(self.state_response.is_some())
    }
}

// ============================================================================
// HTTP Method
// ============================================================================

/// HTTP methods a mock can answer.
///
/// Parsed case-insensitively, serialized upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl HttpMethod {
    /// The canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(format!(
                "unsupported HTTP method '{s}' (expected GET, POST, PUT, PATCH, DELETE, HEAD or OPTIONS)"
            )),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Patterns and Matchers
// ============================================================================

/// A serialized regular expression: `{source, flags}`.
///
/// Supported flags: `i` (case-insensitive), `m` (multi-line), `s` (dot
/// matches newline). `g`, `u`, `y`, `d` and `v` are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegexPattern {
    /// Pattern source
    pub source: String,

    /// Flag letters
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flags: String,
}

impl RegexPattern {
    /// Creates a pattern with no flags.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: String::new(),
        }
    }

    /// Creates a pattern with the given flags.
    #[must_use]
    pub fn with_flags(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Compiles the pattern.
    ///
    /// Patterns are size-limited to keep compilation bounded.
    ///
    /// # Errors
    ///
    /// Returns a message if a flag is unsupported or the source is not a
    /// valid regular expression.
    pub fn compile(&self) -> Result<regex::Regex, String> {
        let mut builder = regex::RegexBuilder::new(&self.source);
        builder.size_limit(1 << 20);
        for flag in self.flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' | 'v' => {}
                other => return Err(format!("unsupported regex flag '{other}'")),
            }
        }
        builder.build().map_err(|e| e.to_string())
    }
}

/// A URL pattern.
///
/// On the wire this is either a string (`/users/:id`,
/// `https://api.example.com/users/:id`) or `{"regex": {source, flags}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum UrlPattern {
    /// Path-template string, optionally prefixed with scheme and host
    Template(String),
    /// Regular expression tested against the full request URL
    Regex(RegexPattern),
}

impl UrlPattern {
    /// Returns `true` for templates that include a scheme and host.
    #[must_use]
    pub fn is_full_url(&self) -> bool {
        matches!(self, Self::Template(t) if t.contains("://"))
    }
}

impl From<&str> for UrlPattern {
    fn from(value: &str) -> Self {
        Self::Template(value.to_string())
    }
}

impl TryFrom<Value> for UrlPattern {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Self::Template(s)),
            Value::Object(map) => parse_regex_object(map).map(Self::Regex),
            other => Err(format!(
                "url must be a string or a {{\"regex\": ...}} object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

impl From<UrlPattern> for Value {
    fn from(pattern: UrlPattern) -> Self {
        match pattern {
            UrlPattern::Template(s) => Self::String(s),
            UrlPattern::Regex(re) => regex_to_value(re),
        }
    }
}

/// A value matcher for URL, body, header and query criteria.
///
/// On the wire:
/// - `"text"`: exact string match
/// - `{"equals"|"contains"|"startsWith"|"endsWith": "text"}`, exactly one key
/// - `{"regex": {"source": "...", "flags": "i"}}`
/// - a number, boolean or null, compared by string form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum MatchValue {
    /// Bare string, exact match
    Exact(String),
    /// Explicit exact match
    Equals(String),
    /// Substring match
    Contains(String),
    /// Prefix match
    StartsWith(String),
    /// Suffix match
    EndsWith(String),
    /// Regular expression search
    Regex(RegexPattern),
    /// Non-string scalar, compared by its string form
    Scalar(Value),
}

const STRATEGY_KEYS: [&str; 4] = ["equals", "contains", "startsWith", "endsWith"];

impl TryFrom<Value> for MatchValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(Self::Exact(s)),
            Value::Number(_) | Value::Bool(_) | Value::Null => Ok(Self::Scalar(value)),
            Value::Array(_) => Err("matcher must not be an array".to_string()),
            Value::Object(map) => {
                if map.contains_key("regex") {
                    return parse_regex_object(map).map(Self::Regex);
                }
                if let Some(unknown) = map.keys().find(|k| !STRATEGY_KEYS.contains(&k.as_str())) {
                    return Err(format!(
                        "unknown matcher key '{unknown}' (expected one of equals, contains, startsWith, endsWith, regex)"
                    ));
                }
                if map.len() != 1 {
                    return Err(format!(
                        "matcher must set exactly one of equals, contains, startsWith, endsWith (got {})",
                        map.len()
                    ));
                }
                let (key, inner) = map.into_iter().next().ok_or("empty matcher object")?;
                let Value::String(text) = inner else {
                    return Err(format!("matcher '{key}' expects a string value"));
                };
                Ok(match key.as_str() {
                    "equals" => Self::Equals(text),
                    "contains" => Self::Contains(text),
                    "startsWith" => Self::StartsWith(text),
                    _ => Self::EndsWith(text),
                })
            }
        }
    }
}

impl From<MatchValue> for Value {
    fn from(matcher: MatchValue) -> Self {
        let strategy = |key: &str, text: String| {
            let mut map = Map::new();
            map.insert(key.to_string(), Self::String(text));
            Self::Object(map)
        };
        match matcher {
            MatchValue::Exact(s) => Self::String(s),
            MatchValue::Equals(s) => strategy("equals", s),
            MatchValue::Contains(s) => strategy("contains", s),
            MatchValue::StartsWith(s) => strategy("startsWith", s),
            MatchValue::EndsWith(s) => strategy("endsWith", s),
            MatchValue::Regex(re) => regex_to_value(re),
            MatchValue::Scalar(v) => v,
        }
    }
}

fn parse_regex_object(mut map: Map<String, Value>) -> Result<RegexPattern, String> {
    if map.len() != 1 {
        return Err("regex matcher must only contain the 'regex' key".to_string());
    }
    let inner = map
        .remove("regex")
        .ok_or("expected a {\"regex\": {source, flags}} object")?;
    match inner {
        Value::String(source) => Ok(RegexPattern::new(source)),
        other => serde_json::from_value(other).map_err(|e| format!("invalid regex object: {e}")),
    }
}

fn regex_to_value(re: RegexPattern) -> Value {
    let mut inner = Map::new();
    inner.insert("source".to_string(), Value::String(re.source));
    if !re.flags.is_empty() {
        inner.insert("flags".to_string(), Value::String(re.flags));
    }
    let mut outer = Map::new();
    outer.insert("regex".to_string(), Value::Object(inner));
    Value::Object(outer)
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Request criteria a mock requires in addition to method + URL.
///
/// Every specified criterion must match; unspecified ones are ignored.
/// Body, header and query matching is partial: the request may carry
/// fields the criteria do not mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MatchCriteria {
    /// Matcher applied to the full request URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<MatchValue>,

    /// Body field (dot-path) → matcher
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub body: IndexMap<String, MatchValue>,

    /// Header name → matcher
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, MatchValue>,

    /// Query parameter → matcher
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, MatchValue>,

    /// State key (dot-path) → expected value
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state: Map<String, Value>,
}

impl MatchCriteria {
    /// Returns `true` when no criterion is specified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.body.is_empty()
            && self.headers.is_empty()
            && self.query.is_empty()
            && self.state.is_empty()
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A synthesized HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MockResponse {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// JSON body; may contain `{{state.*}}` / `{{params.*}}` templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Response headers
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    /// Simulated latency in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

const fn default_status() -> u16 {
    200
}

impl MockResponse {
    /// A response with the given status and JSON body.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            headers: IndexMap::new(),
            delay: None,
        }
    }

    /// A bodiless response with the given status.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            headers: IndexMap::new(),
            delay: None,
        }
    }
}

/// What a sequence does after its last response has been served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Keep returning the last response
    #[default]
    Last,
    /// Wrap around to the first response
    Cycle,
    /// Stop matching; selection falls through to other mocks
    None,
}

/// An ordered list of responses served one per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SequenceConfig {
    /// Responses in serving order (non-empty)
    pub responses: Vec<MockResponse>,

    /// End-of-sequence behaviour
    #[serde(default)]
    pub repeat: RepeatMode,
}

/// A state mutation: shallow-merged into per-test state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AfterResponse {
    /// Top-level keys to set (non-empty)
    pub set_state: Map<String, Value>,
}

/// A response chosen by the current per-test state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StateResponseConfig {
    /// Response used when no condition matches
    pub default: MockResponse,

    /// Conditions; the most specific match wins, earlier wins ties
    #[serde(default)]
    pub conditions: Vec<StateCondition>,
}

/// One branch of a [`StateResponseConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StateCondition {
    /// State key (dot-path) → expected value; non-empty, partial match
    pub when: Map<String, Value>,

    /// Response when this condition wins
    pub then: MockResponse,

    /// Tri-state override of the mock-level `afterResponse`:
    /// absent inherits, `null` suppresses, an object replaces.
    #[serde(
        default,
        deserialize_with = "deserialize_explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub after_response: Option<Option<AfterResponse>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn deserialize_explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The active scenario reference stored per test id.
///
/// Holds only the id, never the definition, so registry lookups at
/// resolution time always see the registered definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveScenario {
    /// Selected scenario id
    pub scenario_id: String,

    /// Optional variant label supplied with the switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
}

// ============================================================================
// Runtime Options
// ============================================================================

/// Default header carrying the test identifier.
pub const DEFAULT_TEST_ID_HEADER: &str = "x-scenarist-test-id";

/// Default id of the shared fallback scenario.
pub const DEFAULT_SCENARIO_ID: &str = "default";

/// Test id used when a request carries none and the policy allows it.
pub const DEFAULT_TEST_ID: &str = "default-test";

/// Default path of the scenario control endpoint.
pub const DEFAULT_SCENARIO_ENDPOINT: &str = "/__scenario__";

/// How a recoverable failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ErrorBehavior {
    /// Fail the request with an error
    Throw,
    /// Log a warning and continue (pass-through or default)
    #[default]
    Warn,
    /// Continue silently
    Ignore,
}

/// Per-failure behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorBehaviors {
    /// No mock matched the request
    pub on_no_mock_found: ErrorBehavior,
    /// A `repeat: none` sequence ran out with nothing to fall back on
    pub on_sequence_exhausted: ErrorBehavior,
    /// The request carried no test id
    pub on_missing_test_id: ErrorBehavior,
    /// Selection failed unexpectedly
    pub on_handler_error: ErrorBehavior,
}

impl Default for ErrorBehaviors {
    fn default() -> Self {
        Self {
            on_no_mock_found: ErrorBehavior::Warn,
            on_sequence_exhausted: ErrorBehavior::Warn,
            on_missing_test_id: ErrorBehavior::Warn,
            on_handler_error: ErrorBehavior::Throw,
        }
    }
}

/// Runtime options for a `Scenarist` instance and its adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenaristConfig {
    /// Master switch; when off every request passes through
    pub enabled: bool,

    /// Answer unmatched requests with `501` instead of passing through
    pub strict_mode: bool,

    /// Scenario consulted after the active one
    pub default_scenario_id: String,

    /// Header carrying the test id (lower-case)
    pub test_id_header: String,

    /// Test id used for requests without one
    pub default_test_id: String,

    /// Path of the scenario switch/query endpoint
    pub scenario_endpoint: String,

    /// Serve the state and scenario-list debug endpoints
    pub debug_endpoints: bool,

    /// Include internal error messages in `500` bodies
    pub expose_error_details: bool,

    /// Per-failure behaviours
    pub error_behaviors: ErrorBehaviors,
}

impl Default for ScenaristConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: false,
            default_scenario_id: DEFAULT_SCENARIO_ID.to_string(),
            test_id_header: DEFAULT_TEST_ID_HEADER.to_string(),
            default_test_id: DEFAULT_TEST_ID.to_string(),
            scenario_endpoint: DEFAULT_SCENARIO_ENDPOINT.to_string(),
            debug_endpoints: false,
            expose_error_details: false,
            error_behaviors: ErrorBehaviors::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_scenario_parses() {
        let scenario: ScenarioDefinition = serde_json::from_value(json!({
            "id": "default",
            "name": "Default",
            "mocks": [{
                "method": "get",
                "url": "/api/user",
                "response": {"status": 200, "body": {"tier": "standard"}}
            }]
        }))
        .unwrap();
        assert_eq!(scenario.mocks.len(), 1);
        assert_eq!(scenario.mocks[0].method, HttpMethod::Get);
        assert!(scenario.mocks[0].is_fallback());
        assert_eq!(scenario.mocks[0].response_kind_count(), 1);
    }

    #[test]
    fn test_yaml_scenario_parses() {
        let yaml = r"
id: premium
name: Premium user
mocks:
  - method: GET
    url: https://api.example.com/user
    match:
      headers:
        x-tier: premium
    response:
      body: { tier: premium }
";
        let scenario: ScenarioDefinition = serde_yaml::from_str(yaml).unwrap();
        let mock = &scenario.mocks[0];
        assert!(mock.url.is_full_url());
        assert!(!mock.is_fallback());
        assert_eq!(mock.response.as_ref().unwrap().status, 200);
        assert_eq!(
            mock.match_criteria.as_ref().unwrap().headers["x-tier"],
            MatchValue::Exact("premium".into())
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<MockDefinition, _> = serde_json::from_value(json!({
            "method": "GET",
            "url": "/x",
            "respone": {"status": 200}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_method_rejected() {
        let result: Result<HttpMethod, _> = serde_json::from_value(json!("FETCH"));
        assert!(result.unwrap_err().to_string().contains("FETCH"));
    }

    #[test]
    fn test_method_serializes_upper_case() {
        assert_eq!(serde_json::to_value(HttpMethod::Patch).unwrap(), json!("PATCH"));
    }

    #[test]
    fn test_match_value_forms() {
        let exact: MatchValue = serde_json::from_value(json!("premium")).unwrap();
        assert_eq!(exact, MatchValue::Exact("premium".into()));

        let contains: MatchValue = serde_json::from_value(json!({"contains": "prem"})).unwrap();
        assert_eq!(contains, MatchValue::Contains("prem".into()));

        let starts: MatchValue = serde_json::from_value(json!({"startsWith": "pre"})).unwrap();
        assert_eq!(starts, MatchValue::StartsWith("pre".into()));

        let regex: MatchValue =
            serde_json::from_value(json!({"regex": {"source": "^pre", "flags": "i"}})).unwrap();
        assert_eq!(regex, MatchValue::Regex(RegexPattern::with_flags("^pre", "i")));

        let scalar: MatchValue = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(scalar, MatchValue::Scalar(json!(42)));
    }

    #[test]
    fn test_match_value_rejects_two_strategies() {
        let result: Result<MatchValue, _> =
            serde_json::from_value(json!({"contains": "a", "endsWith": "b"}));
        assert!(result.unwrap_err().to_string().contains("exactly one"));
    }

    #[test]
    fn test_match_value_rejects_unknown_strategy() {
        let result: Result<MatchValue, _> = serde_json::from_value(json!({"like": "a%"}));
        assert!(result.unwrap_err().to_string().contains("unknown matcher key"));
    }

    #[test]
    fn test_match_value_rejects_non_string_strategy() {
        let result: Result<MatchValue, _> = serde_json::from_value(json!({"contains": 5}));
        assert!(result.is_err());
    }

    #[test]
    fn test_match_value_round_trips_through_json() {
        let original = MatchValue::EndsWith(".json".into());
        let value = serde_json::to_value(&original).unwrap();
        assert_eq!(value, json!({"endsWith": ".json"}));
        let back: MatchValue = serde_json::from_value(value).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_url_pattern_regex_form() {
        let pattern: UrlPattern =
            serde_json::from_value(json!({"regex": {"source": "/api/v\\d+/"}})).unwrap();
        assert_eq!(pattern, UrlPattern::Regex(RegexPattern::new("/api/v\\d+/")));
        assert!(!pattern.is_full_url());
    }

    #[test]
    fn test_url_pattern_rejects_number() {
        let result: Result<UrlPattern, _> = serde_json::from_value(json!(42));
        assert!(result.is_err());
    }

    #[test]
    fn test_regex_flags() {
        let re = RegexPattern::with_flags("^premium$", "gi").compile().unwrap();
        assert!(re.is_match("PREMIUM"));

        let err = RegexPattern::with_flags("x", "q").compile().unwrap_err();
        assert!(err.contains("'q'"));

        assert!(RegexPattern::new("(unclosed").compile().is_err());
    }

    #[test]
    fn test_condition_after_response_tri_state() {
        let absent: StateCondition = serde_json::from_value(json!({
            "when": {"submitted": true},
            "then": {"status": 200}
        }))
        .unwrap();
        assert_eq!(absent.after_response, None);

        let suppressed: StateCondition = serde_json::from_value(json!({
            "when": {"submitted": true},
            "then": {"status": 200},
            "afterResponse": null
        }))
        .unwrap();
        assert_eq!(suppressed.after_response, Some(None));

        let replaced: StateCondition = serde_json::from_value(json!({
            "when": {"submitted": true},
            "then": {"status": 200},
            "afterResponse": {"setState": {"step": 2}}
        }))
        .unwrap();
        assert!(matches!(replaced.after_response, Some(Some(_))));
    }

    #[test]
    fn test_repeat_mode_default_and_names() {
        let seq: SequenceConfig = serde_json::from_value(json!({
            "responses": [{"status": 200}]
        }))
        .unwrap();
        assert_eq!(seq.repeat, RepeatMode::Last);

        let none: RepeatMode = serde_json::from_value(json!("none")).unwrap();
        assert_eq!(none, RepeatMode::None);
    }

    #[test]
    fn test_empty_match_object_is_fallback() {
        let mock: MockDefinition = serde_json::from_value(json!({
            "method": "GET",
            "url": "/x",
            "match": {}
        }))
        .unwrap();
        assert!(mock.is_fallback());
        assert_eq!(mock.response_kind_count(), 0);
    }

    #[test]
    fn test_config_defaults() {
        let config: ScenaristConfig = serde_json::from_value(json!({"strictMode": true})).unwrap();
        assert!(config.enabled);
        assert!(config.strict_mode);
        assert_eq!(config.test_id_header, DEFAULT_TEST_ID_HEADER);
        assert_eq!(config.error_behaviors.on_handler_error, ErrorBehavior::Throw);
        assert_eq!(config.error_behaviors.on_no_mock_found, ErrorBehavior::Warn);
    }

    #[test]
    fn test_identical_definitions_compare_equal() {
        let make = || -> ScenarioDefinition {
            serde_json::from_value(json!({
                "id": "s",
                "name": "S",
                "mocks": [{"method": "GET", "url": "/a", "response": {"body": {"n": 1}}}]
            }))
            .unwrap()
        };
        assert_eq!(make(), make());
    }
}
