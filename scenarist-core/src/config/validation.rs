//! Scenario validation
//!
//! Checks definitions the type system cannot: mutually exclusive response
//! kinds, non-empty collections, status ranges, regex syntax and state-path
//! syntax. All issues are collected before reporting so a single pass shows
//! every problem in a file.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::schema::{
    AfterResponse, MatchCriteria, MatchValue, MockDefinition, MockResponse, ScenarioDefinition,
    SequenceConfig, StateResponseConfig, UrlPattern,
};
use crate::error::ValidationIssue;
use crate::path::{StatePath, is_dangerous_key};

/// Delays above this many milliseconds produce a warning.
const LONG_DELAY_MS: u64 = 60_000;

/// Prefixes a `captureState` source path may start with.
const CAPTURE_SOURCES: [&str; 4] = ["body", "headers", "query", "params"];

/// Outcome of validating one or more scenarios.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that reject the definition
    pub errors: Vec<ValidationIssue>,
    /// Issues that are reported but do not reject
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if no error-level issue was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Collects validation issues across a scenario.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates an empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a single scenario definition.
    ///
    /// Paths in the returned issues are relative to the scenario
    /// (`mocks[1].sequence.responses`).
    #[must_use]
    pub fn validate(mut self, scenario: &ScenarioDefinition) -> ValidationResult {
        self.check_scenario("", scenario);
        self.finish()
    }

    /// Validates a set of scenarios loaded together, including id uniqueness.
    ///
    /// Paths are prefixed with `scenarios[i]`.
    #[must_use]
    pub fn validate_all(mut self, scenarios: &[ScenarioDefinition]) -> ValidationResult {
        let mut seen = HashSet::new();
        for (i, scenario) in scenarios.iter().enumerate() {
            let prefix = format!("scenarios[{i}]");
            if !seen.insert(scenario.id.as_str()) {
                self.error(
                    format!("{prefix}.id"),
                    format!("duplicate scenario id '{}'", scenario.id),
                );
            }
            self.check_scenario(&format!("{prefix}."), scenario);
        }
        self.finish()
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::error(path, message));
    }

    fn warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::warning(path, message));
    }

    // ------------------------------------------------------------------------
    // Scenario / mock
    // ------------------------------------------------------------------------

    fn check_scenario(&mut self, prefix: &str, scenario: &ScenarioDefinition) {
        if scenario.id.trim().is_empty() {
            self.error(format!("{prefix}id"), "scenario id must not be empty");
        }
        if scenario.name.trim().is_empty() {
            self.warning(format!("{prefix}name"), "scenario name is empty");
        }
        if scenario.mocks.is_empty() {
            self.warning(
                format!("{prefix}mocks"),
                "scenario has no mocks; every request will fall through",
            );
        }
        for (i, mock) in scenario.mocks.iter().enumerate() {
            self.check_mock(&format!("{prefix}mocks[{i}]"), mock);
        }
    }

    fn check_mock(&mut self, path: &str, mock: &MockDefinition) {
        self.check_url(&format!("{path}.url"), &mock.url);

        if mock.response_kind_count() > 1 {
            self.error(
                path,
                "only one of response, sequence or stateResponse may be set",
            );
        }

        if let Some(criteria) = &mock.match_criteria {
            self.check_criteria(&format!("{path}.match"), criteria);
        }
        if let Some(response) = &mock.response {
            self.check_response(&format!("{path}.response"), response);
        }
        if let Some(sequence) = &mock.sequence {
            self.check_sequence(&format!("{path}.sequence"), sequence);
        }
        if let Some(state_response) = &mock.state_response {
            self.check_state_response(&format!("{path}.stateResponse"), state_response);
        }
        for (key, source) in &mock.capture_state {
            self.check_capture(&format!("{path}.captureState.{key}"), key, source);
        }
        if let Some(after) = &mock.after_response {
            self.check_after_response(&format!("{path}.afterResponse"), after);
        }
    }

    fn check_url(&mut self, path: &str, url: &UrlPattern) {
        match url {
            UrlPattern::Template(template) => {
                if template.is_empty() {
                    self.error(path, "url must not be empty");
                } else if !(template.starts_with('/')
                    || template == "*"
                    || template.contains("://"))
                {
                    self.error(
                        path,
                        format!("url '{template}' must start with '/', be '*', or include a scheme"),
                    );
                }
            }
            UrlPattern::Regex(re) => {
                if let Err(e) = re.compile() {
                    self.error(path, format!("invalid regex: {e}"));
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Criteria
    // ------------------------------------------------------------------------

    fn check_criteria(&mut self, path: &str, criteria: &MatchCriteria) {
        if let Some(url) = &criteria.url {
            self.check_match_value(&format!("{path}.url"), url);
        }
        for (key, matcher) in &criteria.body {
            let field = format!("{path}.body.{key}");
            if let Err(e) = StatePath::parse(key) {
                self.error(&field, format!("invalid body path: {e}"));
            }
            self.check_match_value(&field, matcher);
        }
        for (name, matcher) in &criteria.headers {
            let field = format!("{path}.headers.{name}");
            if name.is_empty() {
                self.error(&field, "header name must not be empty");
            }
            self.check_match_value(&field, matcher);
        }
        for (name, matcher) in &criteria.query {
            self.check_match_value(&format!("{path}.query.{name}"), matcher);
        }
        self.check_state_keys(&format!("{path}.state"), &criteria.state);
    }

    fn check_match_value(&mut self, path: &str, matcher: &MatchValue) {
        if let MatchValue::Regex(re) = matcher
            && let Err(e) = re.compile()
        {
            self.error(path, format!("invalid regex: {e}"));
        }
    }

    /// Validates the keys of a state lookup map; appends are write-only.
    fn check_state_keys(&mut self, path: &str, map: &Map<String, Value>) {
        for key in map.keys() {
            match StatePath::parse(key) {
                Ok(parsed) if parsed.is_append() => {
                    self.error(format!("{path}.{key}"), "append suffix '[]' is not allowed here");
                }
                Ok(_) => {}
                Err(e) => self.error(format!("{path}.{key}"), format!("invalid state key: {e}")),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Responses
    // ------------------------------------------------------------------------

    fn check_response(&mut self, path: &str, response: &MockResponse) {
        if !(100..=599).contains(&response.status) {
            self.error(
                format!("{path}.status"),
                format!("status {} is outside 100..=599", response.status),
            );
        }
        for name in response.headers.keys() {
            if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace() || b == b':') {
                self.error(
                    format!("{path}.headers"),
                    format!("invalid header name '{name}'"),
                );
            }
        }
        if let Some(delay) = response.delay
            && delay > LONG_DELAY_MS
        {
            self.warning(
                format!("{path}.delay"),
                format!("delay of {delay}ms exceeds {LONG_DELAY_MS}ms"),
            );
        }
    }

    fn check_sequence(&mut self, path: &str, sequence: &SequenceConfig) {
        if sequence.responses.is_empty() {
            self.error(format!("{path}.responses"), "sequence must have at least one response");
        }
        for (i, response) in sequence.responses.iter().enumerate() {
            self.check_response(&format!("{path}.responses[{i}]"), response);
        }
    }

    fn check_state_response(&mut self, path: &str, config: &StateResponseConfig) {
        self.check_response(&format!("{path}.default"), &config.default);

        let mut seen: Vec<&Map<String, Value>> = Vec::new();
        for (i, condition) in config.conditions.iter().enumerate() {
            let cond_path = format!("{path}.conditions[{i}]");
            if condition.when.is_empty() {
                self.error(format!("{cond_path}.when"), "condition 'when' must not be empty");
            } else if seen.contains(&&condition.when) {
                self.warning(
                    format!("{cond_path}.when"),
                    "condition duplicates an earlier one and can never be selected",
                );
            }
            seen.push(&condition.when);
            self.check_state_keys(&format!("{cond_path}.when"), &condition.when);
            self.check_response(&format!("{cond_path}.then"), &condition.then);
            if let Some(Some(after)) = &condition.after_response {
                self.check_after_response(&format!("{cond_path}.afterResponse"), after);
            }
        }
    }

    // ------------------------------------------------------------------------
    // State mutation
    // ------------------------------------------------------------------------

    fn check_after_response(&mut self, path: &str, after: &AfterResponse) {
        if after.set_state.is_empty() {
            self.error(format!("{path}.setState"), "setState must not be empty");
        }
        for key in after.set_state.keys() {
            if is_dangerous_key(key) {
                self.error(
                    format!("{path}.setState.{key}"),
                    format!("key '{key}' is not allowed"),
                );
            }
        }
    }

    fn check_capture(&mut self, path: &str, key: &str, source: &str) {
        if let Err(e) = StatePath::parse(key) {
            self.error(path, format!("invalid state key: {e}"));
        }
        let root = source.split(['.', '[']).next().unwrap_or_default();
        if !CAPTURE_SOURCES.contains(&root) {
            self.error(
                path,
                format!("capture source '{source}' must start with body, headers, query or params"),
            );
        } else if source != root
            && let Err(e) = StatePath::parse(source)
        {
            self.error(path, format!("invalid capture source: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario(value: serde_json::Value) -> ScenarioDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn validate(value: serde_json::Value) -> ValidationResult {
        Validator::new().validate(&scenario(value))
    }

    #[test]
    fn test_valid_scenario() {
        let result = validate(json!({
            "id": "premium",
            "name": "Premium",
            "mocks": [{
                "method": "GET",
                "url": "/api/user/:id",
                "match": {"headers": {"x-tier": "premium"}},
                "response": {"status": 200, "body": {"tier": "premium"}}
            }]
        }));
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_multiple_response_kinds_rejected() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "GET", "url": "/a",
                "response": {"status": 200},
                "sequence": {"responses": [{"status": 200}]}
            }]
        }));
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].path, "mocks[0]");
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{"method": "GET", "url": "/a", "sequence": {"responses": []}}]
        }));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "mocks[0].sequence.responses")
        );
    }

    #[test]
    fn test_status_out_of_range() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{"method": "GET", "url": "/a", "response": {"status": 99}}]
        }));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("99"));
    }

    #[test]
    fn test_empty_when_rejected() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "GET", "url": "/a",
                "stateResponse": {
                    "default": {"status": 200},
                    "conditions": [{"when": {}, "then": {"status": 201}}]
                }
            }]
        }));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path.ends_with("conditions[0].when"))
        );
    }

    #[test]
    fn test_duplicate_condition_warns() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "GET", "url": "/a",
                "stateResponse": {
                    "default": {"status": 200},
                    "conditions": [
                        {"when": {"step": 1}, "then": {"status": 201}},
                        {"when": {"step": 1}, "then": {"status": 202}}
                    ]
                }
            }]
        }));
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_set_state_rejected() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "POST", "url": "/a",
                "response": {"status": 200},
                "afterResponse": {"setState": {}}
            }]
        }));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_dangerous_set_state_key_rejected() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "POST", "url": "/a",
                "afterResponse": {"setState": {"__proto__": {"polluted": true}}}
            }]
        }));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.message.contains("__proto__"))
        );
    }

    #[test]
    fn test_invalid_regex_reported() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "GET",
                "url": {"regex": {"source": "(unclosed"}},
                "match": {"headers": {"x-a": {"regex": {"source": "ok", "flags": "z"}}}}
            }]
        }));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_relative_url_rejected() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{"method": "GET", "url": "api/users"}]
        }));
        assert!(result.errors[0].message.contains("api/users"));
    }

    #[test]
    fn test_capture_state_paths() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "POST", "url": "/cart",
                "captureState": {
                    "cart.items[]": "body.item",
                    "user": "headers.x-user-id",
                    "bad": "cookies.session",
                    "a..b": "body.x"
                }
            }]
        }));
        assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
    }

    #[test]
    fn test_state_criteria_reject_append_suffix() {
        let result = validate(json!({
            "id": "s", "name": "S",
            "mocks": [{
                "method": "GET", "url": "/a",
                "match": {"state": {"items[]": 1}}
            }]
        }));
        assert!(result.errors[0].message.contains("append"));
    }

    #[test]
    fn test_validate_all_detects_duplicate_ids() {
        let a = scenario(json!({"id": "dup", "name": "A", "mocks": []}));
        let b = scenario(json!({"id": "dup", "name": "B", "mocks": []}));
        let result = Validator::new().validate_all(&[a, b]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "scenarios[1].id");
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_collects_all_issues() {
        let result = validate(json!({
            "id": "", "name": "",
            "mocks": [
                {"method": "GET", "url": "", "response": {"status": 700}},
                {"method": "GET", "url": "/b", "sequence": {"responses": []}}
            ]
        }));
        assert_eq!(result.errors.len(), 4, "{:?}", result.errors);
        assert_eq!(result.warnings.len(), 1);
    }
}
