//! Response selection.
//!
//! Pipeline for one request: pick the most specific matching mock →
//! resolve its response (single, sequence or state-driven) → capture
//! request values into state → apply templates → apply `afterResponse`.

use std::sync::Arc;

use serde_json::{Map, Value};

use scenarist_core::config::schema::{AfterResponse, MockResponse};

use super::capture;
use super::context::{HttpRequestContext, TemplateContext};
use super::sequence::{SequenceKey, SequenceTracker};
use super::template::{apply_templates, apply_to_header};
use super::CompiledMock;
use crate::error::SelectionError;
use crate::scenarios::RegisteredScenario;
use crate::state::StateManager;

/// A mock whose method and URL matched the request.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Scenario that owns the mock
    pub scenario: Arc<RegisteredScenario>,
    /// Index of the mock within the scenario
    pub mock_index: usize,
    /// Path parameters extracted from the URL
    pub params: Map<String, Value>,
}

impl Candidate {
    fn mock(&self) -> Option<&CompiledMock> {
        self.scenario.mocks().get(self.mock_index)
    }

    fn sequence_key(&self, test_id: &str) -> SequenceKey {
        SequenceKey::new(test_id, self.scenario.id(), self.mock_index)
    }
}

/// The finalized response and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedResponse {
    /// Response after templating
    pub response: MockResponse,
    /// Scenario that owns the selected mock
    pub scenario_id: String,
    /// Index of the selected mock
    pub mock_index: usize,
    /// Specificity score of the selected mock (0 for fallbacks)
    pub specificity: usize,
}

/// Chooses and resolves the response for a request.
#[derive(Clone)]
pub struct ResponseSelector {
    state: Arc<dyn StateManager>,
    sequences: Arc<dyn SequenceTracker>,
}

impl std::fmt::Debug for ResponseSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSelector").finish_non_exhaustive()
    }
}

impl ResponseSelector {
    /// Creates a selector over the given state and sequence stores.
    #[must_use]
    pub fn new(state: Arc<dyn StateManager>, sequences: Arc<dyn SequenceTracker>) -> Self {
        Self { state, sequences }
    }

    /// Selects and resolves the response for a request.
    ///
    /// `candidates` must already be filtered to mocks matching method and
    /// URL, in precedence order (active scenario first).
    ///
    /// # Errors
    ///
    /// - [`SelectionError::SequenceExhausted`] if the only matching mocks
    ///   were exhausted `repeat: none` sequences
    /// - [`SelectionError::NoMockMatched`] if nothing else matched
    /// - [`SelectionError::Handler`] if a state capture fails
    pub fn select_response(
        &self,
        test_id: &str,
        ctx: &HttpRequestContext,
        candidates: &[Candidate],
    ) -> Result<SelectedResponse, SelectionError> {
        let snapshot = self.state.get_all(test_id);
        let mut excluded = vec![false; candidates.len()];
        let mut skipped_exhausted = false;

        loop {
            let Some((index, specificity)) =
                self.best_candidate(test_id, ctx, candidates, &snapshot, &mut excluded, &mut skipped_exhausted)
            else {
                return Err(if skipped_exhausted {
                    SelectionError::SequenceExhausted {
                        method: ctx.method.clone(),
                        url: ctx.url.clone(),
                    }
                } else {
                    SelectionError::NoMockMatched {
                        method: ctx.method.clone(),
                        url: ctx.url.clone(),
                    }
                });
            };

            let candidate = &candidates[index];
            // A concurrent request may have consumed the last response
            // between the exhaustion check and the cursor advance.
            if let Some(response) = self.resolve(test_id, ctx, candidate, &snapshot)? {
                tracing::debug!(
                    test_id,
                    scenario = candidate.scenario.id(),
                    mock_index = candidate.mock_index,
                    specificity,
                    status = response.status,
                    "mock selected"
                );
                return Ok(SelectedResponse {
                    response,
                    scenario_id: candidate.scenario.id().to_string(),
                    mock_index: candidate.mock_index,
                    specificity,
                });
            }
            excluded[index] = true;
            skipped_exhausted = true;
        }
    }

    /// Highest-specificity match, else the first fallback.
    fn best_candidate(
        &self,
        test_id: &str,
        ctx: &HttpRequestContext,
        candidates: &[Candidate],
        state: &Map<String, Value>,
        excluded: &mut [bool],
        skipped_exhausted: &mut bool,
    ) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        let mut fallback: Option<usize> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            if excluded[index] {
                continue;
            }
            let Some(mock) = candidate.mock() else {
                excluded[index] = true;
                continue;
            };
            if mock.definition().sequence.is_some()
                && self.sequences.is_exhausted(&candidate.sequence_key(test_id))
            {
                excluded[index] = true;
                // Only an exhausted mock that would have served this request counts.
                if mock.is_fallback() || mock.criteria().evaluate(ctx, state).is_some() {
                    *skipped_exhausted = true;
                }
                continue;
            }

            if mock.is_fallback() {
                fallback.get_or_insert(index);
                continue;
            }
            if let Some(score) = mock.criteria().evaluate(ctx, state)
                && best.is_none_or(|(_, top)| score > top)
            {
                best = Some((index, score));
            }
        }

        best.or_else(|| fallback.map(|index| (index, 0)))
    }

    /// Resolves a candidate's response and applies its side effects.
    ///
    /// Returns `Ok(None)` if its sequence turned out to be exhausted.
    fn resolve(
        &self,
        test_id: &str,
        ctx: &HttpRequestContext,
        candidate: &Candidate,
        snapshot: &Map<String, Value>,
    ) -> Result<Option<MockResponse>, SelectionError> {
        let mock = candidate
            .mock()
            .ok_or_else(|| SelectionError::Handler(format!("mock index {} out of range", candidate.mock_index)))?;
        let definition = mock.definition();

        // Outer `None` inherits the mock-level afterResponse.
        let mut condition_after: Option<Option<&AfterResponse>> = None;
        let response = if let Some(response) = &definition.response {
            response.clone()
        } else if let Some(sequence) = &definition.sequence {
            let key = candidate.sequence_key(test_id);
            let Some(position) = self
                .sequences
                .take_next(&key, sequence.responses.len(), sequence.repeat)
            else {
                return Ok(None);
            };
            sequence.responses[position].clone()
        } else if let Some(config) = &definition.state_response {
            match mock.select_condition(snapshot) {
                Some(i) => {
                    let condition = &config.conditions[i];
                    condition_after = condition.after_response.as_ref().map(Option::as_ref);
                    condition.then.clone()
                }
                None => config.default.clone(),
            }
        } else {
            MockResponse::empty(200)
        };

        for (key, source) in &definition.capture_state {
            if let Some(value) = capture::extract(ctx, &candidate.params, source) {
                self.state
                    .set(test_id, key, value)
                    .map_err(|e| SelectionError::Handler(format!("captureState '{key}': {e}")))?;
            }
        }

        let state = if definition.capture_state.is_empty() {
            snapshot.clone()
        } else {
            self.state.get_all(test_id)
        };
        let response = render(response, &TemplateContext::new(&state, &candidate.params));

        if let Some(after) = condition_after.unwrap_or(definition.after_response.as_ref()) {
            self.state.merge(test_id, &after.set_state);
        }

        Ok(Some(response))
    }
}

fn render(mut response: MockResponse, ctx: &TemplateContext<'_>) -> MockResponse {
    response.body = response.body.map(|body| apply_templates(&body, ctx));
    for value in response.headers.values_mut() {
        *value = apply_to_header(value, ctx);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::context::{InterceptedRequest, extract_context};
    use crate::dynamic::sequence::InMemorySequenceTracker;
    use crate::state::InMemoryStateManager;
    use scenarist_core::config::schema::ScenarioDefinition;
    use serde_json::json;

    struct Fixture {
        state: Arc<InMemoryStateManager>,
        selector: ResponseSelector,
    }

    fn fixture() -> Fixture {
        let state = Arc::new(InMemoryStateManager::new());
        let selector = ResponseSelector::new(state.clone(), Arc::new(InMemorySequenceTracker::new()));
        Fixture { state, selector }
    }

    fn scenario(id: &str, mocks: Value) -> Arc<RegisteredScenario> {
        let definition: ScenarioDefinition =
            serde_json::from_value(json!({"id": id, "name": id, "mocks": mocks})).unwrap();
        let compiled = definition
            .mocks
            .iter()
            .cloned()
            .map(|m| CompiledMock::compile(m).unwrap())
            .collect();
        Arc::new(RegisteredScenario::new(definition, compiled))
    }

    fn candidates(scenarios: &[&Arc<RegisteredScenario>], ctx: &HttpRequestContext) -> Vec<Candidate> {
        scenarios
            .iter()
            .flat_map(|scenario| {
                scenario
                    .mocks()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, mock)| {
                        mock.matches_endpoint(ctx).map(|params| Candidate {
                            scenario: Arc::clone(scenario),
                            mock_index: i,
                            params,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn select(
        f: &Fixture,
        scenarios: &[&Arc<RegisteredScenario>],
        request: &InterceptedRequest,
    ) -> Result<SelectedResponse, SelectionError> {
        let ctx = extract_context(request);
        f.selector.select_response("t1", &ctx, &candidates(scenarios, &ctx))
    }

    fn body(result: Result<SelectedResponse, SelectionError>) -> Value {
        result.unwrap().response.body.unwrap_or(Value::Null)
    }

    #[test]
    fn test_most_specific_wins() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([
                {"method": "POST", "url": "/checkout", "response": {"body": "fallback"}},
                {"method": "POST", "url": "/checkout", "match": {"body": {"plan": "pro"}}, "response": {"body": "one"}},
                {"method": "POST", "url": "/checkout", "match": {"body": {"plan": "pro"}, "headers": {"x-tier": "gold"}}, "response": {"body": "two"}}
            ]),
        );
        let request = InterceptedRequest::new("POST", "/checkout")
            .with_header("X-Tier", "gold")
            .with_json(&json!({"plan": "pro"}));
        assert_eq!(body(select(&f, &[&s], &request)), json!("two"));

        let request = InterceptedRequest::new("POST", "/checkout").with_json(&json!({"plan": "pro"}));
        assert_eq!(body(select(&f, &[&s], &request)), json!("one"));

        let request = InterceptedRequest::new("POST", "/checkout");
        assert_eq!(body(select(&f, &[&s], &request)), json!("fallback"));
    }

    #[test]
    fn test_ties_keep_first() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([
                {"method": "GET", "url": "/a", "match": {"query": {"x": "1"}}, "response": {"body": "first"}},
                {"method": "GET", "url": "/a", "match": {"query": {"y": "2"}}, "response": {"body": "second"}}
            ]),
        );
        let request = InterceptedRequest::new("GET", "/a?x=1&y=2");
        let selected = select(&f, &[&s], &request).unwrap();
        assert_eq!(selected.mock_index, 0);
        assert_eq!(selected.specificity, 1);
    }

    #[test]
    fn test_no_match_error() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([{"method": "GET", "url": "/a", "match": {"query": {"x": "1"}}}]),
        );
        let err = select(&f, &[&s], &InterceptedRequest::new("GET", "/a")).unwrap_err();
        assert_eq!(err.code(), "NO_MOCK_MATCHED");
    }

    #[test]
    fn test_mock_without_response_is_empty_200() {
        let f = fixture();
        let s = scenario("s", json!([{"method": "DELETE", "url": "/a"}]));
        let selected = select(&f, &[&s], &InterceptedRequest::new("DELETE", "/a")).unwrap();
        assert_eq!(selected.response, MockResponse::empty(200));
    }

    #[test]
    fn test_sequence_none_falls_through_to_fallback() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([
                {"method": "GET", "url": "/job", "match": {"headers": {"x-poll": "1"}},
                 "sequence": {"responses": [{"body": "A"}, {"body": "B"}], "repeat": "none"}},
                {"method": "GET", "url": "/job", "response": {"body": "done"}}
            ]),
        );
        let request = InterceptedRequest::new("GET", "/job").with_header("x-poll", "1");
        assert_eq!(body(select(&f, &[&s], &request)), json!("A"));
        assert_eq!(body(select(&f, &[&s], &request)), json!("B"));
        assert_eq!(body(select(&f, &[&s], &request)), json!("done"));
    }

    #[test]
    fn test_sequence_exhausted_without_fallback() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([{"method": "GET", "url": "/job",
                    "sequence": {"responses": [{"body": "A"}, {"body": "B"}], "repeat": "none"}}]),
        );
        let request = InterceptedRequest::new("GET", "/job");
        assert_eq!(body(select(&f, &[&s], &request)), json!("A"));
        assert_eq!(body(select(&f, &[&s], &request)), json!("B"));
        let err = select(&f, &[&s], &request).unwrap_err();
        assert_eq!(err.code(), "SEQUENCE_EXHAUSTED");
    }

    #[test]
    fn test_exhausted_sequence_not_matching_is_no_mock() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([{"method": "GET", "url": "/job", "match": {"headers": {"x-poll": "1"}},
                    "sequence": {"responses": [{"body": "A"}], "repeat": "none"}}]),
        );
        let matching = InterceptedRequest::new("GET", "/job").with_header("x-poll", "1");
        assert_eq!(body(select(&f, &[&s], &matching)), json!("A"));

        let other = InterceptedRequest::new("GET", "/job").with_header("x-poll", "2");
        let err = select(&f, &[&s], &other).unwrap_err();
        assert_eq!(err.code(), "NO_MOCK_MATCHED");

        let err = select(&f, &[&s], &matching).unwrap_err();
        assert_eq!(err.code(), "SEQUENCE_EXHAUSTED");
    }

    #[test]
    fn test_state_response_with_after_response() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([
                {"method": "POST", "url": "/submit", "afterResponse": {"setState": {"submitted": true}}},
                {"method": "GET", "url": "/status", "stateResponse": {
                    "default": {"body": {"state": "new"}},
                    "conditions": [{"when": {"submitted": true}, "then": {"body": {"state": "processing"}}}]
                }}
            ]),
        );
        let status = InterceptedRequest::new("GET", "/status");
        assert_eq!(body(select(&f, &[&s], &status)), json!({"state": "new"}));
        let _ = select(&f, &[&s], &InterceptedRequest::new("POST", "/submit")).unwrap();
        assert_eq!(body(select(&f, &[&s], &status)), json!({"state": "processing"}));
    }

    #[test]
    fn test_after_response_applies_to_next_request_only() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([{"method": "GET", "url": "/count",
                    "response": {"body": {"step": "{{state.step}}"}},
                    "afterResponse": {"setState": {"step": 1}}}]),
        );
        let request = InterceptedRequest::new("GET", "/count");
        assert_eq!(body(select(&f, &[&s], &request)), json!({"step": null}));
        assert_eq!(body(select(&f, &[&s], &request)), json!({"step": 1}));
    }

    #[test]
    fn test_condition_after_response_override_and_suppress() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([{"method": "GET", "url": "/flow",
                "afterResponse": {"setState": {"mock": true}},
                "stateResponse": {
                    "default": {"status": 200},
                    "conditions": [
                        {"when": {"phase": "a"}, "then": {"status": 201}, "afterResponse": {"setState": {"phase": "b"}}},
                        {"when": {"phase": "b"}, "then": {"status": 202}, "afterResponse": null}
                    ]
                }}]),
        );
        let request = InterceptedRequest::new("GET", "/flow");

        f.state.set("t1", "phase", json!("a")).unwrap();
        assert_eq!(select(&f, &[&s], &request).unwrap().response.status, 201);
        assert_eq!(f.state.get("t1", "phase"), Some(json!("b")));
        assert_eq!(f.state.get("t1", "mock"), None);

        assert_eq!(select(&f, &[&s], &request).unwrap().response.status, 202);
        assert_eq!(f.state.get("t1", "mock"), None);

        f.state.reset("t1");
        assert_eq!(select(&f, &[&s], &request).unwrap().response.status, 200);
        assert_eq!(f.state.get("t1", "mock"), Some(json!(true)));
    }

    #[test]
    fn test_capture_state_visible_in_same_response() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([{"method": "POST", "url": "/users/:id",
                "captureState": {"lastUser": "body.name", "lastId": "params.id"},
                "response": {"body": {"greeting": "hi {{state.lastUser}}", "id": "{{params.id}}"},
                             "headers": {"x-user": "{{state.lastUser}}"}}}]),
        );
        let request = InterceptedRequest::new("POST", "/users/7").with_json(&json!({"name": "ada"}));
        let selected = select(&f, &[&s], &request).unwrap();
        assert_eq!(
            selected.response.body,
            Some(json!({"greeting": "hi ada", "id": "7"}))
        );
        assert_eq!(selected.response.headers["x-user"], "ada");
        assert_eq!(f.state.get("t1", "lastId"), Some(json!("7")));
    }

    #[test]
    fn test_match_state_criteria() {
        let f = fixture();
        let s = scenario(
            "s",
            json!([
                {"method": "GET", "url": "/cart", "response": {"body": "empty"}},
                {"method": "GET", "url": "/cart", "match": {"state": {"cart.count": 1}}, "response": {"body": "one"}}
            ]),
        );
        let request = InterceptedRequest::new("GET", "/cart");
        assert_eq!(body(select(&f, &[&s], &request)), json!("empty"));
        f.state.set("t1", "cart.count", json!(1)).unwrap();
        assert_eq!(body(select(&f, &[&s], &request)), json!("one"));
    }

    #[test]
    fn test_fallback_loses_to_any_criteria_match_across_scenarios() {
        let f = fixture();
        let active = scenario("active", json!([{"method": "GET", "url": "/a", "response": {"body": "active"}}]));
        let default = scenario(
            "default",
            json!([{"method": "GET", "url": "/a", "match": {"query": {"q": "1"}}, "response": {"body": "default"}}]),
        );
        let request = InterceptedRequest::new("GET", "/a?q=1");
        assert_eq!(body(select(&f, &[&active, &default], &request)), json!("default"));
    }
}
