//! Dynamic response system.
//!
//! URL pattern matching, match criteria, response sequences, state
//! capture and template substitution, tied together by the
//! [`ResponseSelector`](selector::ResponseSelector).

pub mod capture;
pub mod context;
pub mod matching;
pub mod selector;
pub mod sequence;
pub mod template;
pub mod url;

use serde_json::{Map, Value};

use scenarist_core::config::schema::MockDefinition;
use scenarist_core::path::StatePath;

use crate::error::ValidationIssue;

use context::HttpRequestContext;
use matching::{CompiledCriteria, compile_state_expectations, state_matches};
use self::url::UrlMatcher;

/// A mock definition with its patterns compiled.
///
/// Compilation happens once at registration; request handling never
/// parses a pattern.
#[derive(Debug, Clone)]
pub struct CompiledMock {
    definition: MockDefinition,
    url: UrlMatcher,
    criteria: CompiledCriteria,
    conditions: Vec<Vec<(StatePath, Value)>>,
}

impl CompiledMock {
    /// Compiles a mock definition.
    ///
    /// # Errors
    ///
    /// Returns every issue found, with paths relative to the mock.
    pub fn compile(definition: MockDefinition) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let url = UrlMatcher::compile(&definition.url)
            .map_err(|e| issues.push(ValidationIssue::error("url", e.to_string())))
            .ok();

        let criteria = definition
            .match_criteria
            .as_ref()
            .map_or_else(|| Ok(CompiledCriteria::default()), CompiledCriteria::compile)
            .map_err(|(field, e)| issues.push(ValidationIssue::error(format!("match.{field}"), e)))
            .ok();

        let mut conditions = Vec::new();
        if let Some(config) = &definition.state_response {
            for (i, condition) in config.conditions.iter().enumerate() {
                match compile_state_expectations(&condition.when) {
                    Ok(expected) => conditions.push(expected),
                    Err((key, e)) => issues.push(ValidationIssue::error(
                        format!("stateResponse.conditions[{i}].when.{key}"),
                        e,
                    )),
                }
            }
        }

        match (url, criteria) {
            (Some(url), Some(criteria)) if issues.is_empty() => Ok(Self {
                definition,
                url,
                criteria,
                conditions,
            }),
            _ => Err(issues),
        }
    }

    /// The source definition.
    #[must_use]
    pub const fn definition(&self) -> &MockDefinition {
        &self.definition
    }

    /// Compiled match criteria.
    #[must_use]
    pub const fn criteria(&self) -> &CompiledCriteria {
        &self.criteria
    }

    /// Returns `true` for a criteria-less mock.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.definition.is_fallback()
    }

    /// Matches method and URL, returning the extracted path parameters.
    #[must_use]
    pub fn matches_endpoint(&self, ctx: &HttpRequestContext) -> Option<Map<String, Value>> {
        if !self.definition.method.as_str().eq_ignore_ascii_case(&ctx.method) {
            return None;
        }
        self.url.match_url(&ctx.url)
    }

    /// Index of the `stateResponse` condition that wins for `state`.
    ///
    /// The condition with the most `when` keys wins; earlier conditions win
    /// ties. `None` means the default response applies.
    #[must_use]
    pub fn select_condition(&self, state: &Map<String, Value>) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, expected) in self.conditions.iter().enumerate() {
            if !state_matches(expected, state) {
                continue;
            }
            if best.is_none_or(|(_, score)| expected.len() > score) {
                best = Some((i, expected.len()));
            }
        }
        best.map(|(i, _)| i)
    }
}
