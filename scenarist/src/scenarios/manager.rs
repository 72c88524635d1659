//! Scenario lifecycle orchestration.
//!
//! [`ScenarioManager`] ties together the registry, the per-test active
//! scenario store, and the state and sequence stores whose contents are
//! scoped to a test's current scenario.

use std::sync::Arc;

use scenarist_core::config::schema::{ActiveScenario, ScenarioDefinition};
use scenarist_core::config::validation::Validator;

use crate::dynamic::CompiledMock;
use crate::dynamic::sequence::{InMemorySequenceTracker, SequenceTracker};
use crate::error::{ScenarioError, ValidationIssue};
use crate::observability::metrics;
use crate::state::{InMemoryStateManager, StateManager};

use super::registry::{InMemoryScenarioRegistry, RegisteredScenario, ScenarioRegistry};
use super::store::{InMemoryScenarioStore, ScenarioStore};

/// Maximum edit distance for a did-you-mean suggestion.
const SUGGESTION_DISTANCE: usize = 3;

/// Registers, switches and clears scenarios.
#[derive(Clone)]
pub struct ScenarioManager {
    registry: Arc<dyn ScenarioRegistry>,
    store: Arc<dyn ScenarioStore>,
    state: Arc<dyn StateManager>,
    sequences: Arc<dyn SequenceTracker>,
}

impl std::fmt::Debug for ScenarioManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioManager")
            .field("scenarios", &self.registry.list().len())
            .finish_non_exhaustive()
    }
}

impl Default for ScenarioManager {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ScenarioManager {
    /// Creates a manager over the given stores.
    #[must_use]
    pub fn new(
        registry: Arc<dyn ScenarioRegistry>,
        store: Arc<dyn ScenarioStore>,
        state: Arc<dyn StateManager>,
        sequences: Arc<dyn SequenceTracker>,
    ) -> Self {
        Self {
            registry,
            store,
            state,
            sequences,
        }
    }

    /// Creates a manager with in-process stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryScenarioRegistry::new()),
            Arc::new(InMemoryScenarioStore::new()),
            Arc::new(InMemoryStateManager::new()),
            Arc::new(InMemorySequenceTracker::new()),
        )
    }

    /// Validates, compiles and registers a scenario.
    ///
    /// # Errors
    ///
    /// - [`ScenarioError::Invalid`] if validation or pattern compilation fails
    /// - [`ScenarioError::Duplicate`] if the id is bound to a different definition
    pub fn register_scenario(
        &self,
        definition: ScenarioDefinition,
    ) -> Result<Arc<RegisteredScenario>, ScenarioError> {
        let result = Validator::new().validate(&definition);
        for warning in &result.warnings {
            tracing::warn!(scenario = %definition.id, "{warning}");
        }
        if !result.is_valid() {
            return Err(ScenarioError::Invalid {
                id: definition.id,
                issues: result.errors,
            });
        }

        let mut mocks = Vec::with_capacity(definition.mocks.len());
        let mut issues: Vec<ValidationIssue> = Vec::new();
        for (i, mock) in definition.mocks.iter().enumerate() {
            match CompiledMock::compile(mock.clone()) {
                Ok(compiled) => mocks.push(compiled),
                Err(found) => issues.extend(found.into_iter().map(|issue| {
                    ValidationIssue::error(format!("mocks[{i}].{}", issue.path), issue.message)
                })),
            }
        }
        if !issues.is_empty() {
            return Err(ScenarioError::Invalid {
                id: definition.id,
                issues,
            });
        }

        let id = definition.id.clone();
        let registered = self
            .registry
            .register(RegisteredScenario::new(definition, mocks))?;
        metrics::set_scenarios_registered(self.registry.list().len());
        tracing::info!(scenario = %id, mocks = registered.mocks().len(), "scenario registered");
        Ok(registered)
    }

    /// Makes `scenario_id` the active scenario for `test_id`.
    ///
    /// The test's state and sequence cursors are reset, including when
    /// switching to the scenario that is already active.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::NotFound`] (with a suggestion when a
    /// registered id is close) if the scenario is not registered.
    pub fn switch_scenario(
        &self,
        test_id: &str,
        scenario_id: &str,
        variant: Option<String>,
    ) -> Result<ActiveScenario, ScenarioError> {
        if !self.registry.contains(scenario_id) {
            return Err(ScenarioError::NotFound {
                id: scenario_id.to_string(),
                suggestion: self.suggest(scenario_id),
            });
        }

        self.state.reset(test_id);
        self.sequences.reset(test_id);
        let active = ActiveScenario {
            scenario_id: scenario_id.to_string(),
            variant_name: variant,
        };
        self.store.set(test_id, active.clone());

        metrics::record_scenario_switch();
        tracing::info!(test_id, scenario = scenario_id, variant = ?active.variant_name, "scenario switched");
        Ok(active)
    }

    /// Active scenario reference for a test id.
    #[must_use]
    pub fn get_active_scenario(&self, test_id: &str) -> Option<ActiveScenario> {
        self.store.get(test_id)
    }

    /// Registered scenario by id.
    #[must_use]
    pub fn get_scenario_by_id(&self, id: &str) -> Option<Arc<RegisteredScenario>> {
        self.registry.get(id)
    }

    /// All registered scenarios, sorted by id.
    #[must_use]
    pub fn list_scenarios(&self) -> Vec<Arc<RegisteredScenario>> {
        self.registry.list()
    }

    /// Clears the test's active scenario, state and sequence cursors.
    ///
    /// Returns `true` if a scenario was active.
    pub fn clear_scenario(&self, test_id: &str) -> bool {
        self.state.reset(test_id);
        self.sequences.reset(test_id);
        let cleared = self.store.delete(test_id);
        tracing::debug!(test_id, cleared, "scenario cleared");
        cleared
    }

    /// Per-test state store.
    #[must_use]
    pub fn state(&self) -> &Arc<dyn StateManager> {
        &self.state
    }

    /// Sequence cursor store.
    #[must_use]
    pub fn sequences(&self) -> &Arc<dyn SequenceTracker> {
        &self.sequences
    }

    fn suggest(&self, input: &str) -> Option<String> {
        self.registry
            .list()
            .iter()
            .map(|s| (s.id().to_string(), strsim::damerau_levenshtein(input, s.id())))
            .filter(|(_, dist)| *dist <= SUGGESTION_DISTANCE)
            .min_by_key(|(_, dist)| *dist)
            .map(|(id, _)| id)
    }
}
