//! Catalog of registered scenario definitions.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use scenarist_core::config::schema::ScenarioDefinition;

use crate::dynamic::CompiledMock;
use crate::error::ScenarioError;

/// A scenario definition together with its compiled mocks.
#[derive(Debug, Clone)]
pub struct RegisteredScenario {
    definition: ScenarioDefinition,
    mocks: Vec<CompiledMock>,
}

impl RegisteredScenario {
    /// Pairs a definition with its compiled mocks, index for index.
    #[must_use]
    pub const fn new(definition: ScenarioDefinition, mocks: Vec<CompiledMock>) -> Self {
        Self { definition, mocks }
    }

    /// Scenario id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    /// The definition as registered.
    #[must_use]
    pub const fn definition(&self) -> &ScenarioDefinition {
        &self.definition
    }

    /// Compiled mocks in definition order.
    #[must_use]
    pub fn mocks(&self) -> &[CompiledMock] {
        &self.mocks
    }
}

/// Holds immutable scenario definitions keyed by id.
pub trait ScenarioRegistry: Send + Sync {
    /// Registers a scenario.
    ///
    /// Re-registering an identical definition is a no-op returning the
    /// existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Duplicate`] (and leaves the registry
    /// untouched) if the id is bound to a different definition.
    fn register(&self, scenario: RegisteredScenario) -> Result<Arc<RegisteredScenario>, ScenarioError>;

    /// Looks up a scenario by id.
    fn get(&self, id: &str) -> Option<Arc<RegisteredScenario>>;

    /// All registered scenarios, sorted by id.
    fn list(&self) -> Vec<Arc<RegisteredScenario>>;

    /// Returns `true` if the id is registered.
    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// [`ScenarioRegistry`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryScenarioRegistry {
    scenarios: DashMap<String, Arc<RegisteredScenario>>,
}

impl InMemoryScenarioRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioRegistry for InMemoryScenarioRegistry {
    fn register(&self, scenario: RegisteredScenario) -> Result<Arc<RegisteredScenario>, ScenarioError> {
        match self.scenarios.entry(scenario.id().to_string()) {
            Entry::Occupied(existing) => {
                if existing.get().definition == scenario.definition {
                    Ok(Arc::clone(existing.get()))
                } else {
                    Err(ScenarioError::Duplicate {
                        id: scenario.definition.id,
                    })
                }
            }
            Entry::Vacant(slot) => Ok(Arc::clone(slot.insert(Arc::new(scenario)).value())),
        }
    }

    fn get(&self, id: &str) -> Option<Arc<RegisteredScenario>> {
        self.scenarios.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn list(&self) -> Vec<Arc<RegisteredScenario>> {
        let mut all: Vec<_> = self
            .scenarios
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }
}
