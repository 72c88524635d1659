//! Active scenario per test id.

use dashmap::DashMap;

use scenarist_core::config::schema::ActiveScenario;

/// Maps test ids to their active scenario reference.
pub trait ScenarioStore: Send + Sync {
    /// Stores (or overwrites) the active scenario for a test id.
    fn set(&self, test_id: &str, active: ActiveScenario);

    /// Active scenario for a test id.
    fn get(&self, test_id: &str) -> Option<ActiveScenario>;

    /// Removes the entry, returning `true` if one existed.
    fn delete(&self, test_id: &str) -> bool;
}

/// [`ScenarioStore`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryScenarioStore {
    active: DashMap<String, ActiveScenario>,
}

impl InMemoryScenarioStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioStore for InMemoryScenarioStore {
    fn set(&self, test_id: &str, active: ActiveScenario) {
        self.active.insert(test_id.to_string(), active);
    }

    fn get(&self, test_id: &str) -> Option<ActiveScenario> {
        self.active.get(test_id).map(|entry| entry.value().clone())
    }

    fn delete(&self, test_id: &str) -> bool {
        self.active.remove(test_id).is_some()
    }
}
