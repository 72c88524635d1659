//! Scenario registry, per-test active scenario store, and the manager
//! that coordinates them.

pub mod manager;
pub mod registry;
pub mod store;

pub use manager::ScenarioManager;
pub use registry::{InMemoryScenarioRegistry, RegisteredScenario, ScenarioRegistry};
pub use store::{InMemoryScenarioStore, ScenarioStore};
