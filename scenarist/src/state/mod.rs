//! Per-test state.
//!
//! Each test id owns an independent JSON object. Keys are dot-paths
//! (`user.tier`, `items[0]`), and a trailing `[]` appends to an array.
//! The [`StateManager`] trait is the seam for swapping in a shared
//! backing store; [`InMemoryStateManager`] keeps everything in-process.

pub mod tree;

use dashmap::DashMap;
use serde_json::{Map, Value};

use scenarist_core::path::{PathError, StatePath};

/// Per-test-id key/value store with nested-path access.
///
/// Every mutation is atomic for its test id: no reader observes a
/// half-applied write.
pub trait StateManager: Send + Sync {
    /// Reads the value at `path`, or `None` if it is missing or invalid.
    fn get(&self, test_id: &str, path: &str) -> Option<Value>;

    /// Writes `value` at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] (and writes nothing) if the path is
    /// malformed or names a dangerous key.
    fn set(&self, test_id: &str, path: &str, value: Value) -> Result<(), PathError>;

    /// Shallow-merges `partial` into the test's state.
    fn merge(&self, test_id: &str, partial: &Map<String, Value>);

    /// Snapshot of the test's entire state (empty if none).
    fn get_all(&self, test_id: &str) -> Map<String, Value>;

    /// Drops all state for the test id.
    fn reset(&self, test_id: &str);
}

/// [`StateManager`] backed by a sharded concurrent map.
///
/// Each test id's state lives in its own entry, so writes for different
/// test ids never contend on the same lock.
#[derive(Debug, Default)]
pub struct InMemoryStateManager {
    buckets: DashMap<String, Map<String, Value>>,
}

impl InMemoryStateManager {
    /// Creates an empty state manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of test ids currently holding state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no test id holds state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl StateManager for InMemoryStateManager {
    fn get(&self, test_id: &str, path: &str) -> Option<Value> {
        let path = StatePath::parse(path).ok()?;
        let bucket = self.buckets.get(test_id)?;
        tree::get_path(&bucket, &path)
    }

    fn set(&self, test_id: &str, path: &str, value: Value) -> Result<(), PathError> {
        let path = StatePath::parse(path)?;
        let mut bucket = self.buckets.entry(test_id.to_string()).or_default();
        tree::set_path(&mut bucket, &path, value);
        Ok(())
    }

    fn merge(&self, test_id: &str, partial: &Map<String, Value>) {
        let mut bucket = self.buckets.entry(test_id.to_string()).or_default();
        tree::merge_shallow(&mut bucket, partial);
    }

    fn get_all(&self, test_id: &str) -> Map<String, Value> {
        self.buckets
            .get(test_id)
            .map(|bucket| bucket.clone())
            .unwrap_or_default()
    }

    fn reset(&self, test_id: &str) {
        self.buckets.remove(test_id);
    }
}
