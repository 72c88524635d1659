//! Response sequence cursors.
//!
//! A cursor is keyed by (test id, scenario id, mock index), so the same
//! mock in two scenarios, or under two test ids, never shares progress.

use std::collections::HashMap;

use dashmap::DashMap;

use scenarist_core::config::schema::RepeatMode;

/// Identifies one sequence cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    /// Owning test id
    pub test_id: String,
    /// Scenario that defines the mock
    pub scenario_id: String,
    /// Index of the mock within its scenario
    pub mock_index: usize,
}

impl SequenceKey {
    /// Creates a key.
    #[must_use]
    pub fn new(test_id: impl Into<String>, scenario_id: impl Into<String>, mock_index: usize) -> Self {
        Self {
            test_id: test_id.into(),
            scenario_id: scenario_id.into(),
            mock_index,
        }
    }
}

/// Progress through a sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencePosition {
    /// Index of the next response to serve
    pub position: usize,
    /// Set once a `repeat: none` sequence has served every response
    pub exhausted: bool,
}

/// Computes the cursor after serving `current.position`.
///
/// - `last` clamps at the final index
/// - `cycle` wraps back to zero
/// - `none` moves past the end and marks the cursor exhausted
#[must_use]
pub const fn next_position(current: SequencePosition, len: usize, repeat: RepeatMode) -> SequencePosition {
    if len == 0 {
        return SequencePosition {
            position: 0,
            exhausted: true,
        };
    }
    let next = current.position.saturating_add(1);
    match repeat {
        RepeatMode::Last => SequencePosition {
            position: if next < len { next } else { len - 1 },
            exhausted: false,
        },
        RepeatMode::Cycle => SequencePosition {
            position: next % len,
            exhausted: false,
        },
        RepeatMode::None => SequencePosition {
            position: next,
            exhausted: next >= len,
        },
    }
}

/// Stores sequence cursors.
///
/// [`take_next`](Self::take_next) reads and advances in one step; callers
/// must not emulate it with separate `get_position` and `advance` calls
/// when requests can race.
pub trait SequenceTracker: Send + Sync {
    /// Current cursor (the zero position if never advanced).
    fn get_position(&self, key: &SequenceKey) -> SequencePosition;

    /// Advances the cursor by one response.
    fn advance(&self, key: &SequenceKey, len: usize, repeat: RepeatMode);

    /// Returns the index to serve and advances, or `None` if exhausted.
    fn take_next(&self, key: &SequenceKey, len: usize, repeat: RepeatMode) -> Option<usize>;

    /// Drops every cursor owned by the test id.
    fn reset(&self, test_id: &str);

    /// Returns `true` if the cursor is exhausted.
    fn is_exhausted(&self, key: &SequenceKey) -> bool {
        self.get_position(key).exhausted
    }
}

/// [`SequenceTracker`] holding cursors in memory, one lock per test id.
#[derive(Debug, Default)]
pub struct InMemorySequenceTracker {
    cursors: DashMap<String, HashMap<(String, usize), SequencePosition>>,
}

impl InMemorySequenceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceTracker for InMemorySequenceTracker {
    fn get_position(&self, key: &SequenceKey) -> SequencePosition {
        self.cursors
            .get(&key.test_id)
            .and_then(|test| test.get(&(key.scenario_id.clone(), key.mock_index)).copied())
            .unwrap_or_default()
    }

    fn advance(&self, key: &SequenceKey, len: usize, repeat: RepeatMode) {
        let mut test = self.cursors.entry(key.test_id.clone()).or_default();
        let cursor = test
            .entry((key.scenario_id.clone(), key.mock_index))
            .or_default();
        *cursor = next_position(*cursor, len, repeat);
    }

    fn take_next(&self, key: &SequenceKey, len: usize, repeat: RepeatMode) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut test = self.cursors.entry(key.test_id.clone()).or_default();
        let cursor = test
            .entry((key.scenario_id.clone(), key.mock_index))
            .or_default();
        if cursor.exhausted {
            return None;
        }
        // Clamp in case the sequence shrank after re-registration.
        let index = cursor.position.min(len - 1);
        *cursor = next_position(
            SequencePosition {
                position: index,
                exhausted: false,
            },
            len,
            repeat,
        );
        Some(index)
    }

    fn reset(&self, test_id: &str) {
        self.cursors.remove(test_id);
    }
}
