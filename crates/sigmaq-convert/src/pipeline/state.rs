//! Pipeline state tracking.
//!
//! Tracks which processing items have been applied (pipeline-wide and
//! per-rule) and stores key-value state set by `SetState` transformations.

use std::collections::{HashMap, HashSet};

/// Mutable state carried through a pipeline's application to one or more rules.
///
/// Pipeline and filter definitions themselves are never mutated during
/// application; this is the only mutable carrier.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// IDs of processing items that have been applied across all rules.
    pub applied_items: HashSet<String>,

    /// IDs of processing items applied to the current rule being processed.
    /// Reset between rules.
    pub rule_applied: HashSet<String>,

    /// Arbitrary key-value state set by `SetState` transformations.
    pub state: HashMap<String, serde_json::Value>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a processing item with the given ID was applied.
    pub fn mark_applied(&mut self, id: &str) {
        self.applied_items.insert(id.to_string());
        self.rule_applied.insert(id.to_string());
    }

    /// Check if a processing item with the given ID was applied (anywhere or
    /// to the current rule).
    pub fn was_applied(&self, id: &str) -> bool {
        self.applied_items.contains(id) || self.rule_applied.contains(id)
    }

    /// Get a state value.
    pub fn get_state(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.get(key)
    }

    /// Set a state value.
    pub fn set_state(&mut self, key: String, val: serde_json::Value) {
        self.state.insert(key, val);
    }

    /// Check if a state key has a specific string value.
    pub fn state_matches(&self, key: &str, val: &str) -> bool {
        self.state
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == val)
    }

    /// Reset per-rule tracking (called before processing each rule).
    pub fn reset_rule(&mut self) {
        self.rule_applied.clear();
    }
}
