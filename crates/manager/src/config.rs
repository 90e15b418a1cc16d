//! Configuration for the conflict engine

use concord_resolver::{MethodLibrary, PatternMatchConfig, DEFAULT_MIN_CONFIDENCE_TO_ACT};
use serde::{Deserialize, Serialize};

/// Conflict engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Confidence below which weighted methods abstain (0.0 to 1.0)
    pub min_confidence_to_act: f64,

    /// Resolved cases kept in history; halved by dropping the oldest when exceeded
    pub history_limit: usize,

    /// Prior resolutions under a signature required before pattern replay
    pub pattern_min_occurrences: usize,

    /// Prior resolutions that must have proved right before pattern replay
    pub pattern_min_successes: usize,

    /// Minimum success rate for a replayed decision (0.0 to 1.0)
    pub pattern_min_success_rate: f64,

    /// Per-signature cap on pattern memory; `None` never forgets
    pub pattern_history_limit: Option<usize>,

    /// Publish lifecycle notifications to subscribers
    pub emit_notifications: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence_to_act: DEFAULT_MIN_CONFIDENCE_TO_ACT,
            history_limit: 10_000,
            pattern_min_occurrences: 3,
            pattern_min_successes: 2,
            pattern_min_success_rate: 0.6,
            pattern_history_limit: None,
            emit_notifications: true,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the abstain threshold
    pub fn with_min_confidence_to_act(mut self, threshold: f64) -> Self {
        self.min_confidence_to_act = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the case history cap
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Set the pattern replay occurrence threshold
    pub fn with_pattern_min_occurrences(mut self, occurrences: usize) -> Self {
        self.pattern_min_occurrences = occurrences;
        self
    }

    /// Set the pattern replay success threshold
    pub fn with_pattern_min_successes(mut self, successes: usize) -> Self {
        self.pattern_min_successes = successes;
        self
    }

    /// Set the minimum pattern success rate
    pub fn with_pattern_min_success_rate(mut self, rate: f64) -> Self {
        self.pattern_min_success_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Cap pattern memory per signature
    pub fn with_pattern_history_limit(mut self, limit: Option<usize>) -> Self {
        self.pattern_history_limit = limit;
        self
    }

    /// Enable or disable notifications
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.emit_notifications = enabled;
        self
    }

    pub(crate) fn method_library(&self) -> MethodLibrary {
        MethodLibrary::new(self.min_confidence_to_act)
    }

    pub(crate) fn pattern_match(&self) -> PatternMatchConfig {
        PatternMatchConfig {
            min_occurrences: self.pattern_min_occurrences,
            min_successes: self.pattern_min_successes,
            min_success_rate: self.pattern_min_success_rate,
        }
    }
}
