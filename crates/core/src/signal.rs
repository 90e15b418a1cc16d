//! Proposed signals and the conflict cases built from them

use crate::bounds::unit_interval;
use crate::types::{AgentId, CaseId, Direction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A trade direction proposed by one agent for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingSignal {
    /// Agent that produced the signal
    pub agent_id: AgentId,

    /// Human-readable agent name
    pub agent_name: String,

    /// Proposed direction
    pub direction: Direction,

    /// Signal strength, nominally in [0, 1]
    pub strength: f64,

    /// Agent's own confidence, nominally in [0, 1]
    pub confidence: f64,

    /// Technical indicators that motivated the signal
    #[serde(default)]
    pub indicators: BTreeSet<String>,

    /// Free-text rationale
    #[serde(default)]
    pub reasoning: String,

    pub timestamp: DateTime<Utc>,
}

impl ConflictingSignal {
    /// Create a signal stamped with the current time
    pub fn new(
        agent_id: impl Into<String>,
        direction: Direction,
        strength: f64,
        confidence: f64,
    ) -> Self {
        let agent_id = agent_id.into();
        Self {
            agent_name: agent_id.clone(),
            agent_id: AgentId(agent_id),
            direction,
            strength,
            confidence,
            indicators: BTreeSet::new(),
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn with_indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indicators = indicators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Strength clamped to [0, 1]
    pub fn bounded_strength(&self) -> f64 {
        unit_interval(self.strength)
    }

    /// Confidence clamped to [0, 1]
    pub fn bounded_confidence(&self) -> f64 {
        unit_interval(self.confidence)
    }

    /// Replace strength and confidence with their bounded values.
    /// Returns true if either was NaN or out of range.
    pub fn sanitize(&mut self) -> bool {
        let strength = self.bounded_strength();
        let confidence = self.bounded_confidence();
        let changed = strength.to_bits() != self.strength.to_bits()
            || confidence.to_bits() != self.confidence.to_bits();
        self.strength = strength;
        self.confidence = confidence;
        changed
    }
}

/// Distinct directions present in a signal set, in tie-break order
pub fn distinct_directions(signals: &[ConflictingSignal]) -> Vec<Direction> {
    Direction::ALL
        .into_iter()
        .filter(|d| signals.iter().any(|s| s.direction == *d))
        .collect()
}

/// Realized outcome reported for a resolved case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    /// Direction the market actually took
    pub actual_direction: Direction,

    /// Realized profit and loss of acting on the resolution
    pub realized_pnl: f64,

    /// Whether the resolution matched the realized outcome
    pub resolution_correct: bool,

    /// Whether any overridden agent had proposed the realized direction
    pub overridden_bots_correct: bool,

    pub recorded_at: DateTime<Utc>,
}

/// A disagreement among agents over one instrument.
///
/// Generic over the resolution type so that the resolver crate can attach its
/// own result without this crate depending on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCase<R> {
    pub id: CaseId,

    /// Instrument symbol
    pub symbol: String,

    /// Market regime label at detection time
    pub regime: String,

    pub signals: Vec<ConflictingSignal>,

    pub created_at: DateTime<Utc>,

    pub resolution: Option<R>,

    pub resolved_at: Option<DateTime<Utc>>,

    pub outcome: Option<CaseOutcome>,
}

impl<R> ConflictCase<R> {
    pub fn new(
        symbol: impl Into<String>,
        regime: impl Into<String>,
        signals: Vec<ConflictingSignal>,
    ) -> Self {
        Self {
            id: CaseId::new(),
            symbol: symbol.into(),
            regime: regime.into(),
            signals,
            created_at: Utc::now(),
            resolution: None,
            resolved_at: None,
            outcome: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Attach a resolution; a case is resolved at most once
    pub fn resolve(&mut self, resolution: R) -> bool {
        if self.resolution.is_some() {
            return false;
        }
        self.resolution = Some(resolution);
        self.resolved_at = Some(Utc::now());
        true
    }

    /// Attach an outcome; a case receives at most one outcome
    pub fn record_outcome(&mut self, outcome: CaseOutcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}
