//! Types for conflict resolution

use concord_core::{unit_interval, AgentId, ConflictingSignal, Decision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy that produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Weight agents by their overall learned accuracy
    HistoricalAccuracy,

    /// Weight agents by their accuracy in the current regime
    RegimeSpecialist,

    /// Weight agents by their own confidence and strength
    ConfidenceWeighted,

    /// One vote per agent, two for high-conviction signals
    ConvictionVoting,

    /// Votes attributed through shared technical indicators
    IndicatorConsensus,

    /// Conservative majority that abstains whenever anyone is neutral
    RiskAdjusted,

    /// Weight agents by how often they won past conflicts
    ConflictRecord,

    /// Replay of a decision that worked for the same signature before
    MetaPattern,

    /// All agents agreed; no arbitration needed
    Consensus,
}

impl ResolutionMethod {
    /// The scoring library in selection order; earlier entries win score ties
    pub const LIBRARY: [ResolutionMethod; 7] = [
        ResolutionMethod::HistoricalAccuracy,
        ResolutionMethod::RegimeSpecialist,
        ResolutionMethod::ConfidenceWeighted,
        ResolutionMethod::ConvictionVoting,
        ResolutionMethod::IndicatorConsensus,
        ResolutionMethod::RiskAdjusted,
        ResolutionMethod::ConflictRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HistoricalAccuracy => "historical_accuracy",
            Self::RegimeSpecialist => "regime_specialist",
            Self::ConfidenceWeighted => "confidence_weighted",
            Self::ConvictionVoting => "conviction_voting",
            Self::IndicatorConsensus => "indicator_consensus",
            Self::RiskAdjusted => "risk_adjusted",
            Self::ConflictRecord => "conflict_record",
            Self::MetaPattern => "meta_pattern",
            Self::Consensus => "consensus",
        }
    }

    /// Starting accuracy before any outcome has been observed.
    /// `None` for methods that are never scored.
    pub fn prior_accuracy(&self) -> Option<f64> {
        match self {
            Self::HistoricalAccuracy => Some(0.60),
            Self::RegimeSpecialist => Some(0.62),
            Self::ConfidenceWeighted => Some(0.55),
            Self::ConvictionVoting => Some(0.58),
            Self::IndicatorConsensus => Some(0.57),
            Self::RiskAdjusted => Some(0.65),
            Self::ConflictRecord => Some(0.56),
            Self::MetaPattern => Some(0.70),
            Self::Consensus => None,
        }
    }
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arbitrated decision plus sizing and risk hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub decision: Decision,

    /// Confidence in the decision (0.0 to 1.0)
    pub confidence: f64,

    /// Strategy that produced the decision
    pub method: ResolutionMethod,

    /// Agents whose direction matches the decision
    pub trusted_bots: Vec<AgentId>,

    /// Every other agent
    pub overridden_bots: Vec<AgentId>,

    /// Explanation of the decision
    pub reasoning: String,

    /// Scale applied to the nominal position size (about 0 to 1.5)
    pub position_size_multiplier: f64,

    /// Stop-loss distance multiplier (about 0.8 to 1.0, lower is tighter)
    pub stop_loss_adjustment: f64,
}

impl ConflictResolution {
    /// Build a resolution, splitting agents into trusted and overridden by the decision
    pub fn new(
        decision: Decision,
        confidence: f64,
        method: ResolutionMethod,
        signals: &[ConflictingSignal],
        reasoning: impl Into<String>,
    ) -> Self {
        let (trusted, overridden): (Vec<_>, Vec<_>) = signals
            .iter()
            .partition(|s| decision.agrees_with(s.direction));

        Self {
            decision,
            confidence: unit_interval(confidence),
            method,
            trusted_bots: trusted.into_iter().map(|s| s.agent_id.clone()).collect(),
            overridden_bots: overridden.into_iter().map(|s| s.agent_id.clone()).collect(),
            reasoning: reasoning.into(),
            position_size_multiplier: 1.0,
            stop_loss_adjustment: 1.0,
        }
    }

    /// Abstain with no exposure
    pub fn abstain(
        method: ResolutionMethod,
        signals: &[ConflictingSignal],
        reasoning: impl Into<String>,
    ) -> Self {
        Self::new(Decision::Abstain, 0.0, method, signals, reasoning).with_sizing(0.0, 1.0)
    }

    pub fn with_sizing(mut self, position_size_multiplier: f64, stop_loss_adjustment: f64) -> Self {
        self.position_size_multiplier = position_size_multiplier;
        self.stop_loss_adjustment = stop_loss_adjustment;
        self
    }

    pub fn is_trusted(&self, agent: &AgentId) -> bool {
        self.trusted_bots.contains(agent)
    }
}

/// Process-wide monitoring counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Conflicts detected (consensus submissions excluded)
    pub total_conflicts: u64,

    /// Submissions resolved by the consensus fast path
    pub consensus_count: u64,

    pub resolved_correctly: u64,

    pub resolved_incorrectly: u64,

    pub abstained: u64,

    /// Rolling accuracy of each scored method (0.0 to 1.0)
    pub method_accuracy: BTreeMap<ResolutionMethod, f64>,

    /// Mean confidence over every conflict resolution issued
    pub average_confidence: f64,

    /// Resolutions issued per method
    pub by_method: BTreeMap<ResolutionMethod, u64>,
}

/// Weight of the previous value in the method accuracy EMA
const METHOD_ACCURACY_ALPHA: f64 = 0.05;

impl ResolutionStats {
    /// Fresh counters with method accuracies seeded from their priors
    pub fn new() -> Self {
        let method_accuracy = ResolutionMethod::LIBRARY
            .iter()
            .chain(std::iter::once(&ResolutionMethod::MetaPattern))
            .filter_map(|m| m.prior_accuracy().map(|p| (*m, p)))
            .collect();

        Self {
            total_conflicts: 0,
            consensus_count: 0,
            resolved_correctly: 0,
            resolved_incorrectly: 0,
            abstained: 0,
            method_accuracy,
            average_confidence: 0.0,
            by_method: BTreeMap::new(),
        }
    }

    /// Rolling accuracy for a method, falling back to its prior
    pub fn method_accuracy(&self, method: ResolutionMethod) -> f64 {
        self.method_accuracy
            .get(&method)
            .copied()
            .or_else(|| method.prior_accuracy())
            .unwrap_or(0.5)
    }

    /// Count a resolution issued for a detected conflict
    pub fn record_resolution(&mut self, resolution: &ConflictResolution) {
        let issued: u64 = self
            .by_method
            .iter()
            .filter(|(m, _)| **m != ResolutionMethod::Consensus)
            .map(|(_, n)| *n)
            .sum();

        self.average_confidence = (self.average_confidence * issued as f64
            + resolution.confidence)
            / (issued + 1) as f64;

        *self.by_method.entry(resolution.method).or_insert(0) += 1;
    }

    /// Count a consensus fast-path resolution
    pub fn record_consensus(&mut self) {
        self.consensus_count += 1;
        *self.by_method.entry(ResolutionMethod::Consensus).or_insert(0) += 1;
    }

    /// Fold a realized outcome into the counters and the method's accuracy
    pub fn record_outcome(&mut self, resolution: &ConflictResolution, correct: bool) {
        if resolution.decision.is_abstain() {
            self.abstained += 1;
        } else if correct {
            self.resolved_correctly += 1;
        } else {
            self.resolved_incorrectly += 1;
        }

        if resolution.method.prior_accuracy().is_some() {
            let current = self.method_accuracy(resolution.method);
            let updated = concord_core::ema_hit(current, correct, METHOD_ACCURACY_ALPHA);
            self.method_accuracy.insert(resolution.method, updated);
        }
    }
}

impl Default for ResolutionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::Direction;

    fn signals() -> Vec<ConflictingSignal> {
        vec![
            ConflictingSignal::new("a", Direction::Long, 0.8, 0.9),
            ConflictingSignal::new("b", Direction::Short, 0.6, 0.5),
            ConflictingSignal::new("c", Direction::Long, 0.4, 0.7),
        ]
    }

    #[test]
    fn test_partition_by_decision() {
        let r = ConflictResolution::new(
            Decision::Long,
            0.7,
            ResolutionMethod::ConfidenceWeighted,
            &signals(),
            "test",
        );
        assert_eq!(r.trusted_bots, vec![AgentId::from("a"), AgentId::from("c")]);
        assert_eq!(r.overridden_bots, vec![AgentId::from("b")]);
    }

    #[test]
    fn test_abstain_overrides_everyone() {
        let r = ConflictResolution::abstain(ResolutionMethod::RiskAdjusted, &signals(), "no");
        assert!(r.trusted_bots.is_empty());
        assert_eq!(r.overridden_bots.len(), 3);
        assert_eq!(r.position_size_multiplier, 0.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let r = ConflictResolution::new(
            Decision::Short,
            1.4,
            ResolutionMethod::HistoricalAccuracy,
            &signals(),
            "",
        );
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_stats_seeded_with_priors() {
        let stats = ResolutionStats::new();
        assert_eq!(stats.method_accuracy.len(), 8);
        assert_eq!(stats.method_accuracy(ResolutionMethod::RiskAdjusted), 0.65);
        assert!(!stats.method_accuracy.contains_key(&ResolutionMethod::Consensus));
    }

    #[test]
    fn test_outcome_buckets_and_accuracy_ema() {
        let mut stats = ResolutionStats::new();
        let long = ConflictResolution::new(
            Decision::Long,
            0.7,
            ResolutionMethod::ConfidenceWeighted,
            &signals(),
            "",
        );
        stats.record_outcome(&long, true);
        assert_eq!(stats.resolved_correctly, 1);
        let expected = 0.55 * 0.95 + 0.05;
        assert!((stats.method_accuracy(ResolutionMethod::ConfidenceWeighted) - expected).abs() < 1e-12);

        stats.record_outcome(&long, false);
        assert_eq!(stats.resolved_incorrectly, 1);

        let abstain = ConflictResolution::abstain(ResolutionMethod::RiskAdjusted, &signals(), "");
        stats.record_outcome(&abstain, true);
        assert_eq!(stats.abstained, 1);
        assert_eq!(stats.resolved_correctly, 1);
    }

    #[test]
    fn test_average_confidence_excludes_consensus() {
        let mut stats = ResolutionStats::new();
        stats.record_consensus();
        let mut r = ConflictResolution::new(
            Decision::Long,
            0.8,
            ResolutionMethod::HistoricalAccuracy,
            &signals(),
            "",
        );
        stats.record_resolution(&r);
        r.confidence = 0.6;
        stats.record_resolution(&r);
        assert!((stats.average_confidence - 0.7).abs() < 1e-12);
        assert_eq!(stats.by_method[&ResolutionMethod::HistoricalAccuracy], 2);
        assert_eq!(stats.consensus_count, 1);
    }
}
