//! Method selector: ranks library candidates and picks one

use crate::methods::{MethodLibrary, ResolutionContext};
use crate::patterns::{PatternMatchConfig, PatternMemory};
use crate::types::{ConflictResolution, ResolutionMethod, ResolutionStats};
use tracing::debug;

/// A library candidate with its selection score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub resolution: ConflictResolution,
    pub score: f64,
}

/// `accuracy×0.4 + confidence×0.4 + min(1, trusted/3)×0.2`
pub fn score_candidate(candidate: &ConflictResolution, method_accuracy: f64) -> f64 {
    let trusted = (candidate.trusted_bots.len() as f64 / 3.0).min(1.0);
    method_accuracy * 0.4 + candidate.confidence * 0.4 + trusted * 0.2
}

/// Score every candidate, in the order given
pub fn rank(candidates: Vec<ConflictResolution>, stats: &ResolutionStats) -> Vec<ScoredCandidate> {
    candidates
        .into_iter()
        .map(|resolution| {
            let score = score_candidate(&resolution, stats.method_accuracy(resolution.method));
            ScoredCandidate { resolution, score }
        })
        .collect()
}

/// Highest score wins; on a tie the earlier candidate is kept
pub fn select(candidates: Vec<ConflictResolution>, stats: &ResolutionStats) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;
    for scored in rank(candidates, stats) {
        debug!(
            method = %scored.resolution.method,
            decision = %scored.resolution.decision,
            score = scored.score,
            "Scored candidate"
        );
        match &best {
            Some(current) if scored.score <= current.score => {}
            _ => best = Some(scored),
        }
    }
    best
}

/// Meta-pattern first, then the best-scoring library method
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodSelector {
    library: MethodLibrary,
    patterns: PatternMatchConfig,
}

impl MethodSelector {
    pub fn new(library: MethodLibrary, patterns: PatternMatchConfig) -> Self {
        Self { library, patterns }
    }

    pub fn library(&self) -> &MethodLibrary {
        &self.library
    }

    /// Resolve a conflict. Never fails: an empty candidate list degrades to abstain.
    pub fn resolve(
        &self,
        ctx: &ResolutionContext<'_>,
        memory: &PatternMemory,
        stats: &ResolutionStats,
    ) -> ConflictResolution {
        if let Some(replayed) = memory.match_pattern(ctx.signals, &self.patterns) {
            return replayed;
        }

        select(self.library.candidates(ctx), stats)
            .map(|best| best.resolution)
            .unwrap_or_else(|| {
                ConflictResolution::abstain(
                    ResolutionMethod::RiskAdjusted,
                    ctx.signals,
                    "No candidate resolution available",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::signature;
    use crate::trust::TrustStore;
    use concord_core::{CaseId, ConflictingSignal, Decision, Direction};

    fn signals() -> Vec<ConflictingSignal> {
        vec![
            ConflictingSignal::new("a", Direction::Long, 0.8, 0.9),
            ConflictingSignal::new("b", Direction::Short, 0.6, 0.5),
        ]
    }

    fn candidate(method: ResolutionMethod, confidence: f64) -> ConflictResolution {
        ConflictResolution::new(Decision::Long, confidence, method, &signals(), "")
    }

    #[test]
    fn test_score_formula() {
        let c = candidate(ResolutionMethod::ConfidenceWeighted, 0.7);
        let expected = 0.55 * 0.4 + 0.7 * 0.4 + (1.0 / 3.0) * 0.2;
        assert!((score_candidate(&c, 0.55) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_trusted_bonus_caps_at_three() {
        let many: Vec<_> = (0..6)
            .map(|i| ConflictingSignal::new(format!("a{i}"), Direction::Long, 0.5, 0.5))
            .collect();
        let c = ConflictResolution::new(Decision::Long, 0.0, ResolutionMethod::RiskAdjusted, &many, "");
        assert!((score_candidate(&c, 0.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_ties_keep_first_listed() {
        let mut stats = ResolutionStats::new();
        stats.method_accuracy.insert(ResolutionMethod::HistoricalAccuracy, 0.6);
        stats.method_accuracy.insert(ResolutionMethod::RegimeSpecialist, 0.6);

        let best = select(
            vec![
                candidate(ResolutionMethod::HistoricalAccuracy, 0.7),
                candidate(ResolutionMethod::RegimeSpecialist, 0.7),
            ],
            &stats,
        )
        .unwrap();
        assert_eq!(best.resolution.method, ResolutionMethod::HistoricalAccuracy);
    }

    #[test]
    fn test_higher_score_wins() {
        let stats = ResolutionStats::new();
        let best = select(
            vec![
                candidate(ResolutionMethod::ConfidenceWeighted, 0.6),
                candidate(ResolutionMethod::RiskAdjusted, 0.9),
            ],
            &stats,
        )
        .unwrap();
        assert_eq!(best.resolution.method, ResolutionMethod::RiskAdjusted);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(select(vec![], &ResolutionStats::new()).is_none());
    }

    #[test]
    fn test_meta_pattern_bypasses_scoring() {
        let trust = TrustStore::new();
        let signals = signals();
        let mut memory = PatternMemory::new();
        for _ in 0..3 {
            let id = CaseId::new();
            memory.record(
                signature(&signals),
                id,
                ConflictResolution::new(Decision::Short, 0.7, ResolutionMethod::ConvictionVoting, &signals, ""),
            );
            memory.mark_outcome(&id, true);
        }

        let ctx = ResolutionContext {
            signals: &signals,
            trust: &trust,
            regime: "ranging",
        };
        let r = MethodSelector::default().resolve(&ctx, &memory, &ResolutionStats::new());
        assert_eq!(r.method, ResolutionMethod::MetaPattern);
        assert_eq!(r.decision, Decision::Short);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_library_pick_without_pattern() {
        let trust = TrustStore::new();
        let signals = signals();
        let ctx = ResolutionContext {
            signals: &signals,
            trust: &trust,
            regime: "ranging",
        };
        let r = MethodSelector::default().resolve(&ctx, &PatternMemory::new(), &ResolutionStats::new());
        assert_ne!(r.method, ResolutionMethod::MetaPattern);
        assert!(ResolutionMethod::LIBRARY.contains(&r.method));
    }
}
