//! Resolution method library
//!
//! Seven independent scoring strategies. Each one is a pure function of the
//! signal set, the trust store and the regime, and produces a candidate
//! [`ConflictResolution`]. The selector decides which candidate wins.
//!
//! Inputs are sanitized before any arithmetic: NaN strength or confidence is
//! read as 0 and everything is clamped to [0, 1]. Normalizations with a zero
//! denominator fall back to a confidence of 0.5.

use crate::trust::TrustStore;
use crate::types::{ConflictResolution, ResolutionMethod};
use concord_core::{ratio_or, ConflictingSignal, Decision, Direction};
use std::collections::BTreeMap;

/// Confidence below which weighted methods abstain
pub const DEFAULT_MIN_CONFIDENCE_TO_ACT: f64 = 0.6;

/// Confidence used when there is nothing to normalize against
const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Bonus added to a regime accuracy that is already above 0.6
const REGIME_SPECIALIST_BONUS: f64 = 0.15;

/// Inputs shared by every method
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub signals: &'a [ConflictingSignal],
    pub trust: &'a TrustStore,
    pub regime: &'a str,
}

/// Per-direction totals indexed like [`Direction::ALL`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionTally([f64; 3]);

impl DirectionTally {
    /// Sum a weight per signal into its direction
    pub fn weighted<F>(signals: &[ConflictingSignal], weight: F) -> Self
    where
        F: Fn(&ConflictingSignal) -> f64,
    {
        let mut tally = Self::default();
        for signal in signals {
            tally.add(signal.direction, weight(signal));
        }
        tally
    }

    pub fn add(&mut self, direction: Direction, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.0[direction.index()] += amount;
        }
    }

    pub fn get(&self, direction: Direction) -> f64 {
        self.0[direction.index()]
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Leading direction; ties go to the earlier of long, short, neutral
    pub fn leader(&self) -> (Direction, f64) {
        let mut best = (Direction::Long, self.get(Direction::Long));
        for direction in [Direction::Short, Direction::Neutral] {
            let value = self.get(direction);
            if value > best.1 {
                best = (direction, value);
            }
        }
        best
    }

    /// Share of the total held by a direction
    pub fn share(&self, direction: Direction) -> f64 {
        ratio_or(self.get(direction), self.total(), NEUTRAL_CONFIDENCE)
    }

    /// Leading direction and its normalized share
    pub fn normalized_leader(&self) -> (Direction, f64) {
        let (direction, _) = self.leader();
        (direction, self.share(direction))
    }
}

/// The seven scoring strategies with their shared abstain threshold
#[derive(Debug, Clone, Copy)]
pub struct MethodLibrary {
    min_confidence_to_act: f64,
}

impl MethodLibrary {
    pub fn new(min_confidence_to_act: f64) -> Self {
        Self {
            min_confidence_to_act: concord_core::unit_interval(min_confidence_to_act),
        }
    }

    pub fn min_confidence_to_act(&self) -> f64 {
        self.min_confidence_to_act
    }

    /// Run every library method in selection order
    pub fn candidates(&self, ctx: &ResolutionContext<'_>) -> Vec<ConflictResolution> {
        ResolutionMethod::LIBRARY
            .iter()
            .map(|method| self.resolve(*method, ctx))
            .collect()
    }

    /// Run one method. Methods outside the library abstain.
    pub fn resolve(&self, method: ResolutionMethod, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        match method {
            ResolutionMethod::HistoricalAccuracy => self.historical_accuracy(ctx),
            ResolutionMethod::RegimeSpecialist => self.regime_specialist(ctx),
            ResolutionMethod::ConfidenceWeighted => self.confidence_weighted(ctx),
            ResolutionMethod::ConvictionVoting => self.conviction_voting(ctx),
            ResolutionMethod::IndicatorConsensus => self.indicator_consensus(ctx),
            ResolutionMethod::RiskAdjusted => self.risk_adjusted(ctx),
            ResolutionMethod::ConflictRecord => self.conflict_record(ctx),
            ResolutionMethod::MetaPattern | ResolutionMethod::Consensus => {
                ConflictResolution::abstain(
                    method,
                    ctx.signals,
                    format!("{} is not a library method", method),
                )
            }
        }
    }

    /// Turn a normalized leader into a decision, abstaining below the threshold
    fn decide(&self, leader: Direction, confidence: f64) -> Decision {
        if confidence < self.min_confidence_to_act {
            Decision::Abstain
        } else {
            Decision::from(leader)
        }
    }

    /// Weight = overall accuracy × confidence
    fn historical_accuracy(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let tally = DirectionTally::weighted(ctx.signals, |s| {
            ctx.trust.overall_accuracy(&s.agent_id) * s.bounded_confidence()
        });
        let (leader, confidence) = tally.normalized_leader();
        let decision = self.decide(leader, confidence);

        let reasoning = format!(
            "Accuracy-weighted vote favours {} with {:.0}% of trust-weighted confidence",
            leader,
            confidence * 100.0
        );

        ConflictResolution::new(
            decision,
            confidence,
            ResolutionMethod::HistoricalAccuracy,
            ctx.signals,
            reasoning,
        )
        .with_sizing(
            acting_size(decision, 0.5 + confidence),
            1.0 - (1.0 - confidence) * 0.2,
        )
    }

    /// Weight = (regime accuracy + specialist bonus) × confidence
    fn regime_specialist(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let tally = DirectionTally::weighted(ctx.signals, |s| {
            let accuracy = ctx.trust.regime_accuracy(&s.agent_id, ctx.regime);
            let bonus = if accuracy > 0.6 { REGIME_SPECIALIST_BONUS } else { 0.0 };
            (accuracy + bonus) * s.bounded_confidence()
        });
        let (leader, confidence) = tally.normalized_leader();
        let decision = self.decide(leader, confidence);

        let specialists = ctx
            .signals
            .iter()
            .filter(|s| ctx.trust.regime_accuracy(&s.agent_id, ctx.regime) > 0.65)
            .count();

        let reasoning = format!(
            "{} regime specialist(s) for '{}'; regime-weighted vote favours {} at {:.0}%",
            specialists,
            ctx.regime,
            leader,
            confidence * 100.0
        );

        ConflictResolution::new(
            decision,
            confidence,
            ResolutionMethod::RegimeSpecialist,
            ctx.signals,
            reasoning,
        )
        .with_sizing(
            acting_size(decision, 0.6 + confidence * 0.8),
            1.0 - (1.0 - confidence) * 0.2,
        )
    }

    /// Weight = confidence × strength
    fn confidence_weighted(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let tally = confidence_strength_tally(ctx.signals);
        let (leader, confidence) = tally.normalized_leader();
        let decision = self.decide(leader, confidence);

        let reasoning = format!(
            "Confidence × strength: long {:.2}, short {:.2}, neutral {:.2}",
            tally.get(Direction::Long),
            tally.get(Direction::Short),
            tally.get(Direction::Neutral)
        );

        ConflictResolution::new(
            decision,
            confidence,
            ResolutionMethod::ConfidenceWeighted,
            ctx.signals,
            reasoning,
        )
        .with_sizing(
            acting_size(decision, 0.5 + confidence),
            1.0 - (1.0 - confidence) * 0.15,
        )
    }

    /// Two votes for signals with strength × confidence above 0.5, one otherwise
    fn conviction_voting(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let tally = DirectionTally::weighted(ctx.signals, |s| {
            if s.bounded_strength() * s.bounded_confidence() > 0.5 {
                2.0
            } else {
                1.0
            }
        });
        let (leader, confidence) = tally.normalized_leader();
        let decision = self.decide(leader, confidence);

        let reasoning = format!(
            "{} of {} conviction votes for {}",
            tally.get(leader),
            tally.total(),
            leader
        );

        ConflictResolution::new(
            decision,
            confidence,
            ResolutionMethod::ConvictionVoting,
            ctx.signals,
            reasoning,
        )
        .with_sizing(
            acting_size(decision, 0.7 + confidence * 0.5),
            1.0 - (1.0 - confidence) * 0.1,
        )
    }

    /// Shared indicators vote for the direction most of their users took
    fn indicator_consensus(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let mut usage: BTreeMap<&str, DirectionTally> = BTreeMap::new();
        for signal in ctx.signals {
            for indicator in &signal.indicators {
                usage
                    .entry(indicator.as_str())
                    .or_default()
                    .add(signal.direction, 1.0);
            }
        }

        let mut votes = DirectionTally::default();
        let mut shared = 0usize;
        for tally in usage.values().filter(|t| t.total() >= 2.0) {
            shared += 1;
            let (direction, count) = tally.leader();
            if count / tally.total() > 0.5 {
                votes.add(direction, 1.0);
            }
        }

        let (leader, confidence) = votes.normalized_leader();
        let decision = self.decide(leader, confidence);

        let reasoning = format!(
            "{} shared indicator(s), {} with a majority; {} leads",
            shared,
            votes.total(),
            leader
        );

        ConflictResolution::new(
            decision,
            confidence,
            ResolutionMethod::IndicatorConsensus,
            ctx.signals,
            reasoning,
        )
        .with_sizing(acting_size(decision, 0.6 + confidence * 0.6), 0.95)
    }

    /// Abstain if anyone is neutral, otherwise a discounted majority
    fn risk_adjusted(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let counts = DirectionTally::weighted(ctx.signals, |_| 1.0);
        let (leader, majority) = counts.leader();
        let agreement = ratio_or(majority, counts.total(), NEUTRAL_CONFIDENCE);
        let confidence = agreement * 0.8;

        if counts.get(Direction::Neutral) > 0.0 {
            let reasoning = format!(
                "{} agent(s) neutral; standing aside",
                counts.get(Direction::Neutral)
            );
            return ConflictResolution::new(
                Decision::Abstain,
                confidence,
                ResolutionMethod::RiskAdjusted,
                ctx.signals,
                reasoning,
            )
            .with_sizing(0.0, 0.85);
        }

        let reasoning = format!(
            "Conservative majority for {} with {:.0}% agreement",
            leader,
            agreement * 100.0
        );

        ConflictResolution::new(
            Decision::from(leader),
            confidence,
            ResolutionMethod::RiskAdjusted,
            ctx.signals,
            reasoning,
        )
        .with_sizing(0.5 + agreement * 0.3, 0.85)
    }

    /// Weight = conflict win rate × confidence
    fn conflict_record(&self, ctx: &ResolutionContext<'_>) -> ConflictResolution {
        let tally = DirectionTally::weighted(ctx.signals, |s| {
            ctx.trust.conflict_win_rate(&s.agent_id) * s.bounded_confidence()
        });
        let (leader, confidence) = tally.normalized_leader();
        let decision = self.decide(leader, confidence);

        let reasoning = format!(
            "Agents with better conflict records favour {} at {:.0}%",
            leader,
            confidence * 100.0
        );

        ConflictResolution::new(
            decision,
            confidence,
            ResolutionMethod::ConflictRecord,
            ctx.signals,
            reasoning,
        )
        .with_sizing(
            acting_size(decision, 0.6 + confidence * 0.6),
            1.0 - (1.0 - confidence) * 0.15,
        )
    }
}

impl Default for MethodLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE_TO_ACT)
    }
}

/// Per-direction confidence × strength totals
pub fn confidence_strength_tally(signals: &[ConflictingSignal]) -> DirectionTally {
    DirectionTally::weighted(signals, |s| s.bounded_confidence() * s.bounded_strength())
}

/// No new exposure when abstaining
fn acting_size(decision: Decision, size: f64) -> f64 {
    if decision.is_abstain() {
        0.0
    } else {
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use concord_core::AgentId;

    fn ctx<'a>(signals: &'a [ConflictingSignal], trust: &'a TrustStore) -> ResolutionContext<'a> {
        ResolutionContext {
            signals,
            trust,
            regime: "trending",
        }
    }

    fn two_agents() -> Vec<ConflictingSignal> {
        vec![
            ConflictingSignal::new("a", Direction::Long, 0.8, 0.9),
            ConflictingSignal::new("b", Direction::Short, 0.6, 0.5),
        ]
    }

    fn three_way_split() -> Vec<ConflictingSignal> {
        vec![
            ConflictingSignal::new("a", Direction::Long, 0.5, 0.3),
            ConflictingSignal::new("b", Direction::Short, 0.5, 0.3),
            ConflictingSignal::new("c", Direction::Neutral, 0.5, 0.3),
        ]
    }

    #[test]
    fn test_confidence_weighted_two_agent_scenario() {
        let trust = TrustStore::new();
        let signals = two_agents();

        let tally = confidence_strength_tally(&signals);
        assert!((tally.get(Direction::Long) - 0.72).abs() < 1e-12);
        assert!((tally.get(Direction::Short) - 0.30).abs() < 1e-12);

        let r = MethodLibrary::default().resolve(ResolutionMethod::ConfidenceWeighted, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Long);
        assert!((r.confidence - 0.72 / 1.02).abs() < 1e-12);
        assert_eq!(r.trusted_bots, vec![AgentId::from("a")]);
        assert_eq!(r.overridden_bots, vec![AgentId::from("b")]);
    }

    #[test]
    fn test_three_way_split_abstains_in_weighted_methods() {
        let trust = TrustStore::new();
        let signals = three_way_split();
        let library = MethodLibrary::default();

        for method in [
            ResolutionMethod::HistoricalAccuracy,
            ResolutionMethod::RegimeSpecialist,
            ResolutionMethod::ConfidenceWeighted,
            ResolutionMethod::ConvictionVoting,
            ResolutionMethod::IndicatorConsensus,
            ResolutionMethod::ConflictRecord,
        ] {
            let r = library.resolve(method, &ctx(&signals, &trust));
            assert_eq!(r.decision, Decision::Abstain, "{} should abstain", method);
            assert!(r.trusted_bots.is_empty());
            assert_eq!(r.position_size_multiplier, 0.0);
        }
    }

    #[test]
    fn test_historical_accuracy_prefers_accurate_agent() {
        let mut trust = TrustStore::new();
        let signals = vec![
            ConflictingSignal::new("sharp", Direction::Short, 0.5, 0.6),
            ConflictingSignal::new("dull", Direction::Long, 0.5, 0.6),
        ];
        for _ in 0..40 {
            trust.record_outcome(&signals[0], "trending", Direction::Short, true, Utc::now());
            trust.record_outcome(&signals[1], "trending", Direction::Short, false, Utc::now());
        }

        let r = MethodLibrary::default().resolve(ResolutionMethod::HistoricalAccuracy, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Short);
        assert!(r.confidence > 0.6);
        assert!((r.stop_loss_adjustment - (1.0 - (1.0 - r.confidence) * 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_regime_specialist_reports_specialists() {
        let mut trust = TrustStore::new();
        let signals = two_agents();
        for _ in 0..10 {
            trust.record_outcome(&signals[1], "trending", Direction::Short, false, Utc::now());
        }
        assert!(trust.regime_accuracy(&AgentId::from("b"), "trending") > 0.65);

        let r = MethodLibrary::default().resolve(ResolutionMethod::RegimeSpecialist, &ctx(&signals, &trust));
        assert!(r.reasoning.starts_with("1 regime specialist"));
    }

    #[test]
    fn test_conviction_voting_double_votes() {
        let trust = TrustStore::new();
        let signals = vec![
            ConflictingSignal::new("a", Direction::Long, 0.9, 0.9),
            ConflictingSignal::new("b", Direction::Short, 0.3, 0.3),
        ];
        let r = MethodLibrary::default().resolve(ResolutionMethod::ConvictionVoting, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Long);
        assert!((r.confidence - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_indicator_consensus_majorities() {
        let trust = TrustStore::new();
        let signals = vec![
            ConflictingSignal::new("a", Direction::Long, 0.5, 0.5).with_indicators(["rsi", "macd"]),
            ConflictingSignal::new("b", Direction::Long, 0.5, 0.5).with_indicators(["rsi", "macd"]),
            ConflictingSignal::new("c", Direction::Short, 0.5, 0.5).with_indicators(["rsi", "vwap"]),
        ];
        let r = MethodLibrary::default().resolve(ResolutionMethod::IndicatorConsensus, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Long);
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.stop_loss_adjustment, 0.95);
    }

    #[test]
    fn test_indicator_consensus_without_shared_indicators() {
        let trust = TrustStore::new();
        let signals = two_agents();
        let r = MethodLibrary::default().resolve(ResolutionMethod::IndicatorConsensus, &ctx(&signals, &trust));
        assert_eq!(r.confidence, 0.5);
        assert_eq!(r.decision, Decision::Abstain);
    }

    #[test]
    fn test_indicator_tie_attributes_nothing() {
        let trust = TrustStore::new();
        let signals = vec![
            ConflictingSignal::new("a", Direction::Long, 0.5, 0.5).with_indicators(["rsi"]),
            ConflictingSignal::new("b", Direction::Short, 0.5, 0.5).with_indicators(["rsi"]),
        ];
        let r = MethodLibrary::default().resolve(ResolutionMethod::IndicatorConsensus, &ctx(&signals, &trust));
        assert_eq!(r.confidence, 0.5);
    }

    #[test]
    fn test_risk_adjusted_abstains_on_neutral() {
        let trust = TrustStore::new();
        let signals = three_way_split();
        let r = MethodLibrary::default().resolve(ResolutionMethod::RiskAdjusted, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Abstain);
        assert_eq!(r.position_size_multiplier, 0.0);
        assert_eq!(r.stop_loss_adjustment, 0.85);
    }

    #[test]
    fn test_risk_adjusted_discounted_majority() {
        let trust = TrustStore::new();
        let signals = vec![
            ConflictingSignal::new("a", Direction::Short, 0.5, 0.1),
            ConflictingSignal::new("b", Direction::Short, 0.5, 0.1),
            ConflictingSignal::new("c", Direction::Long, 0.5, 0.9),
        ];
        let r = MethodLibrary::default().resolve(ResolutionMethod::RiskAdjusted, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Short);
        let agreement = 2.0 / 3.0;
        assert!((r.confidence - agreement * 0.8).abs() < 1e-12);
        assert!((r.position_size_multiplier - (0.5 + agreement * 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weights_fall_back_to_neutral_confidence() {
        let trust = TrustStore::new();
        let signals = vec![
            ConflictingSignal::new("a", Direction::Long, 0.0, 0.0),
            ConflictingSignal::new("b", Direction::Short, 0.0, 0.0),
        ];
        let r = MethodLibrary::default().resolve(ResolutionMethod::ConfidenceWeighted, &ctx(&signals, &trust));
        assert_eq!(r.confidence, 0.5);
        assert!(!r.confidence.is_nan());
    }

    #[test]
    fn test_candidates_follow_library_order() {
        let trust = TrustStore::new();
        let signals = two_agents();
        let candidates = MethodLibrary::default().candidates(&ctx(&signals, &trust));
        let methods: Vec<_> = candidates.iter().map(|c| c.method).collect();
        assert_eq!(methods, ResolutionMethod::LIBRARY.to_vec());
    }

    #[test]
    fn test_non_library_method_abstains() {
        let trust = TrustStore::new();
        let signals = two_agents();
        let r = MethodLibrary::default().resolve(ResolutionMethod::MetaPattern, &ctx(&signals, &trust));
        assert_eq!(r.decision, Decision::Abstain);
    }
}
