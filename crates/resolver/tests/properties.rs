//! Property tests for the method library and trust updates

use chrono::Utc;
use concord_core::{ConflictingSignal, Direction};
use concord_resolver::methods::confidence_strength_tally;
use concord_resolver::{MethodLibrary, ResolutionContext, ResolutionMethod, TrustStore};
use proptest::prelude::*;

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Long),
        Just(Direction::Short),
        Just(Direction::Neutral),
    ]
}

/// Deliberately wider than [0, 1] to exercise clamping
fn loose_unit() -> impl Strategy<Value = f64> {
    prop_oneof![-2.0f64..3.0, Just(f64::NAN), Just(0.0), Just(1.0)]
}

fn signal_set() -> impl Strategy<Value = Vec<ConflictingSignal>> {
    prop::collection::vec(
        (
            direction(),
            loose_unit(),
            loose_unit(),
            prop::collection::btree_set("(rsi|macd|vwap|ema)", 0..3),
        ),
        2..8,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (d, strength, confidence, indicators))| {
                ConflictingSignal::new(format!("agent-{i}"), d, strength, confidence)
                    .with_indicators(indicators)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn outputs_stay_in_documented_ranges(signals in signal_set()) {
        let trust = TrustStore::new();
        let ctx = ResolutionContext { signals: &signals, trust: &trust, regime: "trending" };

        for candidate in MethodLibrary::default().candidates(&ctx) {
            prop_assert!((0.0..=1.0).contains(&candidate.confidence), "{:?}", candidate);
            prop_assert!((0.0..=1.5).contains(&candidate.position_size_multiplier), "{:?}", candidate);
            prop_assert!((0.8..=1.0).contains(&candidate.stop_loss_adjustment), "{:?}", candidate);
            prop_assert_eq!(
                candidate.trusted_bots.len() + candidate.overridden_bots.len(),
                signals.len()
            );
        }
    }

    #[test]
    fn raising_confidence_never_lowers_its_direction(
        signals in signal_set(),
        index in 0usize..8,
        bump in 0.0f64..1.0,
    ) {
        let index = index % signals.len();
        let direction = signals[index].direction;
        let before = confidence_strength_tally(&signals).share(direction);

        let mut raised = signals.clone();
        let current = raised[index].bounded_confidence();
        raised[index].confidence = (current + bump).min(1.0);
        let after = confidence_strength_tally(&raised).share(direction);

        // Zero-total sets report the 0.5 fallback on both sides or move off it
        if confidence_strength_tally(&signals).total() > 0.0 {
            prop_assert!(after + 1e-12 >= before, "before {} after {}", before, after);
        }
    }

    #[test]
    fn trust_profiles_stay_bounded(
        outcomes in prop::collection::vec((direction(), direction(), any::<bool>()), 1..300),
    ) {
        let mut trust = TrustStore::new();
        for (proposed, actual, trusted) in outcomes {
            let signal = ConflictingSignal::new("agent", proposed, 0.5, 0.5);
            trust.record_outcome(&signal, "ranging", actual, trusted, Utc::now());
        }

        let profile = trust.profiles().pop().unwrap();
        for value in [
            profile.overall_accuracy,
            profile.conflict_win_rate,
            profile.conflict_loss_rate,
            profile.regime_accuracy("ranging"),
        ] {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn library_never_yields_nan(signals in signal_set()) {
        let trust = TrustStore::new();
        let ctx = ResolutionContext { signals: &signals, trust: &trust, regime: "volatile" };
        for method in ResolutionMethod::LIBRARY {
            let r = MethodLibrary::default().resolve(method, &ctx);
            prop_assert!(!r.confidence.is_nan());
            prop_assert!(!r.position_size_multiplier.is_nan());
        }
    }
}
