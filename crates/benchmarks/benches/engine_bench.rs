//! Benchmarks for the full engine loop

use concord_core::{ConflictingSignal, Direction};
use concord_manager::{ConflictEngine, EngineConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_conflict(rng: &mut StdRng, agents: usize) -> Vec<ConflictingSignal> {
    let mut signals: Vec<ConflictingSignal> = (0..agents)
        .map(|i| {
            ConflictingSignal::new(
                format!("agent-{i}"),
                Direction::ALL[rng.gen_range(0..Direction::ALL.len())],
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            )
        })
        .collect();

    // Force a disagreement so every submission opens a case
    if let [first, second, ..] = signals.as_mut_slice() {
        first.direction = Direction::Long;
        second.direction = Direction::Short;
    }
    signals
}

/// Submit plus outcome, the steady-state loop of a trading system
fn bench_submit_and_learn(c: &mut Criterion) {
    let mut group = c.benchmark_group("EngineLoop");

    for num_agents in [2, 5, 20].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("submit_record_outcome", num_agents),
            num_agents,
            |b, &num_agents| {
                let mut rng = StdRng::seed_from_u64(3);
                let engine = ConflictEngine::new(EngineConfig::new().with_notifications(false));
                let conflicts: Vec<Vec<ConflictingSignal>> =
                    (0..256).map(|_| random_conflict(&mut rng, num_agents)).collect();
                let mut next = 0;

                b.iter(|| {
                    let signals = conflicts[next % conflicts.len()].clone();
                    next += 1;
                    let submission = engine.submit_case("BTC-USD", "trending", signals);
                    if let Some(case_id) = submission.case_id {
                        let actual = if next % 3 == 0 { Direction::Short } else { Direction::Long };
                        engine.record_outcome(&case_id, actual, 1.0);
                    }
                    black_box(submission.resolution)
                });
            },
        );
    }

    group.finish();
}

/// Submission cost once the history has hit its cap
fn bench_history_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("HistoryPressure");

    for limit in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("submit", limit), limit, |b, &limit| {
            let mut rng = StdRng::seed_from_u64(5);
            let engine = ConflictEngine::new(
                EngineConfig::new()
                    .with_history_limit(limit)
                    .with_notifications(false),
            );
            for _ in 0..limit {
                engine.submit("ETH-USD", "ranging", random_conflict(&mut rng, 3));
            }
            let signals = random_conflict(&mut rng, 3);

            b.iter(|| black_box(engine.submit("ETH-USD", "ranging", signals.clone())));
        });
    }

    group.finish();
}

/// Snapshot encoding of a populated engine
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("Snapshot");
    let mut rng = StdRng::seed_from_u64(9);

    let engine = ConflictEngine::default();
    for i in 0..1_000 {
        let submission = engine.submit_case("BTC-USD", "trending", random_conflict(&mut rng, 4));
        if let Some(case_id) = submission.case_id {
            let actual = if i % 2 == 0 { Direction::Long } else { Direction::Short };
            engine.record_outcome(&case_id, actual, 1.0);
        }
    }

    group.bench_function("capture", |b| b.iter(|| black_box(engine.snapshot())));

    let snapshot = engine.snapshot();
    group.bench_function("to_json", |b| b.iter(|| black_box(snapshot.to_json())));
    group.bench_function("to_bytes", |b| b.iter(|| black_box(snapshot.to_bytes())));

    group.finish();
}

criterion_group!(benches, bench_submit_and_learn, bench_history_pressure, bench_snapshot);
criterion_main!(benches);
