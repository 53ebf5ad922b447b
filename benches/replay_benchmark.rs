use bilateral_settlement::accumulator::net::NettingStrategy;
use bilateral_settlement::config::EngineConfig;
use bilateral_settlement::core::pair::pack;
use bilateral_settlement::core::party::PartyId;
use bilateral_settlement::engine::SettlementEngine;
use bilateral_settlement::events::{EventEnvelope, SettlementEvent};
use bilateral_settlement::simulation::stream::{generate_event_stream, StreamConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn stream(pairs: usize, events: usize) -> Vec<EventEnvelope> {
    generate_event_stream(&StreamConfig {
        pair_count: pairs,
        event_count: events,
        seed: Some(42),
        ..Default::default()
    })
}

fn bench_pair_id(c: &mut Criterion) {
    let a = PartyId::new("0x1111111111111111111111111111111111111111");
    let b = PartyId::new("0x2222222222222222222222222222222222222222");

    c.bench_function("pair_id_pack", |bench| {
        bench.iter(|| pack(black_box(&b), black_box(&a)))
    });
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    for (pairs, events) in [(10, 1_000), (100, 10_000), (1_000, 50_000)] {
        let events = stream(pairs, events);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_pairs_{}_events", pairs, events.len())),
            &events,
            |bench, events| {
                bench.iter(|| {
                    let mut engine = SettlementEngine::in_memory(&EngineConfig::default());
                    engine.replay(black_box(events))
                })
            },
        );
    }
    group.finish();
}

/// Close-out adjustments only, under both netting strategies.
fn bench_close_out_strategies(c: &mut Criterion) {
    let events: Vec<EventEnvelope> = stream(50, 20_000)
        .into_iter()
        .filter(|e| {
            matches!(
                &e.event,
                SettlementEvent::CloseOutPaymentAdjusted(adj) if adj.is_increase
            )
        })
        .collect();

    let mut group = c.benchmark_group("close_out_increase");
    for strategy in [NettingStrategy::TotalsBased, NettingStrategy::DeltaOnly] {
        let config = EngineConfig {
            close_out_strategy: strategy,
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", strategy)),
            &events,
            |bench, events| {
                bench.iter(|| {
                    let mut engine = SettlementEngine::in_memory(&config);
                    engine.replay(black_box(events))
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_pair_id,
    bench_replay,
    bench_close_out_strategies
);
criterion_main!(benches);
