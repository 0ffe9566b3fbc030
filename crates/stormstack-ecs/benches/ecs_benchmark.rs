//! ECS performance benchmarks.
//!
//! Target: ≥746 ticks/sec with 10k entities

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stormstack_core::{ComponentTypeId, ComponentValue};
use stormstack_ecs::ComponentStore;

const POSITION: ComponentTypeId = ComponentTypeId(1);

fn bench_advance_version_10k_entities(c: &mut Criterion) {
    let mut store = ComponentStore::standalone();
    store.register_component(POSITION);

    for _ in 0..10_000 {
        let e = store.spawn().unwrap();
        store.attach(e, POSITION, ComponentValue::Float(0.0)).unwrap();
    }
    store.advance_version();

    c.bench_function("advance_version_10k_entities", |b| {
        b.iter(|| {
            black_box(store.advance_version());
        })
    });
}

fn bench_spawn_entities(c: &mut Criterion) {
    c.bench_function("spawn_1000_entities", |b| {
        b.iter(|| {
            let mut store = ComponentStore::standalone();
            for _ in 0..1000 {
                black_box(store.spawn().unwrap());
            }
        })
    });
}

fn bench_snapshot_10k(c: &mut Criterion) {
    let mut store = ComponentStore::standalone();
    store.register_component(POSITION);
    for _ in 0..10_000 {
        let e = store.spawn().unwrap();
        store.attach(e, POSITION, ComponentValue::Float(0.0)).unwrap();
    }

    c.bench_function("snapshot_10k_entities", |b| {
        b.iter(|| {
            black_box(store.snapshot_full());
        })
    });
}

/// Benchmark delta generation with 10k entities — critical for WebSocket
/// streaming performance.
fn bench_delta_10k_entities(c: &mut Criterion) {
    let mut store = ComponentStore::standalone();
    let v0 = store.advance_version();

    for _ in 0..10_000 {
        store.spawn().unwrap();
    }
    store.advance_version();

    c.bench_function("delta_10k_entities", |b| {
        b.iter(|| {
            black_box(store.delta_since(v0));
        })
    });
}

/// Benchmark delta generation after mixed operations (spawns, despawns, updates).
fn bench_delta_mixed_operations(c: &mut Criterion) {
    let mut store = ComponentStore::standalone();
    store.register_component(POSITION);

    let mut entities = Vec::new();
    for _ in 0..5_000 {
        entities.push(store.spawn().unwrap());
    }
    let v0 = store.advance_version();

    for entity in entities.iter().take(2_500) {
        store.despawn(*entity).unwrap();
    }
    for _ in 0..2_500 {
        let e = store.spawn().unwrap();
        store.attach(e, POSITION, ComponentValue::Float(1.0)).unwrap();
    }
    store.advance_version();

    c.bench_function("delta_mixed_5k_ops", |b| {
        b.iter(|| {
            black_box(store.delta_since(v0));
        })
    });
}

/// Benchmark `prune_history` with 10k entities spawned across many ticks.
///
/// Critical for long-running servers where change-log history must be
/// periodically trimmed to prevent unbounded memory growth.
fn bench_prune_history_10k_entities(c: &mut Criterion) {
    c.bench_function("prune_history_10k_entities_100_ticks", |b| {
        b.iter_batched(
            || {
                let mut store = ComponentStore::standalone();
                for _tick in 0..100 {
                    for _ in 0..100 {
                        store.spawn().unwrap();
                    }
                    store.advance_version();
                }
                store
            },
            |mut store| {
                let current = store.version();
                black_box(store.prune_history(current));
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_advance_version_10k_entities,
    bench_spawn_entities,
    bench_snapshot_10k,
    bench_delta_10k_entities,
    bench_delta_mixed_operations,
    bench_prune_history_10k_entities
);
criterion_main!(benches);
