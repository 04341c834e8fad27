//! Benchmarks for tessera-reactive.
//!
//! Target: 10k state notifications delivered in < 50ms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::Value;
use tessera_reactive::{BatchConfig, StateChange, SubscriptionManager};

fn status_changes(count: usize) -> Vec<StateChange> {
    (0..count)
        .map(|i| {
            StateChange::new(
                format!("elements.{i}.status"),
                Value::from("pending"),
                Value::from("validated"),
            )
        })
        .collect()
}

fn populated_manager(per_kind: usize, hits: Arc<AtomicUsize>) -> SubscriptionManager {
    let manager = SubscriptionManager::new();
    for i in 0..per_kind {
        let hits = hits.clone();
        manager.subscribe_to_path(format!("elements.{i}.status"), move |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
    }
    manager.subscribe_to_pattern("elements.*.status", |_| {});
    manager.subscribe_to_deep_path("elements", |_| {});
    manager.subscribe_to_any_change(|_| {});
    manager
}

fn bench_immediate_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_immediate");

    for count in [100, 1_000, 10_000] {
        let changes = status_changes(count);
        let manager = populated_manager(count, Arc::new(AtomicUsize::new(0)));

        group.bench_with_input(BenchmarkId::from_parameter(count), &changes, |b, changes| {
            b.iter(|| manager.notify_state_change(black_box(changes.iter().cloned())))
        });
    }

    group.finish();
}

fn bench_batched_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_batched");

    for count in [1_000, 10_000] {
        let changes = status_changes(count);
        let manager = populated_manager(count, Arc::new(AtomicUsize::new(0)));
        manager.set_batching(BatchConfig::enabled(60_000));

        group.bench_with_input(BenchmarkId::from_parameter(count), &changes, |b, changes| {
            b.iter(|| {
                manager.notify_state_change(black_box(changes.iter().cloned()));
                manager.flush_batch()
            })
        });
    }

    group.finish();
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let manager = SubscriptionManager::new();
    c.bench_function("subscribe_unsubscribe", |b| {
        b.iter(|| {
            let id = manager.subscribe_to_path(black_box("document.title"), |_| {});
            manager.unsubscribe(id)
        })
    });
}

criterion_group!(
    benches,
    bench_immediate_delivery,
    bench_batched_delivery,
    bench_subscribe_unsubscribe
);
criterion_main!(benches);
