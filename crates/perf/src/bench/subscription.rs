//! Notification performance: fan-out, 10k-change bursts, batching.

use crate::report::Report;
use crate::utils::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tessera_core::Value;
use tessera_reactive::{BatchConfig, StateChange, SubscriptionManager};

pub fn run(report: &mut Report) {
    burst_delivery(report);
    fan_out(report);
    batched_burst(report);
}

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

/// One subscription of every kind plus a path subscription per element.
fn document_manager(elements: usize, hits: &Arc<AtomicUsize>) -> SubscriptionManager {
    let manager = SubscriptionManager::new();
    for i in 0..elements {
        let hits = hits.clone();
        manager.subscribe_to_path(format!("elements.{i}.status"), move |_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
    }
    manager.subscribe_to_pattern("elements.*.status", |_| {});
    manager.subscribe_to_deep_path("document", |_| {});
    manager.subscribe_to_any_change(|_| {});
    manager
}

fn burst_delivery(report: &mut Report) {
    println!("  Burst Delivery (one change per element):");

    for &size in &SIZES {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = document_manager(size, &hits);
        let changes = status_changes(size);

        let result = measure(ITERATIONS / 10, || {
            manager.notify_state_change(changes.iter().cloned())
        });

        let label = format!("{size} changes");
        if size == 10_000 {
            let passed = result.mean_ms() < 50.0;
            print_line(&label, &result, Some(("<50ms", passed)));
            report.add_with_target("Subscription", "burst", Some(size), result, "<50ms", passed);
        } else {
            print_line(&label, &result, None);
            let throughput = result.throughput(size);
            report.add_result("Subscription", "burst", Some(size), result, Some(throughput));
        }
    }
}

fn fan_out(report: &mut Report) {
    println!("  Fan-out (subscribers on one path):");

    for &subscribers in &[1, 100, 1_000] {
        let manager = SubscriptionManager::new();
        for _ in 0..subscribers {
            manager.subscribe_to_path("ui.zoom", |_| {});
        }
        let mut zoom = 0;

        let result = measure(ITERATIONS, || {
            zoom += 1;
            manager.notify_state_change([StateChange::new(
                "ui.zoom",
                Value::from(zoom - 1),
                Value::from(zoom),
            )])
        });

        print_line(&format!("{subscribers} subscribers"), &result, None);
        let throughput = result.throughput(subscribers);
        report.add_result("Subscription", "fan_out", Some(subscribers), result, Some(throughput));
    }
}

fn batched_burst(report: &mut Report) {
    println!("  Batched Burst (5 writes per path, flushed once):");

    let hits = Arc::new(AtomicUsize::new(0));
    let manager = document_manager(10_000, &hits);
    manager.set_batching(BatchConfig::enabled(60_000));

    let rounds: Vec<Vec<StateChange>> = (0..5).map(|_| status_changes(10_000)).collect();
    let start = Instant::now();
    for round in &rounds {
        manager.notify_state_change(round.iter().cloned());
    }
    let flushed = manager.flush_batch();
    let result = BenchResult::once(start.elapsed());

    let passed = flushed == 10_000 && hits.load(Ordering::Relaxed) == 10_000;
    print_line("50k writes -> 10k deliveries", &result, Some(("1 delivery per path", passed)));
    report.add_with_target("Subscription", "batched_burst", Some(50_000), result, "1 delivery per path", passed);
}
