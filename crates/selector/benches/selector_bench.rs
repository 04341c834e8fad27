//! Benchmarks for tessera-selector.
//!
//! Targets: cold selector over 10k elements < 10ms, cached access < 1ms.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::{State, Value};
use tessera_selector::{Select, SelectorConfig, SelectorFactory};

fn make_state(count: usize) -> State {
    let kinds = ["text", "image", "table"];
    let elements = (0..count).map(|i| {
        Value::object([
            ("id", Value::from(i)),
            ("type", Value::from(kinds[i % 3])),
            ("status", Value::from(if i % 5 == 0 { "validated" } else { "pending" })),
            ("visible", Value::from(true)),
            ("page", Value::from(i / 50)),
        ])
    });
    State::from_iter([("elements", Value::array(elements))])
}

fn is_validated_text(e: &Value) -> bool {
    e.get("type") == Some(&Value::from("text"))
        && e.get("status") == Some(&Value::from("validated"))
        && e.get("visible").is_some_and(Value::is_truthy)
}

fn bench_filter_selector(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_selector");

    for size in [100, 1_000, 10_000] {
        let state = make_state(size);

        group.bench_with_input(BenchmarkId::new("cold", size), &state, |b, state| {
            let factory = SelectorFactory::default();
            let elements = factory
                .create_path_selector("elements", Value::Array(vec![]), None)
                .unwrap();
            let selector = factory
                .create_filter_selector(elements.shared(), |e| Ok(is_validated_text(e)), None)
                .unwrap();
            b.iter(|| {
                selector.invalidate(None);
                elements.invalidate(None);
                selector.call(black_box(state)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("cached", size), &state, |b, state| {
            let factory = SelectorFactory::default();
            let elements = factory
                .create_path_selector("elements", Value::Array(vec![]), None)
                .unwrap();
            let selector = factory
                .create_filter_selector(elements.shared(), |e| Ok(is_validated_text(e)), None)
                .unwrap();
            selector.call(state).unwrap();
            b.iter(|| selector.call(black_box(state)).unwrap())
        });
    }

    group.finish();
}

fn bench_parametric_selector(c: &mut Criterion) {
    let mut group = c.benchmark_group("parametric_selector");
    let state = make_state(10_000);
    let factory = SelectorFactory::new(SelectorConfig::default().with_max_cache_size(8));
    let elements = factory
        .create_path_selector("elements", Value::Array(vec![]), None)
        .unwrap();
    let by = factory
        .create_parametric_filter_selector(elements.shared(), Some("elements_by"))
        .unwrap();
    let filters: Vec<Value> = ["text", "image", "table"]
        .iter()
        .map(|kind| Value::object([("type", *kind)]))
        .collect();
    for filter in &filters {
        by.select(&state, std::slice::from_ref(filter)).unwrap();
    }

    group.bench_function("rotating_filters_cached", |b| {
        let mut i = 0;
        b.iter(|| {
            i += 1;
            let filter = &filters[i % filters.len()];
            by.select(black_box(&state), std::slice::from_ref(filter)).unwrap()
        })
    });

    group.finish();
}

fn bench_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");
    let state = make_state(10_000);
    let args = [Value::from("text")];

    group.bench_function("state_with_10k_elements", |b| {
        b.iter(|| tessera_selector::SelectorCacheKey::new(black_box(&state), black_box(&args)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_filter_selector,
    bench_parametric_selector,
    bench_cache_key
);
criterion_main!(benches);
