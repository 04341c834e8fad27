//! Selector performance: cold and cached execution, hit rate, parametric
//! lookups.

use crate::report::Report;
use crate::utils::*;
use std::time::Instant;
use tessera_core::{Result, State, Value};
use tessera_selector::{Select, Selector, SelectorFactory};

pub fn run(report: &mut Report) -> Result<()> {
    cold_execution(report)?;
    cached_access(report)?;
    hit_rate(report)?;
    parametric_lookup(report)
}

fn validated_texts(factory: &SelectorFactory) -> Result<Selector> {
    let elements = factory.create_path_selector("elements", Value::Array(Vec::new()), None)?;
    factory.create_filter_selector(elements.shared(), |e| Ok(is_validated_text(e)), Some("validated_texts"))
}

fn cold_execution(report: &mut Report) -> Result<()> {
    println!("  Cold Execution (filter over elements):");

    for &size in &SIZES {
        let state = document_state(size);
        // Fresh selectors per iteration so every call misses.
        let selectors = (0..ITERATIONS + WARMUP_ITERATIONS)
            .map(|_| validated_texts(&SelectorFactory::default()))
            .collect::<Result<Vec<_>>>()?;
        let mut selectors = selectors.into_iter();
        let result = measure_with_setup(ITERATIONS, || selectors.next(), |selector| {
            selector.map(|selector| selector.call(&state))
        });

        let label = format!("{size} elements");
        if size == 10_000 {
            let passed = result.mean_ms() < 10.0;
            print_line(&label, &result, Some(("<10ms", passed)));
            report.add_with_target("Selector", "cold", Some(size), result, "<10ms", passed);
        } else {
            print_line(&label, &result, None);
            let throughput = result.throughput(size);
            report.add_result("Selector", "cold", Some(size), result, Some(throughput));
        }
    }
    Ok(())
}

fn cached_access(report: &mut Report) -> Result<()> {
    println!("  Cached Access:");

    for &size in &SIZES {
        let state = document_state(size);
        let selector = validated_texts(&SelectorFactory::default())?;
        selector.call(&state)?;

        let result = measure(ITERATIONS * 10, || selector.call(&state));
        let passed = result.mean_ms() < 1.0;
        print_line(&format!("{size} elements"), &result, Some(("<1ms", passed)));
        report.add_with_target("Selector", "cached", Some(size), result, "<1ms", passed);
    }
    Ok(())
}

fn hit_rate(report: &mut Report) -> Result<()> {
    println!("  Hit Rate After Warm-up:");

    let state = document_state(10_000);
    let selector = validated_texts(&SelectorFactory::default())?;

    let start = Instant::now();
    for _ in 0..20 {
        selector.call(&state)?;
    }
    let result = BenchResult::once(start.elapsed());

    let rate = selector.stats().cache_hit_rate;
    let passed = rate >= 90.0;
    println!(
        "    {:<28} {:>9.1}% [target: >=90%] {}",
        "20 calls, same state",
        rate,
        if passed { "✓" } else { "✗" }
    );
    report.add_with_target("Selector", "hit_rate_20_calls", None, result, ">=90% hits", passed);
    Ok(())
}

fn parametric_lookup(report: &mut Report) -> Result<()> {
    println!("  Parametric Filter (type x page constraints):");

    let state: State = document_state(10_000);
    let factory = SelectorFactory::default();
    let elements = factory.create_path_selector("elements", Value::Array(Vec::new()), None)?;
    let by = factory.create_parametric_filter_selector(elements.shared(), Some("elements_by"))?;

    let constraints: Vec<Value> = shuffle_indices(60, 42)
        .into_iter()
        .map(|i| {
            Value::object([
                ("type", Value::from(["text", "image", "table"][i % 3])),
                ("page", Value::from(i / 3)),
            ])
        })
        .collect();

    let cold = measure_with_setup(
        1,
        || by.invalidate(None),
        |_| {
            for constraint in &constraints {
                let _ = by.select(&state, std::slice::from_ref(constraint));
            }
        },
    );
    print_line("60 buckets, cold", &cold, None);
    report.add_result("Selector", "parametric_cold", Some(constraints.len()), cold, None);

    let warm = measure(ITERATIONS, || {
        for constraint in &constraints {
            let _ = by.select(&state, std::slice::from_ref(constraint));
        }
    });
    let per_call = warm.mean_ms() / constraints.len() as f64;
    let passed = per_call < 1.0;
    print_line("60 buckets, cached", &warm, Some(("<1ms per call", passed)));
    report.add_with_target("Selector", "parametric_cached", Some(constraints.len()), warm, "<1ms per call", passed);
    Ok(())
}
