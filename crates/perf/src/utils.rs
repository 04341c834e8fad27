//! Measurement helpers and the synthetic document workload.

use std::time::{Duration, Instant};
use tessera_core::{State, Value};

/// Number of iterations for each benchmark
pub const ITERATIONS: usize = 100;

/// Warmup iterations before measurement
pub const WARMUP_ITERATIONS: usize = 10;

/// Element counts to test
pub const SIZES: [usize; 3] = [100, 1_000, 10_000];

const KINDS: [&str; 3] = ["text", "image", "table"];

/// Document state with `count` elements: `type` cycles text/image/table,
/// every fifth element is validated, 50 elements per page.
pub fn document_state(count: usize) -> State {
    let elements = (0..count).map(|i| {
        Value::object([
            ("id", Value::from(i)),
            ("type", Value::from(KINDS[i % 3])),
            ("status", Value::from(if i % 5 == 0 { "validated" } else { "pending" })),
            ("visible", Value::from(true)),
            ("page", Value::from(i / 50)),
        ])
    });
    State::from_iter([
        ("elements", Value::array(elements)),
        ("document", Value::object([("title", "Annual report")])),
        ("ui", Value::object([("zoom", 1)])),
    ])
}

pub fn is_validated_text(e: &Value) -> bool {
    e.get("type") == Some(&Value::from("text"))
        && e.get("status") == Some(&Value::from("validated"))
        && e.get("visible").is_some_and(Value::is_truthy)
}

/// Measure execution time with multiple iterations (includes warmup)
pub fn measure<F, R>(iterations: usize, mut f: F) -> BenchResult
where
    F: FnMut() -> R,
{
    for _ in 0..WARMUP_ITERATIONS {
        std::hint::black_box(f());
    }

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        std::hint::black_box(f());
        times.push(start.elapsed());
    }

    BenchResult::from_times(&times)
}

/// Measure with setup function (setup time excluded, includes warmup)
pub fn measure_with_setup<S, F, T, R>(iterations: usize, mut setup: S, mut f: F) -> BenchResult
where
    S: FnMut() -> T,
    F: FnMut(T) -> R,
{
    for _ in 0..WARMUP_ITERATIONS {
        let data = setup();
        std::hint::black_box(f(data));
    }

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let data = setup();
        let start = Instant::now();
        std::hint::black_box(f(data));
        times.push(start.elapsed());
    }

    BenchResult::from_times(&times)
}

#[derive(Clone, Debug, Default)]
#[allow(dead_code)]
pub struct BenchResult {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub iterations: usize,
}

impl BenchResult {
    pub fn from_times(times: &[Duration]) -> Self {
        let mut sorted = times.to_vec();
        sorted.sort();

        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };
        let sum: Duration = sorted.iter().sum();

        Self {
            min,
            max,
            mean: sum / sorted.len() as u32,
            median: sorted[sorted.len() / 2],
            iterations: sorted.len(),
        }
    }

    /// A single timed run.
    pub fn once(elapsed: Duration) -> Self {
        Self::from_times(&[elapsed])
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean.as_secs_f64() * 1000.0
    }

    pub fn throughput(&self, count: usize) -> f64 {
        count as f64 / self.mean.as_secs_f64()
    }
}

/// Format duration for display
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        format!("{} ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2} μs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2} ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2} s", nanos as f64 / 1_000_000_000.0)
    }
}

/// Format throughput for display
pub fn format_throughput(ops_per_sec: f64) -> String {
    if ops_per_sec >= 1_000_000.0 {
        format!("{:.2}M ops/s", ops_per_sec / 1_000_000.0)
    } else if ops_per_sec >= 1_000.0 {
        format!("{:.2}K ops/s", ops_per_sec / 1_000.0)
    } else {
        format!("{:.2} ops/s", ops_per_sec)
    }
}

/// Simple LCG for reproducible pseudo-random shuffling
pub fn shuffle_indices(count: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..count).collect();
    let mut s = seed;
    for i in (1..count).rev() {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = (s as usize) % (i + 1);
        indices.swap(i, j);
    }
    indices
}

/// Prints one measurement line, with a target marker when given.
pub fn print_line(label: &str, result: &BenchResult, target: Option<(&str, bool)>) {
    match target {
        Some((target, passed)) => println!(
            "    {:<28} {:>10} [target: {}] {}",
            label,
            format_duration(result.mean),
            target,
            if passed { "✓" } else { "✗" }
        ),
        None => println!("    {:<28} {:>10}", label, format_duration(result.mean)),
    }
}
