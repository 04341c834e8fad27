//! Tessera performance targets.
//!
//! ```text
//! cargo run -p tessera-perf --release [selector|subscription|context]...
//! ```
//!
//! With no arguments every suite runs. Set `RUST_LOG=tessera=debug` to see
//! engine logs. Exits non-zero when a target is missed.

mod bench;
mod report;
mod utils;

use report::Report;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SUITES: [&str; 3] = ["selector", "subscription", "context"];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let requested: Vec<String> = std::env::args().skip(1).collect();
    if let Some(unknown) = requested.iter().find(|s| !SUITES.contains(&s.as_str())) {
        error!(suite = %unknown, "unknown suite, expected one of {SUITES:?}");
        return ExitCode::FAILURE;
    }
    let enabled = |suite: &str| requested.is_empty() || requested.iter().any(|s| s == suite);

    let mut report = Report::new();

    if enabled("selector") {
        println!("\n== Selector ==");
        if let Err(err) = bench::selector::run(&mut report) {
            error!(error = %err, "selector suite failed");
            return ExitCode::FAILURE;
        }
    }
    if enabled("subscription") {
        println!("\n== Subscription ==");
        bench::subscription::run(&mut report);
    }
    if enabled("context") {
        println!("\n== Context ==");
        if let Err(err) = bench::context::run(&mut report) {
            error!(error = %err, "context suite failed");
            return ExitCode::FAILURE;
        }
    }

    println!();
    report.print_summary();

    let failed = report.failed_targets();
    if failed > 0 {
        info!(failed, "performance targets missed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
