//! Performance report generation

use crate::utils::{format_duration, format_throughput, BenchResult};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct BenchEntry {
    pub name: String,
    pub size: Option<usize>,
    pub result: BenchResult,
    pub throughput: Option<f64>,
    pub target: Option<&'static str>,
    pub passed: Option<bool>,
}

/// Results grouped by category, printed in category order.
#[derive(Debug, Default)]
pub struct Report {
    categories: BTreeMap<String, Vec<BenchEntry>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, category: &str, entry: BenchEntry) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(entry);
    }

    pub fn add_result(
        &mut self,
        category: &str,
        name: &str,
        size: Option<usize>,
        result: BenchResult,
        throughput: Option<f64>,
    ) {
        self.add(
            category,
            BenchEntry {
                name: name.to_string(),
                size,
                result,
                throughput,
                target: None,
                passed: None,
            },
        );
    }

    pub fn add_with_target(
        &mut self,
        category: &str,
        name: &str,
        size: Option<usize>,
        result: BenchResult,
        target: &'static str,
        passed: bool,
    ) {
        self.add(
            category,
            BenchEntry {
                name: name.to_string(),
                size,
                result,
                throughput: None,
                target: Some(target),
                passed: Some(passed),
            },
        );
    }

    fn entries(&self) -> impl Iterator<Item = &BenchEntry> {
        self.categories.values().flatten()
    }

    /// Number of target checks that were not met.
    pub fn failed_targets(&self) -> usize {
        self.entries().filter(|e| e.passed == Some(false)).count()
    }

    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                  TESSERA PERFORMANCE SUMMARY                     ║");
        println!("╚══════════════════════════════════════════════════════════════════╝\n");

        for (category, entries) in &self.categories {
            println!("┌─ {} ─", category);
            for entry in entries {
                let size_str = entry
                    .size
                    .map(|s| format!(" [{:>6}]", format_size(s)))
                    .unwrap_or_default();

                let status = match entry.passed {
                    Some(true) => "✓",
                    Some(false) => "✗",
                    None => " ",
                };

                let throughput_str = entry
                    .throughput
                    .map(|t| format!(" ({})", format_throughput(t)))
                    .unwrap_or_default();

                let target_str = entry
                    .target
                    .map(|t| format!(" [target: {}]", t))
                    .unwrap_or_default();

                println!(
                    "│ {} {:<30}{}: {:>12}{}{}",
                    status,
                    entry.name,
                    size_str,
                    format_duration(entry.result.mean),
                    throughput_str,
                    target_str
                );
            }
            println!("└─");
            println!();
        }

        let total = self.entries().filter(|e| e.passed.is_some()).count();
        let failed = self.failed_targets();

        if total > 0 {
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!(
                "  Target Checks: {} passed, {} failed, {} total",
                total - failed,
                failed,
                total
            );
            if failed > 0 {
                println!("  Status: SOME TARGETS NOT MET");
            } else {
                println!("  Status: ALL TARGETS MET ✓");
            }
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        }
    }
}

fn format_size(size: usize) -> String {
    if size >= 1_000_000 {
        format!("{}M", size / 1_000_000)
    } else if size >= 1_000 {
        format!("{}K", size / 1_000)
    } else {
        format!("{}", size)
    }
}
