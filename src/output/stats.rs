//! Console rendering of a crawl report

use crate::output::report::{CrawlReport, StatusClass};

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report: {} ===\n", report.seed);

    if report.cancelled {
        println!("Crawl was cancelled; results are partial.\n");
    }

    println!("Overview:");
    println!("  Unique URLs: {}", report.total_unique);
    println!("  Links recorded: {}", report.total_edges);
    println!("  Deepest level fetched: {}", report.max_depth_reached);
    println!(
        "  Duration: {:.2}s",
        report.duration_ms as f64 / 1000.0
    );
    println!();

    println!("URLs by Status:");
    // Sort classes by count (descending)
    let mut status_counts: Vec<(&StatusClass, &u64)> = report.by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (class, count) in status_counts {
        let percentage = if report.total_unique > 0 {
            (*count as f64 / report.total_unique as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", class, count, percentage);
    }
    println!();

    println!("URLs by Kind:");
    for (kind, count) in &report.by_kind {
        println!("  {:?}: {}", kind, count);
    }
    println!();

    if report.cluster_count > 0 {
        println!(
            "Similar URLs: {} in {} clusters",
            report.similar_count, report.cluster_count
        );
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for error in &report.errors {
            println!("  - {} ({})", error.url, error.kind);
        }
        println!();
    }

    println!("Success Rate: {:.1}%", report.success_rate());
}
