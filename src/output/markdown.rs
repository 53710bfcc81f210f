//! Markdown report generation
//!
//! This module generates a human-readable markdown summary of a crawl,
//! including status counters, errors and similar-URL clusters.

use crate::graph::SiteGraph;
use crate::output::report::CrawlReport;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Members listed per similarity cluster before the rest are elided
const CLUSTER_PREVIEW: usize = 5;

/// Writes a markdown report to `output_path`
///
/// # Arguments
///
/// * `report` - The aggregated report
/// * `graph` - The graph the report was built from, for cluster details
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_report(
    report: &CrawlReport,
    graph: &SiteGraph,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_report(report, graph);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    tracing::info!("Wrote markdown report to {}", output_path.display());
    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_report(report: &CrawlReport, graph: &SiteGraph) -> String {
    let mut md = String::new();

    md.push_str("# Sitegraph Crawl Report\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", report.seed));
    md.push_str(&format!("- **Max Depth**: {}\n", graph.max_depth));
    md.push_str(&format!("- **Started**: {}\n", graph.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", graph.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        report.duration_ms as f64 / 1000.0
    ));
    md.push_str(&format!(
        "- **Status**: {}\n\n",
        if report.cancelled { "cancelled" } else { "completed" }
    ));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Unique URLs**: {}\n", report.total_unique));
    md.push_str(&format!("- **Links**: {}\n", report.total_edges));
    md.push_str(&format!("- **Errors**: {}\n", report.errors.len()));
    md.push_str(&format!(
        "- **Deepest Level Fetched**: {}\n",
        report.max_depth_reached
    ));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        report.success_rate()
    ));

    md.push_str("## Status Breakdown\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    for (class, count) in &report.by_status {
        md.push_str(&format!("| {} | {} |\n", class, count));
    }
    md.push('\n');

    md.push_str("## Resource Kinds\n\n");
    md.push_str("| Kind | Count |\n");
    md.push_str("|------|-------|\n");
    for (kind, count) in &report.by_kind {
        md.push_str(&format!("| {:?} | {} |\n", kind, count));
    }
    md.push('\n');

    if !report.errors.is_empty() {
        md.push_str("## Errors\n\n");
        md.push_str("| URL | Error |\n");
        md.push_str("|-----|-------|\n");
        for error in &report.errors {
            md.push_str(&format!("| {} | {} |\n", error.url, error.kind));
        }
        md.push('\n');
    }

    if !graph.clusters.is_empty() {
        md.push_str("## Similar URLs\n\n");
        md.push_str(&format!(
            "{} URLs fold into {} clusters.\n\n",
            report.similar_count, report.cluster_count
        ));

        for cluster in &graph.clusters {
            md.push_str(&format!(
                "### {} ({} URLs)\n\n",
                cluster.path_key,
                cluster.members.len()
            ));
            for member in cluster.members.iter().take(CLUSTER_PREVIEW) {
                md.push_str(&format!("- {}\n", member));
            }
            if cluster.members.len() > CLUSTER_PREVIEW {
                md.push_str(&format!(
                    "\n... and {} more\n",
                    cluster.members.len() - CLUSTER_PREVIEW
                ));
            }
            md.push('\n');
        }
    }

    md
}
