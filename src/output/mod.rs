//! Output module for crawl reports and exports
//!
//! This module handles:
//! - Aggregating a finished graph into a [`CrawlReport`]
//! - Printing and writing the report (console, markdown)
//! - Exporting the graph as JSON
//! - Progress events emitted during the crawl

mod events;
mod export;
mod markdown;
mod report;
mod stats;

pub use events::CrawlEvent;
pub use export::write_graph_json;
pub use markdown::{format_markdown_report, write_markdown_report};
pub use report::{summarize, CrawlReport, ErrorKind, ReportedError, StatusClass};
pub use stats::print_report;

use thiserror::Error;

/// Errors that can occur while writing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
