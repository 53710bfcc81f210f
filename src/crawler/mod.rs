//! Crawler module for resource fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and manual redirect handling
//! - HTML parsing and link extraction
//! - The frontier queue shared by workers
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{crawl, Coordinator, CrawlOutcome};
pub use fetcher::{build_http_client, FetchResult, Fetcher};
pub use parser::{extract_links, ExtractedLink, LinkExtractor};
pub use scheduler::{Dispatch, Frontier, FrontierEntry};
