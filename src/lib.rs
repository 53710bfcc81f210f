//! Sitegraph: a domain-scoped site mapper
//!
//! This crate crawls a single site from a seed URL up to a bounded depth,
//! deduplicates and classifies every resource it discovers, and produces a
//! link graph plus a summary report of the crawl.

pub mod config;
pub mod crawler;
pub mod graph;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use serde::Serialize;
use thiserror::Error;

/// Errors that abort a crawl run
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL '{url}': {source}")]
    InvalidSeed { url: String, source: UrlError },

    #[error("Seed URL {url} is unreachable: {kind}")]
    SeedUnreachable { url: String, kind: FetchErrorKind },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failure of a single resource fetch
///
/// These never abort the crawl; the affected node is marked as errored.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection error for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Too many redirects from {url}")]
    TooManyRedirects { url: String },
}

impl FetchError {
    /// Returns the category of this failure
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Timeout { .. } => FetchErrorKind::Timeout,
            Self::Connection { .. } => FetchErrorKind::ConnectionError,
            Self::TooManyRedirects { .. } => FetchErrorKind::TooManyRedirects,
        }
    }
}

/// Category of a fetch failure, as recorded on graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FetchErrorKind {
    Timeout,
    ConnectionError,
    TooManyRedirects,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection error",
            Self::TooManyRedirects => "too many redirects",
        };
        write!(f, "{}", s)
    }
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, ScanDepth};
pub use crawler::{crawl, Coordinator, CrawlOutcome};
pub use graph::SiteGraph;
pub use output::{summarize, CrawlReport};
pub use url::{normalize, NormalizedUrl};
