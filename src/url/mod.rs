//! URL handling module for Sitegraph
//!
//! This module provides URL normalization (the crawl's deduplication identity)
//! and the host helpers used for domain scoping.

mod domain;
mod normalize;

pub use domain::{extract_domain, origin_key, same_host};
pub use normalize::{normalize, NormalizedUrl};
