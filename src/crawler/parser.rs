//! HTML link extraction
//!
//! Only static markup is inspected; links created by scripts are invisible.
//!
//! # Extraction Rules
//!
//! **Include:**
//! - `<a href="...">` (anchors, followed when on the seed's host)
//! - `<img src="...">`
//! - `<script src="...">`
//! - `<link rel="stylesheet" href="...">`
//!
//! **Exclude:**
//! - `<a href="..." download>`
//! - `javascript:`, `mailto:`, `tel:` links
//! - Data URIs
//! - Empty and fragment-only references
//! - `<form action="...">` (submissions, not resources)

use crate::graph::LinkKind;
use scraper::{ElementRef, Html, Selector};

const LINK_SELECTOR: &str = "a[href], img[src], script[src], link[href]";

const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// A reference found in a document, not yet resolved or normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub href: String,
    pub kind: LinkKind,
}

/// Parsed HTML document ready for link extraction
///
/// `scraper::Html` is not `Send`, so an extractor must be created and
/// drained without crossing an `.await`.
pub struct LinkExtractor {
    document: Html,
    selector: Option<Selector>,
}

impl LinkExtractor {
    /// Parses a document; malformed markup is repaired, never rejected
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            selector: Selector::parse(LINK_SELECTOR).ok(),
        }
    }

    /// Iterates over the document's links in document order
    ///
    /// The iterator is lazy and single pass.
    pub fn links(&self) -> impl Iterator<Item = ExtractedLink> + '_ {
        self.selector
            .iter()
            .flat_map(move |selector| self.document.select(selector))
            .filter_map(classify_element)
    }
}

/// Parses `html` and collects all of its links
///
/// # Example
///
/// ```
/// use sitegraph::crawler::extract_links;
/// use sitegraph::graph::LinkKind;
///
/// let links = extract_links(r#"<a href="/about">About</a><img src="logo.png">"#);
/// assert_eq!(links.len(), 2);
/// assert_eq!(links[0].href, "/about");
/// assert_eq!(links[1].kind, LinkKind::Image);
/// ```
pub fn extract_links(html: &str) -> Vec<ExtractedLink> {
    LinkExtractor::parse(html).links().collect()
}

fn classify_element(element: ElementRef<'_>) -> Option<ExtractedLink> {
    let el = element.value();

    let (href, kind) = match el.name() {
        "a" => {
            if el.attr("download").is_some() {
                return None;
            }
            (el.attr("href")?, LinkKind::Anchor)
        }
        "img" => (el.attr("src")?, LinkKind::Image),
        "script" => (el.attr("src")?, LinkKind::Script),
        "link" => {
            let rel = el.attr("rel")?;
            if !rel
                .split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            {
                return None;
            }
            (el.attr("href")?, LinkKind::Stylesheet)
        }
        _ => return None,
    };

    let href = href.trim();
    if !is_followable(href) {
        return None;
    }

    Some(ExtractedLink {
        href: href.to_string(),
        kind,
    })
}

fn is_followable(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') {
        return false;
    }

    let lower = href.to_ascii_lowercase();
    !SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}
