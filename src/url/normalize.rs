use crate::config::QueryMode;
use crate::UrlError;
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Query parameters dropped in `QueryMode::Sorted`
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// A URL in canonical form, usable as a deduplication key
///
/// Two references that normalize to the same string are the same resource
/// for the lifetime of a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl {
    url: Url,
    path_key: String,
}

impl NormalizedUrl {
    /// The identity key (the full normalized URL)
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Lowercase host of the URL
    pub fn host(&self) -> &str {
        // normalize() rejects URLs without a host
        self.url.host_str().unwrap_or_default()
    }

    /// The normalized URL with its query removed
    ///
    /// URLs sharing a path key differ only in their query string and are
    /// grouped together by the clusterer.
    pub fn path_key(&self) -> &str {
        &self.path_key
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Normalizes a URL reference into its canonical form
///
/// # Normalization Steps
///
/// 1. Resolve `raw` against `base` when given; a relative reference without
///    a base is rejected
/// 2. Reject anything but http and https, and URLs without a host
/// 3. Lowercase the host and drop the default port (done by the `url` parser)
/// 4. Normalize the path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
/// 5. Remove the fragment
/// 6. Apply the query mode: keep, filter and sort, or drop the query
///
/// The result is idempotent: normalizing an already normalized URL returns it unchanged.
///
/// # Arguments
///
/// * `raw` - The URL or reference to normalize
/// * `base` - Base URL for resolving relative references
/// * `mode` - How the query string takes part in identity
///
/// # Returns
///
/// * `Ok(NormalizedUrl)` - Canonical URL
/// * `Err(UrlError)` - The reference is malformed, unresolvable, or not http(s)
///
/// # Examples
///
/// ```
/// use sitegraph::config::QueryMode;
/// use sitegraph::url::normalize;
///
/// let url = normalize("HTTP://Example.COM:80/a/./b/#top", None, QueryMode::Preserve).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/b");
/// ```
pub fn normalize(raw: &str, base: Option<&Url>, mode: QueryMode) -> Result<NormalizedUrl, UrlError> {
    let raw = raw.trim();

    let mut url = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    }
    .map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            UrlError::Malformed(format!("relative reference '{}' has no base", raw))
        }
        other => UrlError::Parse(other.to_string()),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    match mode {
        QueryMode::Preserve => {
            if url.query() == Some("") {
                url.set_query(None);
            }
        }
        QueryMode::Sorted => {
            let params = filter_and_sort_query_params(&url);
            if params.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(params.iter());
            }
        }
        QueryMode::Strip => url.set_query(None),
    }

    let mut without_query = url.clone();
    without_query.set_query(None);

    Ok(NormalizedUrl {
        path_key: without_query.to_string(),
        url,
    })
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters by key
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // Stable sort keeps repeated keys in their original order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
