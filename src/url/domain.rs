use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain/host
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitegraph::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when both URLs point at the same host
///
/// Scheme and port are ignored, so `http://a.com` and `https://a.com:8443`
/// are considered the same site.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Key used to cache per-origin state such as robots.txt
///
/// An origin is scheme, host, and port; `https://a.com` and `http://a.com`
/// have separate robots.txt files.
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
