//! HTTP fetcher implementation
//!
//! This module handles all resource requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Retry logic for transient failures
//! - Content-Type classification
//!
//! The fetcher sends exactly one request per attempt and never follows
//! redirects. A 3xx comes back with its resolved `Location` so the
//! coordinator can apply robots, scope and dedup rules to every hop.

use crate::config::Config;
use crate::graph::ResourceKind;
use crate::FetchError;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Response};
use std::time::{Duration, Instant};
use url::Url;

/// Outcome of a successful fetch (any HTTP status)
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL that was requested
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub kind: ResourceKind,
    /// Decoded body, kept for HTML only
    pub body: Option<String>,
    /// Body size in bytes
    pub size: u64,
    pub elapsed: Duration,
    /// Resolved redirect target of a 3xx response
    pub location: Option<Url>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeouts)
/// * `redirects` - Redirect policy; the fetcher uses `Policy::none()`
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config, redirects: Policy) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.crawler.request_timeout_ms);

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(redirects)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches single resources with retry handling
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    /// Creates a fetcher with its own client
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config, Policy::none())?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a fetcher around an existing client
    ///
    /// The client must not follow redirects itself.
    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            max_retries: config.crawler.max_retries,
            retry_delay: Duration::from_millis(config.crawler.retry_delay_ms),
        }
    }

    /// Fetches a URL with full error handling and retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 5xx | Retry up to `max-retries` times |
    /// | Timeout | Retry up to `max-retries` times |
    /// | Connection error | Retry up to `max-retries` times |
    /// | Any other status, 3xx included | Returned as is |
    ///
    /// After the last attempt the last outcome is returned, so a persistent
    /// 503 comes back as `Ok` with status 503.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let outcome = self.fetch_once(url, start).await;

            let transient = match &outcome {
                Ok(result) => result.status >= 500,
                Err(FetchError::Timeout { .. }) | Err(FetchError::Connection { .. }) => true,
                Err(FetchError::TooManyRedirects { .. }) => false,
            };

            if !transient || attempt >= self.max_retries {
                return outcome;
            }

            attempt += 1;
            tracing::debug!(
                "Retrying {} (attempt {}/{})",
                url,
                attempt,
                self.max_retries
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn fetch_once(&self, url: &Url, start: Instant) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        let location = if response.status().is_redirection() {
            redirect_target(url, &response)
        } else {
            None
        };
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let kind = ResourceKind::from_content_type(content_type.as_deref());

        let (body, size) = if kind == ResourceKind::Html && location.is_none() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| classify_error(url, e))?;
            (
                Some(String::from_utf8_lossy(&bytes).into_owned()),
                bytes.len() as u64,
            )
        } else {
            (None, body_size(url, response).await?)
        };

        Ok(FetchResult {
            url: url.clone(),
            status,
            content_type,
            kind,
            body,
            size,
            elapsed: start.elapsed(),
            location,
        })
    }
}

/// Measures a body without keeping it
///
/// `Content-Length` is trusted when present; otherwise the body is streamed
/// and counted chunk by chunk.
async fn body_size(url: &Url, mut response: Response) -> Result<u64, FetchError> {
    if let Some(length) = response.content_length() {
        return Ok(length);
    }

    let mut size = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| classify_error(url, e))?
    {
        size += chunk.len() as u64;
    }
    Ok(size)
}

/// Resolves the `Location` of a redirect response
///
/// Returns None when the header is missing, unparsable, or leaves http(s);
/// the redirect response itself is then treated as final.
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    match next.scheme() {
        "http" | "https" => Some(next),
        _ => None,
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
