use serde::Deserialize;

/// Main configuration structure for Sitegraph
///
/// Every section is optional; missing sections and keys fall back to the
/// defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub robots: RobotsConfig,
    pub normalize: NormalizeConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers (default 5)
    pub concurrency: u32,

    /// Minimum time between two requests issued by the same worker (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Maximum number of redirect hops followed for one resource
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Number of retries for transient failures (timeouts, connection errors, 5xx)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay between retries (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            request_delay_ms: 100,
            request_timeout_ms: 10_000,
            max_redirects: 10,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "sitegraph".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version` or `CrawlerName/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Whether robots.txt rules are enforced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotsPolicy {
    #[default]
    Respect,
    Ignore,
}

/// Robots.txt configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    pub policy: RobotsPolicy,
}

/// How query strings take part in URL identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Keep the query exactly as written
    #[default]
    Preserve,
    /// Drop tracking parameters and sort the rest by key
    Sorted,
    /// Drop the query entirely
    Strip,
}

/// URL normalization configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    #[serde(rename = "query-mode")]
    pub query_mode: QueryMode,
}

/// Scan presets offered to the user, mapping directly to a maximum depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDepth {
    Quick = 1,
    Full = 2,
    Deep = 3,
}

impl ScanDepth {
    /// Returns the maximum crawl depth for this preset
    pub fn max_depth(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u8> for ScanDepth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Quick),
            2 => Ok(Self::Full),
            3 => Ok(Self::Deep),
            other => Err(format!("scan depth must be 1, 2 or 3, got {}", other)),
        }
    }
}

/// Parses a preset name (`quick`, `full`, `deep`) or its depth (`1`, `2`, `3`)
impl std::str::FromStr for ScanDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "full" => Ok(Self::Full),
            "deep" => Ok(Self::Deep),
            other => match other.parse::<u8>() {
                Ok(depth) => Self::try_from(depth),
                Err(_) => Err(format!(
                    "unknown scan depth '{}', expected quick, full, deep or 1-3",
                    s
                )),
            },
        }
    }
}
