//! Robots.txt gate with a per-origin cache
//!
//! Each origin's robots.txt is fetched lazily on the first query for that
//! origin and kept for the rest of the run. Concurrent first queries for the
//! same origin share a single fetch.

use crate::config::RobotsPolicy;
use crate::robots::ParsedRobots;
use crate::url::origin_key;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

type RobotsCell = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Decides whether URLs may be fetched according to robots.txt
pub struct RobotsGate {
    client: Client,
    /// Product token matched against `User-agent` groups
    agent: String,
    policy: RobotsPolicy,
    cache: Mutex<HashMap<String, RobotsCell>>,
}

impl RobotsGate {
    /// Creates a new gate
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to download robots.txt files
    /// * `agent` - Product token used for rule matching (the crawler name)
    /// * `policy` - Whether rules are enforced at all
    pub fn new(client: Client, agent: impl Into<String>, policy: RobotsPolicy) -> Self {
        Self {
            client,
            agent: agent.into(),
            policy,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched
    ///
    /// Never fails: a robots.txt that cannot be retrieved allows everything.
    pub async fn allowed(&self, url: &Url) -> bool {
        if self.policy == RobotsPolicy::Ignore {
            return true;
        }

        let rules = self.rules_for(url).await;
        let allowed = rules.is_allowed(url.as_str(), &self.agent);
        if !allowed {
            tracing::debug!("URL {} disallowed by robots.txt", url);
        }
        allowed
    }

    /// Returns the `Crawl-delay` requested by the host of `url`, if any
    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        if self.policy == RobotsPolicy::Ignore {
            return None;
        }

        self.rules_for(url).await.crawl_delay(&self.agent)
    }

    /// Number of origins whose robots.txt has been resolved
    pub fn cached_origins(&self) -> usize {
        self.lock_cache()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    async fn rules_for(&self, url: &Url) -> Arc<ParsedRobots> {
        let cell = {
            let mut cache = self.lock_cache();
            cache.entry(origin_key(url)).or_default().clone()
        };

        cell.get_or_init(|| async { Arc::new(self.fetch(url).await) })
            .await
            .clone()
    }

    async fn fetch(&self, url: &Url) -> ParsedRobots {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(_) => return ParsedRobots::allow_all(),
        };

        tracing::debug!("Fetching {}", robots_url);

        let response = match self.client.get(robots_url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
                return ParsedRobots::allow_all();
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "{} returned HTTP {}; allowing all",
                robots_url,
                response.status().as_u16()
            );
            return ParsedRobots::allow_all();
        }

        match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}; allowing all", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, RobotsCell>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
