//! Fetch-policy enforcement
//!
//! Per-origin robots.txt decisions, fetched once per origin and cached for
//! the process lifetime. The cache supports concurrent lookups from the
//! resource download workers: different origins proceed independently,
//! while a write lock serializes insertion of a newly fetched policy.
//!
//! There is no TTL. Captures run in short-lived CLI invocations, so a
//! policy fetched at process start cannot go meaningfully stale; a
//! long-running service embedding this crate would need to add one.

mod parser;

pub use parser::ParsedRobots;

use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// Concurrent per-origin robots.txt cache
pub struct PolicyCache {
    client: Client,
    user_agent: String,
    timeout: Duration,
    entries: RwLock<HashMap<String, ParsedRobots>>,
}

impl PolicyCache {
    /// Creates a new policy cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to retrieve robots.txt documents
    /// * `user_agent` - User agent string the rules are evaluated against
    /// * `timeout` - Per-fetch timeout for the policy document itself
    pub fn new(client: Client, user_agent: String, timeout: Duration) -> Self {
        Self {
            client,
            user_agent,
            timeout,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Checks whether the given URL may be fetched
    ///
    /// On a cache miss the origin's robots.txt is retrieved and parsed
    /// once. Any retrieval or parse failure yields a permissive policy,
    /// logged as a warning. URLs without a host (nothing to scope a
    /// policy to) are always allowed.
    pub async fn allowed(&self, url: &Url) -> bool {
        let origin = match origin_key(url) {
            Some(o) => o,
            None => return true,
        };

        {
            let entries = self.entries.read().await;
            if let Some(robots) = entries.get(&origin) {
                return robots.is_allowed(url.as_str(), &self.user_agent);
            }
        }

        let robots = self.fetch_policy(&origin).await;
        let allowed = robots.is_allowed(url.as_str(), &self.user_agent);

        // Another worker may have raced us here; first insert wins and
        // both copies were parsed from the same document.
        self.entries.write().await.entry(origin).or_insert(robots);

        allowed
    }

    /// Retrieves and parses robots.txt for one origin, failing open
    async fn fetch_policy(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!("Fetching policy document: {}", robots_url);

        let response = self
            .client
            .get(&robots_url)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => ParsedRobots::from_content(&body),
                Err(e) => {
                    tracing::warn!(
                        "Failed to read robots.txt body for {}: {}; treating as allow-all",
                        origin,
                        e
                    );
                    ParsedRobots::allow_all()
                }
            },
            Ok(resp) => {
                tracing::warn!(
                    "robots.txt for {} returned HTTP {}; treating as allow-all",
                    origin,
                    resp.status()
                );
                ParsedRobots::allow_all()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to fetch robots.txt for {}: {}; treating as allow-all",
                    origin,
                    e
                );
                ParsedRobots::allow_all()
            }
        }
    }

    /// Number of origins currently cached
    pub async fn cached_origins(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Derives the policy cache key (scheme + host + optional port) for a URL
fn origin_key(url: &Url) -> Option<String> {
    url.host_str()?;
    let origin = url.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}
