//! Fetch backends
//!
//! Three interchangeable strategies turn a URL into rendered markup: a
//! direct HTTP client and two headless-browser strategies that differ in
//! how long they wait for dynamic content. All three are polymorphic over
//! a single `render` capability; selection is a configuration value.
//!
//! Resource downloads never go through a browser backend. They always use
//! the direct HTTP client, even when the main page was browser-rendered.

mod browser;
mod direct;

pub use browser::{BrowserSession, DomReadyFetcher, NetworkIdleFetcher};
pub use direct::DirectFetcher;

use crate::config::UserAgentConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Which fetch strategy renders the main page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    /// One GET request, no JavaScript execution. Fastest.
    Direct,
    /// Headless browser, waits for the document load signal.
    DomReady,
    /// Headless browser, waits through a longer settle window so
    /// late-loading content can finish rendering.
    NetworkIdle,
}

impl Engine {
    /// Stable string form, recorded in snapshot metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Direct => "direct",
            Engine::DomReady => "dom-ready",
            Engine::NetworkIdle => "network-idle",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markup produced by a fetch backend
///
/// `warning` carries a non-fatal degradation notice (a load-wait timeout
/// where capture proceeded with partial content) for the progress channel.
#[derive(Debug)]
pub struct Rendered {
    pub html: String,
    pub warning: Option<String>,
}

impl Rendered {
    pub fn complete(html: String) -> Self {
        Self {
            html,
            warning: None,
        }
    }
}

/// Capability shared by all fetch backends
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieves the rendered markup for a URL
    async fn render(&self, url: &Url, timeout: Duration) -> Result<Rendered>;
}

/// Builds the HTTP client shared by the direct backend, the policy cache,
/// and the resource downloader
///
/// # Arguments
///
/// * `user_agent` - Identification configuration for the User-Agent header
/// * `timeout` - Overall per-request timeout
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Constructs the backend for the given engine selection
pub fn make_fetcher(
    engine: Engine,
    client: &Client,
    session: &BrowserSession,
) -> Box<dyn PageFetcher> {
    match engine {
        Engine::Direct => Box::new(DirectFetcher::new(client.clone())),
        Engine::DomReady => Box::new(DomReadyFetcher::new(session.clone())),
        Engine::NetworkIdle => Box::new(NetworkIdleFetcher::new(session.clone())),
    }
}
