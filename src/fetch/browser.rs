//! Headless-browser fetch backends
//!
//! Both browser engines share one `BrowserSession`: a lazily launched
//! Chromium instance that is health-checked before reuse and torn down
//! explicitly at the end of a run or batch. The session handle belongs to
//! the orchestrator and is never shared with resource download workers.
//!
//! A load-wait timeout is non-fatal: capture proceeds with whatever
//! markup rendered, and the degradation is surfaced as a warning on the
//! returned `Rendered`.

use crate::fetch::{PageFetcher, Rendered};
use crate::{ArchiveError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Settle delay after the load signal, letting delayed rendering finish
const DOM_READY_SETTLE: Duration = Duration::from_millis(2000);

/// Longer settle window for the network-idle engine. CDP offers no
/// built-in network-quiescence barrier, so this stands in for one.
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(4000);

/// Shared headless Chromium session
///
/// Cloning is cheap; all clones drive the same browser instance.
#[derive(Clone)]
pub struct BrowserSession {
    browser: Arc<Mutex<Option<Browser>>>,
}

impl Default for BrowserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserSession {
    pub fn new() -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Launches the browser if needed, replacing a dead instance
    async fn ensure(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;

        if let Some(browser) = guard.as_ref() {
            if browser.version().await.is_ok() {
                return Ok(());
            }
            tracing::warn!("Browser session unresponsive, relaunching");
            if let Some(mut dead) = guard.take() {
                let _ = dead.close().await;
            }
        }

        tracing::info!("Launching headless browser");
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--mute-audio")
            .build()
            .map_err(ArchiveError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ArchiveError::Browser(format!("Failed to launch browser: {}", e)))?;

        // The handler stream must be polled for the session to make progress
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {}", e);
                }
            }
        });

        *guard = Some(browser);
        Ok(())
    }

    /// Navigates to `url`, waits for the load signal up to `timeout`,
    /// settles, and extracts the rendered markup
    async fn render_page(&self, url: &Url, timeout: Duration, settle: Duration) -> Result<Rendered> {
        self.ensure().await?;

        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ArchiveError::Browser("Browser not initialized".to_string()))?;

        let page = browser.new_page(url.as_str()).await.map_err(|e| {
            ArchiveError::Backend {
                url: url.to_string(),
                message: format!("Failed to open page: {}", e),
            }
        })?;

        let mut warning = None;
        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!("Navigation wait failed for {}: {}, continuing", url, e);
                warning = Some(format!("Navigation wait failed: {}", e));
            }
            Err(_) => {
                tracing::warn!("Page load wait timed out for {}, continuing anyway", url);
                warning = Some("Page took too long to load, continuing anyway".to_string());
            }
        }

        tokio::time::sleep(settle).await;

        let html = page.content().await.map_err(|e| ArchiveError::Backend {
            url: url.to_string(),
            message: format!("Failed to extract page content: {}", e),
        })?;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close page for {}: {}", url, e);
        }

        Ok(Rendered { html, warning })
    }

    /// Tears the browser down; the next render relaunches lazily
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                tracing::error!("Failed to close browser: {}", e);
            } else {
                tracing::info!("Browser session shut down");
            }
        }
    }

    /// Whether a browser instance is currently alive
    pub async fn is_active(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}

/// Browser backend that proceeds once the document load signal fires
pub struct DomReadyFetcher {
    session: BrowserSession,
}

impl DomReadyFetcher {
    pub fn new(session: BrowserSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageFetcher for DomReadyFetcher {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<Rendered> {
        self.session.render_page(url, timeout, DOM_READY_SETTLE).await
    }
}

/// Browser backend that waits through an extended settle window
pub struct NetworkIdleFetcher {
    session: BrowserSession,
}

impl NetworkIdleFetcher {
    pub fn new(session: BrowserSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageFetcher for NetworkIdleFetcher {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<Rendered> {
        self.session
            .render_page(url, timeout, NETWORK_IDLE_SETTLE)
            .await
    }
}
