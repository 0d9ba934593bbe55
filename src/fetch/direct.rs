//! Direct HTTP fetch backend
//!
//! Issues one GET and returns the response body as text. No JavaScript
//! executes, so pages that assemble themselves client-side will capture
//! incompletely; the browser backends exist for those.

use crate::fetch::{PageFetcher, Rendered};
use crate::{ArchiveError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetch backend backed by a plain HTTP client
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for DirectFetcher {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<Rendered> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let response = response.error_for_status().map_err(|e| ArchiveError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let body = response.text().await.map_err(|e| classify(url, e))?;
        Ok(Rendered::complete(body))
    }
}

/// Maps a reqwest error onto the archive error taxonomy
fn classify(url: &Url, e: reqwest::Error) -> ArchiveError {
    if e.is_timeout() {
        ArchiveError::Timeout {
            url: url.to_string(),
        }
    } else {
        ArchiveError::Http {
            url: url.to_string(),
            source: e,
        }
    }
}
