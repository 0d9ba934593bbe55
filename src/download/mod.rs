//! Concurrent resource downloader
//!
//! Fans resource fetches out to a bounded worker pool. Each task owns a
//! disjoint mutation target (one reference index), so results can be
//! applied to the document without locking: no two tasks ever produce a
//! path for the same owning reference. Failures are caught at the task
//! boundary and reported per item; they never abort sibling tasks.
//!
//! Stylesheets recurse: a fetched stylesheet is scanned for its own
//! `url(...)` references, which are downloaded inside the same task and
//! rewritten before the stylesheet is written to disk.

use crate::config::ResourceToggles;
use crate::resolve::{self, ResourceKind, ResourceRef};
use crate::robots::PolicyCache;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Per-reference download result, correlated by reference index
#[derive(Debug)]
pub enum ResourceOutcome {
    /// Fetched and written; path is relative to the snapshot root
    Saved { index: usize, local_path: String },
    /// Dropped by fetch policy; the original URL stays in the document
    PolicySkipped { index: usize },
    /// Fetch or write failed; collected, never fatal to the run
    Failed { index: usize, reason: String },
}

impl ResourceOutcome {
    pub fn index(&self) -> usize {
        match self {
            ResourceOutcome::Saved { index, .. } => *index,
            ResourceOutcome::PolicySkipped { index } => *index,
            ResourceOutcome::Failed { index, .. } => *index,
        }
    }
}

/// Progress sink invoked with (completed, total) after each task finishes
pub type ProgressSink = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Bounded-concurrency fetcher for a capture's resource references
pub struct Downloader {
    client: Client,
    policy: Option<Arc<PolicyCache>>,
    toggles: ResourceToggles,
    timeout: Duration,
}

impl Downloader {
    pub fn new(
        client: Client,
        policy: Option<Arc<PolicyCache>>,
        toggles: ResourceToggles,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            policy,
            toggles,
            timeout,
        }
    }

    /// Fetches every reference, writing under `snapshot_dir/assets/`
    ///
    /// Submits one task per reference to a pool of at most `width`
    /// concurrent workers and joins them all before returning, so the
    /// caller can rewrite and persist knowing no task is still running.
    /// Exactly one outcome is returned per reference.
    pub async fn fetch_all(
        &self,
        refs: &[ResourceRef],
        snapshot_dir: &Path,
        width: usize,
        progress: Option<ProgressSink>,
    ) -> Vec<ResourceOutcome> {
        let total = refs.len();
        if total == 0 {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(width.max(1)));
        let mut tasks: JoinSet<ResourceOutcome> = JoinSet::new();

        for (index, r) in refs.iter().enumerate() {
            let worker = Worker {
                client: self.client.clone(),
                policy: self.policy.clone(),
                toggles: self.toggles,
                timeout: self.timeout,
                snapshot_dir: snapshot_dir.to_path_buf(),
            };
            let kind = r.kind;
            let resolved = r.resolved.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        return ResourceOutcome::Failed {
                            index,
                            reason: "worker pool closed".to_string(),
                        }
                    }
                };
                worker.run(index, kind, resolved).await
            });
        }

        let mut by_index: HashMap<usize, ResourceOutcome> = HashMap::with_capacity(total);
        let mut completed = 0usize;

        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            if let Some(sink) = &progress {
                sink(completed, total);
            }
            match joined {
                Ok(outcome) => {
                    by_index.insert(outcome.index(), outcome);
                }
                Err(e) => {
                    tracing::error!("Resource worker panicked: {}", e);
                }
            }
        }

        // One outcome per reference, in reference order; a panicked
        // worker surfaces as a failure for its reference.
        (0..total)
            .map(|index| {
                by_index
                    .remove(&index)
                    .unwrap_or_else(|| ResourceOutcome::Failed {
                        index,
                        reason: "worker terminated abnormally".to_string(),
                    })
            })
            .collect()
    }
}

/// Owned state for one download task
struct Worker {
    client: Client,
    policy: Option<Arc<PolicyCache>>,
    toggles: ResourceToggles,
    timeout: Duration,
    snapshot_dir: PathBuf,
}

impl Worker {
    async fn run(&self, index: usize, kind: ResourceKind, url: Url) -> ResourceOutcome {
        if let Some(policy) = &self.policy {
            if !policy.allowed(&url).await {
                tracing::info!("Skipping {} (blocked by robots.txt)", url);
                return ResourceOutcome::PolicySkipped { index };
            }
        }

        let result = match kind {
            ResourceKind::Stylesheet => self.download_stylesheet(&url).await,
            _ => self.download_binary(kind, &url).await,
        };

        match result {
            Ok(local_path) => ResourceOutcome::Saved { index, local_path },
            Err(reason) => {
                tracing::warn!("Failed to download {} {}: {}", kind.asset_dir(), url, reason);
                ResourceOutcome::Failed { index, reason }
            }
        }
    }

    /// Fetches a binary resource, streaming the body to disk
    async fn download_binary(&self, kind: ResourceKind, url: &Url) -> Result<String, String> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let content_type = header_content_type(&response);

        // CSS-internal references without an extension were provisionally
        // classified; the response content-type decides for real.
        let effective_kind = if resolve::extension_of(url).is_none() {
            content_type
                .as_deref()
                .and_then(ResourceKind::from_content_type)
                .unwrap_or(kind)
        } else {
            kind
        };

        let filename = resolve::local_filename(url, effective_kind, content_type.as_deref());
        let relative = format!("assets/{}/{}", effective_kind.asset_dir(), filename);
        let path = self.snapshot_dir.join(&relative);

        let mut response = response;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| e.to_string())?;
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        }
        file.flush().await.map_err(|e| e.to_string())?;

        Ok(relative)
    }

    /// Fetches a stylesheet, localizing its nested references first
    async fn download_stylesheet(&self, url: &Url) -> Result<String, String> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let content_type = header_content_type(&response);
        let css_text = response.text().await.map_err(|e| e.to_string())?;

        let nested = resolve::discover_css(&css_text, url, &self.toggles);
        let mut replacements: HashMap<String, String> = HashMap::new();

        for n in &nested {
            if let Some(policy) = &self.policy {
                if !policy.allowed(&n.resolved).await {
                    tracing::info!("Skipping {} (blocked by robots.txt)", n.resolved);
                    continue;
                }
            }
            match self.download_binary(n.kind, &n.resolved).await {
                Ok(local) => {
                    replacements.insert(n.raw.clone(), local);
                }
                Err(reason) => {
                    tracing::warn!("Failed CSS resource {}: {}", n.resolved, reason);
                }
            }
        }

        let rewritten = resolve::rewrite_css(&css_text, &replacements);

        let filename =
            resolve::local_filename(url, ResourceKind::Stylesheet, content_type.as_deref());
        let relative = format!("assets/css/{}", filename);
        let path = self.snapshot_dir.join(&relative);
        tokio::fs::write(&path, rewritten.as_bytes())
            .await
            .map_err(|e| e.to_string())?;

        Ok(relative)
    }
}

fn header_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
