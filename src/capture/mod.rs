//! Capture orchestration
//!
//! The `Archiver` drives one capture end to end: policy check, page
//! fetch, optional sanitizing, resource discovery, concurrent resource
//! download, reference rewriting, and bundle persistence, registering the
//! result with the catalog. Each capture moves through an explicit phase
//! sequence; any failure after the bundle directory exists aborts the
//! bundle so partial snapshots never survive on disk.

use crate::catalog::Catalog;
use crate::config::Config;
use crate::download::{self, Downloader, ResourceOutcome};
use crate::fetch::{build_http_client, make_fetcher, BrowserSession, Engine};
use crate::resolve;
use crate::robots::PolicyCache;
use crate::snapshot::{self, SnapshotDir, SnapshotMetadata};
use crate::{ArchiveError, Result, UrlError};
use scraper::{Html, Selector};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One unit of progress for a caller-supplied reporter
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub message: String,
    pub percent: u8,
}

/// Caller-supplied progress reporter
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Parameters for one capture
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub url: String,
    /// Overrides the configured default engine
    pub engine: Option<Engine>,
    /// Overrides the configured sanitize setting
    pub sanitize: Option<bool>,
    /// Skips the robots.txt check for this capture
    pub ignore_robots: bool,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            engine: None,
            sanitize: None,
            ignore_robots: false,
        }
    }
}

/// Phases a capture moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Init,
    PolicyCheck,
    Fetching,
    Sanitizing,
    ResourceDiscovery,
    ResourceFetch,
    Rewriting,
    Persisting,
    ThumbnailGen,
    Done,
    Failed,
}

/// Tracks and logs one capture's phase transitions
struct CaptureSession {
    url: String,
    phase: CapturePhase,
}

impl CaptureSession {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            phase: CapturePhase::Init,
        }
    }

    fn advance(&mut self, next: CapturePhase) {
        tracing::debug!("{}: {:?} -> {:?}", self.url, self.phase, next);
        self.phase = next;
    }

    fn fail(&mut self) {
        tracing::debug!("{}: {:?} -> Failed", self.url, self.phase);
        self.phase = CapturePhase::Failed;
    }
}

/// One resource that could not be localized, collected, never fatal
#[derive(Debug, Clone)]
pub struct ResourceError {
    pub url: String,
    pub reason: String,
}

/// Result of one successful capture
///
/// `resource_errors` aggregates the per-resource failures swallowed at
/// the downloader boundary; the capture itself still succeeded and those
/// references remain pointing at their original remote URLs.
#[derive(Debug)]
pub struct CaptureReport {
    pub metadata: SnapshotMetadata,
    pub resource_errors: Vec<ResourceError>,
}

/// One URL that failed inside a batch
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome summary of a batch capture
#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: Vec<SnapshotMetadata>,
    pub failed: Vec<BatchFailure>,
}

/// Capture engine front door
pub struct Archiver<C: Catalog> {
    config: Config,
    client: reqwest::Client,
    policy: Arc<PolicyCache>,
    session: BrowserSession,
    catalog: C,
}

impl<C: Catalog> Archiver<C> {
    /// Builds an archiver from configuration and a catalog collaborator
    pub fn new(config: Config, catalog: C) -> Result<Self> {
        let timeout = Duration::from_secs(config.archive.timeout_secs);
        let client = build_http_client(&config.user_agent, timeout)?;
        let policy = Arc::new(PolicyCache::new(
            client.clone(),
            config.user_agent.header_value(),
            timeout,
        ));

        Ok(Self {
            config,
            client,
            policy,
            session: BrowserSession::new(),
            catalog,
        })
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.archive.timeout_secs)
    }

    /// Captures one page into a snapshot bundle and catalogs it
    ///
    /// The policy check runs before anything touches the disk. Once the
    /// bundle directory exists, any failure aborts it; the directory is
    /// only left behind after a successful commit.
    pub async fn capture(
        &self,
        request: &CaptureRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<CaptureReport> {
        let url = parse_target(&request.url)?;
        let mut session = CaptureSession::new(url.as_str());

        session.advance(CapturePhase::PolicyCheck);
        report(&progress, "Checking fetch policy...", 5);
        let enforce_policy = self.config.archive.respect_robots_txt && !request.ignore_robots;
        if enforce_policy && !self.policy.allowed(&url).await {
            session.fail();
            return Err(ArchiveError::PolicyDenied {
                url: url.to_string(),
            });
        }

        let host = url
            .host_str()
            .ok_or(ArchiveError::UrlError(UrlError::MissingOrigin))?
            .to_string();
        let timestamp = snapshot::capture_timestamp();
        let dir_name = snapshot::bundle_dir_name(&host, &timestamp);

        let base = Path::new(&self.config.archive.base_dir);
        std::fs::create_dir_all(base)?;
        let snap = SnapshotDir::begin(base, &dir_name)?;

        let result = self
            .capture_into(&snap, &url, &host, &timestamp, request, enforce_policy, &progress, &mut session)
            .await;

        match result {
            Ok(capture_report) => {
                // Registration is still inside the abort-guarded span: a
                // database failure here is fatal and must not leave the
                // bundle behind.
                match self.catalog.add_entry(&capture_report.metadata) {
                    Ok(Some(id)) => tracing::info!(
                        "Catalogued {} as entry {}",
                        capture_report.metadata.directory,
                        id
                    ),
                    Ok(None) => tracing::info!(
                        "Directory {} already catalogued, skipping registration",
                        capture_report.metadata.directory
                    ),
                    Err(e) => {
                        session.fail();
                        tracing::warn!(
                            "Capture of {} failed: {}, removing partial bundle",
                            url,
                            e
                        );
                        snap.abort();
                        return Err(e);
                    }
                }
                session.advance(CapturePhase::Done);
                report(&progress, "Page saved successfully", 100);
                Ok(capture_report)
            }
            Err(e) => {
                session.fail();
                tracing::warn!("Capture of {} failed: {}, removing partial bundle", url, e);
                snap.abort();
                Err(e)
            }
        }
    }

    /// Everything between `begin` and `commit`; errors here trigger abort
    #[allow(clippy::too_many_arguments)]
    async fn capture_into(
        &self,
        snap: &SnapshotDir,
        url: &Url,
        host: &str,
        timestamp: &str,
        request: &CaptureRequest,
        enforce_policy: bool,
        progress: &Option<ProgressCallback>,
        session: &mut CaptureSession,
    ) -> Result<CaptureReport> {
        session.advance(CapturePhase::Fetching);
        report(progress, "Downloading page...", 10);

        let engine = request.engine.unwrap_or(self.config.archive.preferred_engine);
        let fetcher = make_fetcher(engine, &self.client, &self.session);
        let rendered = fetcher.render(url, self.timeout()).await?;
        if let Some(warning) = &rendered.warning {
            report(progress, warning, 15);
        }

        let mut html = rendered.html;
        if request.sanitize.unwrap_or(self.config.archive.sanitize_html) {
            session.advance(CapturePhase::Sanitizing);
            report(progress, "Removing active content...", 25);
            html = resolve::sanitize_html(&html);
        }

        session.advance(CapturePhase::ResourceDiscovery);
        report(progress, "Collecting resources...", 30);
        let mut refs = resolve::discover(&html, url, &self.config.resources);
        tracing::info!("Discovered {} resources on {}", refs.len(), url);

        session.advance(CapturePhase::ResourceFetch);
        let resource_policy = enforce_policy.then(|| Arc::clone(&self.policy));
        let downloader = Downloader::new(
            self.client.clone(),
            resource_policy,
            self.config.resources,
            self.timeout(),
        );

        let sink: Option<download::ProgressSink> = progress.clone().map(|cb| {
            Arc::new(move |done: usize, total: usize| {
                let percent = 30 + ((done * 55) / total.max(1)) as u8;
                cb(ProgressUpdate {
                    message: format!("Downloading resources ({}/{})...", done, total),
                    percent,
                });
            }) as download::ProgressSink
        });

        let outcomes = downloader
            .fetch_all(
                &refs,
                snap.path(),
                self.config.archive.max_concurrent_downloads,
                sink,
            )
            .await;

        let mut resource_errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                ResourceOutcome::Saved { index, local_path } => {
                    if let Some(r) = refs.get_mut(index) {
                        r.local_path = Some(local_path);
                    }
                }
                ResourceOutcome::Failed { index, reason } => {
                    let url = refs
                        .get(index)
                        .map(|r| r.resolved.to_string())
                        .unwrap_or_default();
                    resource_errors.push(ResourceError { url, reason });
                }
                // Policy skips are a deliberate drop, not an error
                ResourceOutcome::PolicySkipped { .. } => {}
            }
        }

        session.advance(CapturePhase::Rewriting);
        report(progress, "Rewriting references...", 90);
        let final_markup = resolve::rewrite_html(&html, &refs);

        session.advance(CapturePhase::Persisting);
        report(progress, "Saving page...", 93);
        let metadata = SnapshotMetadata {
            url: url.to_string(),
            title: extract_title(&html),
            domain: host.to_string(),
            timestamp: timestamp.to_string(),
            date_saved: snapshot::save_timestamp(),
            thumbnail: snap.path().join("thumbnail.png").display().to_string(),
            directory: snap.path().display().to_string(),
            engine_used: engine.as_str().to_string(),
            is_edited: None,
            original_directory: None,
            parent_id: None,
        };

        session.advance(CapturePhase::ThumbnailGen);
        report(progress, "Creating thumbnail...", 95);
        snap.commit(&final_markup, &metadata)?;

        Ok(CaptureReport {
            metadata,
            resource_errors,
        })
    }

    /// Captures several URLs sequentially, isolating failures per URL
    ///
    /// The shared browser session is shut down exactly once, after the
    /// last URL, regardless of how the individual captures ended.
    pub async fn batch(&self, requests: &[CaptureRequest]) -> BatchReport {
        let mut report = BatchReport {
            attempted: requests.len(),
            ..BatchReport::default()
        };

        for request in requests {
            match self.capture(request, None).await {
                Ok(capture_report) => report.succeeded.push(capture_report.metadata),
                Err(e) => {
                    tracing::warn!("Batch capture of {} failed: {}", request.url, e);
                    report.failed.push(BatchFailure {
                        url: request.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.session.shutdown().await;
        report
    }

    /// Clones an existing snapshot into a new version
    ///
    /// Carries the original's tags forward onto the new catalog entry and
    /// records a parent reference when the original is catalogued.
    pub fn fork(&self, original_dir: &Path, new_title: Option<&str>) -> Result<SnapshotMetadata> {
        let parent_entry = self
            .catalog
            .find_by_directory(&original_dir.display().to_string())?;

        let mut metadata = snapshot::fork(original_dir, new_title)?;
        if let Some(parent) = &parent_entry {
            metadata.parent_id = Some(parent.id);
            metadata.save(Path::new(&metadata.directory))?;
        }

        match self.catalog.add_entry(&metadata)? {
            Some(new_id) => {
                if let Some(parent) = &parent_entry {
                    for tag in self.catalog.list_tags(parent.id)? {
                        self.catalog.add_tag(new_id, &tag.name)?;
                    }
                }
                tracing::info!("Forked {} as entry {}", metadata.directory, new_id);
            }
            None => tracing::warn!(
                "Forked directory already catalogued: {}",
                metadata.directory
            ),
        }

        Ok(metadata)
    }

    /// Tears down the shared browser session
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}

/// Parses a capture target, defaulting to https for bare hostnames
fn parse_target(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{}", raw)))
        .map_err(|_| ArchiveError::UrlError(UrlError::Parse(raw.to_string())))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ArchiveError::UrlError(UrlError::InvalidScheme(
            other.to_string(),
        ))),
    }
}

/// Pulls the page title out of rendered markup
fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("title") {
        Ok(s) => s,
        Err(_) => return "Unknown Title".to_string(),
    };

    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Title".to_string())
}

fn report(progress: &Option<ProgressCallback>, message: &str, percent: u8) {
    if let Some(cb) = progress {
        cb(ProgressUpdate {
            message: message.to_string(),
            percent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_accepts_http_and_https() {
        assert!(parse_target("https://example.com/a").is_ok());
        assert!(parse_target("http://example.com").is_ok());
    }

    #[test]
    fn test_parse_target_defaults_to_https() {
        let url = parse_target("example.com/page").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_parse_target_rejects_other_schemes() {
        let err = parse_target("ftp://example.com/file").unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::UrlError(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>  My Page </title></head><body></body></html>";
        assert_eq!(extract_title(html), "My Page");
    }

    #[test]
    fn test_extract_title_fallback() {
        assert_eq!(extract_title("<html><body></body></html>"), "Unknown Title");
    }

    #[test]
    fn test_capture_request_defaults() {
        let request = CaptureRequest::new("https://example.com");
        assert!(request.engine.is_none());
        assert!(request.sanitize.is_none());
        assert!(!request.ignore_robots);
    }
}
