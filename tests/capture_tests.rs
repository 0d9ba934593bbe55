//! End-to-end capture tests
//!
//! These run the full pipeline against a local mock server: fetch,
//! resource download, rewriting, persistence, and catalog registration.

use pagevault::capture::{Archiver, CaptureRequest};
use pagevault::catalog::{Catalog, ListFilter, SqliteCatalog};
use pagevault::config::Config;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_dir: &Path) -> Config {
    let mut config = Config::default();
    config.archive.base_dir = base_dir.display().to_string();
    config.archive.timeout_secs = 5;
    config
}

fn test_archiver(base_dir: &Path) -> Archiver<SqliteCatalog> {
    let catalog = SqliteCatalog::new_in_memory().unwrap();
    Archiver::new(test_config(base_dir), catalog).unwrap()
}

async fn mount_page(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_asset(server: &MockServer, route: &str, content_type: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("content-type", content_type),
        )
        .mount(server)
        .await;
}

fn snapshot_dirs(base: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(base) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_capture_produces_self_contained_bundle() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        r#"<html><head><title>Test Page</title>
           <link rel="stylesheet" href="/style.css">
           <script src="/app.js"></script>
           </head><body>
           <img src="/logo.png">
           </body></html>"#,
    )
    .await;
    mount_asset(
        &server,
        "/style.css",
        "text/css",
        b"@font-face { src: url(/title.woff2); } body { margin: 0; }",
    )
    .await;
    mount_asset(&server, "/app.js", "application/javascript", b"console.log(1);").await;
    mount_asset(&server, "/logo.png", "image/png", &[0u8; 32]).await;
    mount_asset(&server, "/title.woff2", "font/woff2", &[1u8; 32]).await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    let report = archiver.capture(&request, None).await.unwrap();
    assert!(report.resource_errors.is_empty());
    let metadata = report.metadata;

    assert_eq!(metadata.title, "Test Page");
    assert_eq!(metadata.engine_used, "direct");

    let dir = Path::new(&metadata.directory);
    assert!(dir.join("index.html").exists());
    assert!(dir.join("metadata.json").exists());
    assert!(dir.join("thumbnail.png").exists());
    assert!(dir.join("assets/css/style.css").exists());
    assert!(dir.join("assets/js/app.js").exists());
    assert!(dir.join("assets/images/logo.png").exists());
    assert!(dir.join("assets/fonts/title.woff2").exists());

    // References point at the local copies
    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(html.contains(r#"href="assets/css/style.css""#), "html: {}", html);
    assert!(html.contains(r#"src="assets/js/app.js""#));
    assert!(html.contains(r#"src="assets/images/logo.png""#));

    // Stylesheet-internal references rewritten relative to the stylesheet
    let css = std::fs::read_to_string(dir.join("assets/css/style.css")).unwrap();
    assert!(css.contains("url(../fonts/title.woff2)"), "css: {}", css);

    // Catalogued under the bundle directory
    let entry = archiver
        .catalog()
        .find_by_directory(&metadata.directory)
        .unwrap()
        .unwrap();
    assert_eq!(entry.title, "Test Page");
}

#[tokio::test]
async fn test_failed_resource_keeps_original_reference() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        r#"<html><head><title>Partial</title></head><body>
           <img src="/ok.png">
           <img src="/missing.png">
           </body></html>"#,
    )
    .await;
    mount_asset(&server, "/ok.png", "image/png", &[0u8; 16]).await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    let report = archiver.capture(&request, None).await.unwrap();

    let dir = Path::new(&report.metadata.directory);
    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(html.contains(r#"src="assets/images/ok.png""#));
    // The failed image still points at its original URL
    assert!(html.contains(r#"src="/missing.png""#));

    // The failure is reported, with its URL and reason
    assert_eq!(report.resource_errors.len(), 1);
    assert!(report.resource_errors[0].url.contains("/missing.png"));
    assert!(!report.resource_errors[0].reason.is_empty());
}

#[tokio::test]
async fn test_robots_denied_page_leaves_no_trace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "<html><head><title>Blocked</title></head></html>").await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    let err = archiver.capture(&request, None).await.unwrap_err();
    assert!(err.to_string().contains("robots.txt"));

    // No directory was created and nothing was catalogued
    assert!(snapshot_dirs(base.path()).is_empty());
    let entries = archiver
        .catalog()
        .list_entries(&ListFilter::default())
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_ignore_robots_overrides_denial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "<html><head><title>Anyway</title></head></html>").await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let mut request = CaptureRequest::new(format!("{}/", server.uri()));
    request.ignore_robots = true;
    let report = archiver.capture(&request, None).await.unwrap();
    assert_eq!(report.metadata.title, "Anyway");
}

#[tokio::test]
async fn test_failed_fetch_removes_partial_bundle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    assert!(archiver.capture(&request, None).await.is_err());

    // The aborted bundle directory was removed
    assert!(snapshot_dirs(base.path()).is_empty());
}

#[tokio::test]
async fn test_failed_registration_removes_bundle() {
    use pagevault::catalog::{CatalogEntry, NoteRecord, TagRecord};
    use pagevault::snapshot::SnapshotMetadata;
    use pagevault::ArchiveError;

    // Catalog whose writes always fail, as with a locked database file
    struct ClosedCatalog;

    impl Catalog for ClosedCatalog {
        fn add_entry(&self, _metadata: &SnapshotMetadata) -> pagevault::Result<Option<i64>> {
            Err(ArchiveError::Database(rusqlite::Error::InvalidQuery))
        }
        fn update_title(&self, _id: i64, _title: &str) -> pagevault::Result<()> {
            Err(ArchiveError::Database(rusqlite::Error::InvalidQuery))
        }
        fn find_by_directory(
            &self,
            _directory: &str,
        ) -> pagevault::Result<Option<CatalogEntry>> {
            Ok(None)
        }
        fn list_entries(&self, _filter: &ListFilter) -> pagevault::Result<Vec<CatalogEntry>> {
            Ok(Vec::new())
        }
        fn delete_entry(&self, _id: i64) -> pagevault::Result<()> {
            Err(ArchiveError::Database(rusqlite::Error::InvalidQuery))
        }
        fn add_tag(&self, _entry_id: i64, _name: &str) -> pagevault::Result<bool> {
            Err(ArchiveError::Database(rusqlite::Error::InvalidQuery))
        }
        fn list_tags(&self, _entry_id: i64) -> pagevault::Result<Vec<TagRecord>> {
            Ok(Vec::new())
        }
        fn list_all_tags(&self) -> pagevault::Result<Vec<TagRecord>> {
            Ok(Vec::new())
        }
        fn add_note(&self, _entry_id: i64, _text: &str) -> pagevault::Result<i64> {
            Err(ArchiveError::Database(rusqlite::Error::InvalidQuery))
        }
        fn list_notes(&self, _entry_id: i64) -> pagevault::Result<Vec<NoteRecord>> {
            Ok(Vec::new())
        }
    }

    let server = MockServer::start().await;
    mount_page(&server, "<html><head><title>Orphan</title></head></html>").await;

    let base = tempfile::tempdir().unwrap();
    let archiver = Archiver::new(test_config(base.path()), ClosedCatalog).unwrap();

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    let err = archiver.capture(&request, None).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Database(_)));

    // The written bundle is rolled back along with the failed registration
    assert!(snapshot_dirs(base.path()).is_empty());
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let good_a = MockServer::start().await;
    mount_page(&good_a, "<html><head><title>A</title></head></html>").await;
    let bad = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bad)
        .await;
    let good_b = MockServer::start().await;
    mount_page(&good_b, "<html><head><title>B</title></head></html>").await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let requests = vec![
        CaptureRequest::new(format!("{}/", good_a.uri())),
        CaptureRequest::new(format!("{}/", bad.uri())),
        CaptureRequest::new(format!("{}/", good_b.uri())),
    ];
    let report = archiver.batch(&requests).await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].url, format!("{}/", bad.uri()));

    let titles: Vec<&str> = report.succeeded.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B"]);
}

#[tokio::test]
async fn test_many_resources_with_narrow_pool_all_arrive() {
    let server = MockServer::start().await;

    let mut body = String::from("<html><head><title>Gallery</title></head><body>");
    for i in 0..24 {
        body.push_str(&format!(r#"<img src="/img{}.png">"#, i));
    }
    body.push_str("</body></html>");
    mount_page(&server, &body).await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 8])
                .insert_header("content-type", "image/png"),
        )
        .mount(&server)
        .await;

    let base = tempfile::tempdir().unwrap();
    let mut config = test_config(base.path());
    config.archive.max_concurrent_downloads = 4;
    let archiver = Archiver::new(config, SqliteCatalog::new_in_memory().unwrap()).unwrap();

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    let metadata = archiver.capture(&request, None).await.unwrap().metadata;

    let dir = Path::new(&metadata.directory);
    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    for i in 0..24 {
        assert!(dir.join(format!("assets/images/img{}.png", i)).exists());
        assert!(html.contains(&format!(r#"src="assets/images/img{}.png""#, i)));
    }
}

#[tokio::test]
async fn test_sanitized_capture_drops_scripts() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        r#"<html><head><title>Clean</title></head><body>
           <script>alert(1)</script>
           <button onclick="x()">Go</button>
           <p>content</p>
           </body></html>"#,
    )
    .await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let mut request = CaptureRequest::new(format!("{}/", server.uri()));
    request.sanitize = Some(true);
    let metadata = archiver.capture(&request, None).await.unwrap().metadata;

    let html =
        std::fs::read_to_string(Path::new(&metadata.directory).join("index.html")).unwrap();
    assert!(!html.contains("<script"));
    assert!(!html.contains("onclick"));
    assert!(html.contains("<p>content</p>"));
}

#[tokio::test]
async fn test_fork_inherits_tags_and_parent() {
    let server = MockServer::start().await;
    mount_page(&server, "<html><head><title>Origin</title></head></html>").await;

    let base = tempfile::tempdir().unwrap();
    let archiver = test_archiver(base.path());

    let request = CaptureRequest::new(format!("{}/", server.uri()));
    let original = archiver.capture(&request, None).await.unwrap().metadata;

    let entry = archiver
        .catalog()
        .find_by_directory(&original.directory)
        .unwrap()
        .unwrap();
    archiver.catalog().add_tag(entry.id, "news").unwrap();
    archiver.catalog().add_tag(entry.id, "tech").unwrap();

    // Directory names are second-precision; make the fork distinguishable
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let forked = archiver.fork(Path::new(&original.directory), None).unwrap();
    assert_ne!(forked.directory, original.directory);
    assert_eq!(forked.is_edited, Some(true));
    assert_eq!(forked.title, "Origin (edited)");

    let forked_entry = archiver
        .catalog()
        .find_by_directory(&forked.directory)
        .unwrap()
        .unwrap();
    assert_eq!(forked_entry.parent_id, Some(entry.id));

    let tags: Vec<String> = archiver
        .catalog()
        .list_tags(forked_entry.id)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tags, vec!["news", "tech"]);
}
