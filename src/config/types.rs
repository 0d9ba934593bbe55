use crate::fetch::Engine;
use serde::Deserialize;

/// Main configuration structure for pagevault
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub resources: ResourceToggles,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Capture behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Directory that snapshot bundles are created under
    #[serde(rename = "base-dir")]
    pub base_dir: String,

    /// Per-request network timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Worker pool width for resource downloads
    #[serde(rename = "max-concurrent-downloads")]
    pub max_concurrent_downloads: usize,

    /// Whether to honor robots.txt before fetching
    #[serde(rename = "respect-robots-txt")]
    pub respect_robots_txt: bool,

    /// Strip scripts, inline handlers, and embedded frames from captures
    #[serde(rename = "sanitize-html")]
    pub sanitize_html: bool,

    /// Default fetch engine when a request does not name one
    #[serde(rename = "preferred-engine")]
    pub preferred_engine: Engine,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: "saved_websites".to_string(),
            timeout_secs: 30,
            max_concurrent_downloads: 8,
            respect_robots_txt: true,
            sanitize_html: false,
            preferred_engine: Engine::Direct,
        }
    }
}

/// Per-kind switches for which resource classes get localized
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResourceToggles {
    #[serde(rename = "download-css")]
    pub css: bool,
    #[serde(rename = "download-js")]
    pub js: bool,
    #[serde(rename = "download-images")]
    pub images: bool,
    #[serde(rename = "download-fonts")]
    pub fonts: bool,
}

impl Default for ResourceToggles {
    fn default() -> Self {
        Self {
            css: true,
            js: true,
            images: true,
            fonts: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the archiver
    pub name: String,

    /// Version string sent with requests
    pub version: String,

    /// URL with information about the archiver
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "Pagevault".to_string(),
            version: "2.0".to_string(),
            contact_url: "https://example.com/pagevault".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the full user agent string: Name/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        format!("{}/{} (+{})", self.name, self.version, self.contact_url)
    }
}

/// Catalog database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Path to the SQLite catalog file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: "websites.db".to_string(),
        }
    }
}
