//! Pagevault: a self-contained web page archiver
//!
//! This crate captures a live web page into a replayable local snapshot:
//! it fetches the page (directly or through a headless browser), downloads
//! every referenced static resource, rewrites references to point at the
//! local copies, and persists the result as a versioned directory bundle
//! plus a metadata record in a SQLite catalog.

pub mod capture;
pub mod catalog;
pub mod config;
pub mod download;
pub mod fetch;
pub mod resolve;
pub mod robots;
pub mod snapshot;

use thiserror::Error;

/// Main error type for pagevault operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("robots.txt disallows fetching {url}")]
    PolicyDenied { url: String },

    #[error("Fetch backend error for {url}: {message}")]
    Backend { url: String, message: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Snapshot directory already catalogued: {directory}")]
    DuplicateDirectory { directory: String },

    #[error("No metadata record found in {directory}")]
    MissingMetadata { directory: String },

    #[error("Catalog entry not found: {0}")]
    EntryNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL has no host, cannot derive an origin")]
    MissingOrigin,
}

/// Result type alias for pagevault operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use capture::{Archiver, BatchReport, CaptureReport, CaptureRequest, ProgressUpdate, ResourceError};
pub use config::Config;
pub use fetch::Engine;
pub use snapshot::SnapshotMetadata;
