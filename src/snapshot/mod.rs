//! Snapshot persistence
//!
//! Owns the on-disk layout of one capture: the versioned bundle directory,
//! its `assets/` subtree, the canonical `metadata.json` record, and the
//! thumbnail placeholder. The directory tree is created before any fetch
//! starts and removed wholesale if the capture fails, so a bundle on disk
//! is always either complete or absent.

use crate::{ArchiveError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Subdirectories created under `assets/` for each bundle
const ASSET_SUBDIRS: &[&str] = &["images", "css", "js", "fonts"];

/// Placeholder thumbnail written with every bundle, a 1x1 transparent PNG
const THUMBNAIL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0xf8, 0x5f, 0x0f, 0x00, 0x02, 0x87, 0x01, 0x80, 0xeb, 0x47, 0xba, 0x92, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Canonical per-snapshot record, serialized as `metadata.json`
///
/// The catalog mirrors these fields into its own rows; the file in the
/// bundle remains the authoritative copy and is what import/fork read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub url: String,
    pub title: String,
    pub domain: String,
    /// Capture timestamp, second precision, also the directory suffix
    pub timestamp: String,
    /// Human-readable save time
    pub date_saved: String,
    pub thumbnail: String,
    pub directory: String,
    pub engine_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_edited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

impl SnapshotMetadata {
    /// Reads the metadata record out of a bundle directory
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("metadata.json");
        if !path.exists() {
            return Err(ArchiveError::MissingMetadata {
                directory: dir.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the record into a bundle directory as `metadata.json`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join("metadata.json"), text)?;
        Ok(())
    }
}

/// Bundle directory name for a given host and capture timestamp
///
/// `<host-with-dots-as-underscores>_<YYYYmmdd_HHMMSS>`. Second precision
/// keeps same-origin recaptures distinguishable and lexically sortable.
pub fn bundle_dir_name(host: &str, timestamp: &str) -> String {
    format!("{}_{}", host.replace(['.', ':'], "_"), timestamp)
}

/// Second-precision capture timestamp matching the directory suffix
pub fn capture_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Human-readable save time for metadata records
pub fn save_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Handle on a bundle directory between `begin` and `commit`/`abort`
#[derive(Debug)]
pub struct SnapshotDir {
    path: PathBuf,
}

impl SnapshotDir {
    /// Creates the bundle directory and its full `assets/` subtree
    ///
    /// Runs before the first fetch so downloads can stream straight into
    /// their final locations.
    pub fn begin(base: &Path, dir_name: &str) -> Result<Self> {
        let path = base.join(dir_name);
        for sub in ASSET_SUBDIRS {
            std::fs::create_dir_all(path.join("assets").join(sub))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the final markup, metadata record, and thumbnail placeholder
    pub fn commit(&self, final_markup: &str, metadata: &SnapshotMetadata) -> Result<()> {
        std::fs::write(self.path.join("index.html"), final_markup.as_bytes())?;
        metadata.save(&self.path)?;
        std::fs::write(self.path.join("thumbnail.png"), THUMBNAIL_PNG)?;
        Ok(())
    }

    /// Removes the entire partially-built tree
    ///
    /// Called on any failure after `begin`; partial bundles never survive.
    pub fn abort(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(
                "Failed to remove partial snapshot {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Clones an existing bundle into a new version
///
/// Copies the whole tree under a fresh directory name (same origin, new
/// timestamp), marks the copy as edited with a back-reference to its
/// source, and returns the new metadata. Tag inheritance is the caller's
/// job since the catalog owns tag relations.
pub fn fork(original_dir: &Path, new_title: Option<&str>) -> Result<SnapshotMetadata> {
    let original = SnapshotMetadata::load(original_dir)?;

    let timestamp = capture_timestamp();
    let new_dir_name = bundle_dir_name(&original.domain, &timestamp);
    let parent = original_dir.parent().unwrap_or_else(|| Path::new("."));
    let new_dir = parent.join(&new_dir_name);

    copy_tree(original_dir, &new_dir)?;

    let title = match new_title {
        Some(t) => t.to_string(),
        None => format!("{} (edited)", original.title),
    };

    // parent_id stays unset here: the fork's parent is the snapshot being
    // copied, and only the catalog knows that snapshot's identity. Carrying
    // the original's own parent_id forward would point at the grandparent.
    let metadata = SnapshotMetadata {
        title,
        timestamp,
        date_saved: save_timestamp(),
        thumbnail: new_dir.join("thumbnail.png").display().to_string(),
        directory: new_dir.display().to_string(),
        is_edited: Some(true),
        original_directory: Some(original_dir.display().to_string()),
        parent_id: None,
        ..original
    };
    metadata.save(&new_dir)?;

    Ok(metadata)
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
