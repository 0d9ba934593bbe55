//! SQLite catalog of archived snapshots
//!
//! The catalog mirrors each bundle's metadata record into relational rows
//! so the collection can be searched, tagged, and annotated. The bundle's
//! own `metadata.json` stays the canonical record; the catalog can be
//! rebuilt from the bundles. The `directory` column is UNIQUE, so a
//! duplicate insert signals "already archived" rather than an error.

mod schema;
mod sqlite;

pub use sqlite::SqliteCatalog;

use crate::snapshot::SnapshotMetadata;
use crate::Result;

/// One catalogued snapshot
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub domain: String,
    pub timestamp: String,
    pub date_saved: String,
    pub directory: String,
    pub thumbnail: String,
    pub is_edited: bool,
    pub parent_id: Option<i64>,
}

/// A tag with its usage count across the collection
#[derive(Debug, Clone)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub count: i64,
}

/// A free-form note attached to an entry
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: i64,
    pub text: String,
    pub date_created: String,
}

/// Filter for listing entries
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Substring matched against title, url, and domain
    pub search: Option<String>,
    /// Restrict to entries carrying this tag
    pub tag: Option<String>,
}

/// Narrow contract the capture engine consumes
pub trait Catalog {
    /// Registers a snapshot; `None` means the directory is already catalogued
    fn add_entry(&self, metadata: &SnapshotMetadata) -> Result<Option<i64>>;

    /// Updates an entry's title
    fn update_title(&self, id: i64, title: &str) -> Result<()>;

    /// Looks an entry up by its bundle directory path
    fn find_by_directory(&self, directory: &str) -> Result<Option<CatalogEntry>>;

    /// Lists entries, newest first, optionally filtered
    fn list_entries(&self, filter: &ListFilter) -> Result<Vec<CatalogEntry>>;

    /// Removes an entry with its tag relations and notes
    fn delete_entry(&self, id: i64) -> Result<()>;

    /// Attaches a tag, creating it if new; false if already attached
    fn add_tag(&self, entry_id: i64, name: &str) -> Result<bool>;

    /// Tags attached to one entry, alphabetical
    fn list_tags(&self, entry_id: i64) -> Result<Vec<TagRecord>>;

    /// Every tag in the collection with usage counts, most used first
    fn list_all_tags(&self) -> Result<Vec<TagRecord>>;

    /// Attaches a note, returning its id
    fn add_note(&self, entry_id: i64, text: &str) -> Result<i64>;

    /// Notes attached to one entry, newest first
    fn list_notes(&self, entry_id: i64) -> Result<Vec<NoteRecord>>;
}
