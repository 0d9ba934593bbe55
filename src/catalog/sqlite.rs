//! SQLite catalog implementation

use crate::catalog::schema::initialize_schema;
use crate::catalog::{Catalog, CatalogEntry, ListFilter, NoteRecord, TagRecord};
use crate::snapshot::SnapshotMetadata;
use crate::{ArchiveError, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

/// SQLite-backed catalog
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Opens (or creates) the catalog database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCatalog)` - Successfully opened/created database
    /// * `Err(ArchiveError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory catalog (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn tag_id(&self, name: &str) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.conn
            .execute("INSERT INTO tags (name) VALUES (?1)", [name])?;
        Ok(self.conn.last_insert_rowid())
    }
}

const ENTRY_COLUMNS: &str =
    "id, url, title, domain, timestamp, date_saved, directory, thumbnail, is_edited, parent_id";

fn map_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        domain: row.get(3)?,
        timestamp: row.get(4)?,
        date_saved: row.get(5)?,
        directory: row.get(6)?,
        thumbnail: row.get(7)?,
        is_edited: row.get(8)?,
        parent_id: row.get(9)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl Catalog for SqliteCatalog {
    fn add_entry(&self, metadata: &SnapshotMetadata) -> Result<Option<i64>> {
        let result = self.conn.execute(
            "INSERT INTO websites
             (url, title, domain, timestamp, date_saved, directory, thumbnail, is_edited, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                metadata.url,
                metadata.title,
                metadata.domain,
                metadata.timestamp,
                metadata.date_saved,
                metadata.directory,
                metadata.thumbnail,
                metadata.is_edited.unwrap_or(false),
                metadata.parent_id,
            ],
        );

        match result {
            Ok(_) => Ok(Some(self.conn.last_insert_rowid())),
            // Directory already catalogued: a skip signal, not an error
            Err(e) if is_constraint_violation(&e) => Ok(None),
            Err(e) => Err(ArchiveError::Database(e)),
        }
    }

    fn update_title(&self, id: i64, title: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE websites SET title = ?1 WHERE id = ?2",
            params![title, id],
        )?;
        if changed == 0 {
            return Err(ArchiveError::EntryNotFound(id.to_string()));
        }
        Ok(())
    }

    fn find_by_directory(&self, directory: &str) -> Result<Option<CatalogEntry>> {
        let query = format!("SELECT {} FROM websites WHERE directory = ?1", ENTRY_COLUMNS);
        let entry = self
            .conn
            .query_row(&query, [directory], map_entry)
            .optional()?;
        Ok(entry)
    }

    fn list_entries(&self, filter: &ListFilter) -> Result<Vec<CatalogEntry>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        let base = if filter.tag.is_some() {
            clauses.push("t.name = ?");
            "SELECT w.id, w.url, w.title, w.domain, w.timestamp, w.date_saved,
                    w.directory, w.thumbnail, w.is_edited, w.parent_id
             FROM websites w
             JOIN website_tags wt ON w.id = wt.website_id
             JOIN tags t ON wt.tag_id = t.id"
                .to_string()
        } else {
            format!("SELECT {} FROM websites", ENTRY_COLUMNS)
        };

        if filter.search.is_some() {
            clauses.push("(title LIKE ? OR url LIKE ? OR domain LIKE ?)");
        }

        // Bind order must match clause order: tag first, then search
        if let Some(tag) = &filter.tag {
            args.push(tag.clone());
        }
        if let Some(term) = &filter.search {
            let pattern = format!("%{}%", term);
            args.push(pattern.clone());
            args.push(pattern.clone());
            args.push(pattern);
        }

        let mut query = base;
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY date_saved DESC");

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), map_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn delete_entry(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM website_tags WHERE website_id = ?1", [id])?;
        self.conn
            .execute("DELETE FROM notes WHERE website_id = ?1", [id])?;
        self.conn.execute("DELETE FROM websites WHERE id = ?1", [id])?;
        Ok(())
    }

    fn add_tag(&self, entry_id: i64, name: &str) -> Result<bool> {
        let tag_id = self.tag_id(name)?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO website_tags (website_id, tag_id) VALUES (?1, ?2)",
            params![entry_id, tag_id],
        )?;
        Ok(changed > 0)
    }

    fn list_tags(&self, entry_id: i64) -> Result<Vec<TagRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name
             FROM tags t
             JOIN website_tags wt ON t.id = wt.tag_id
             WHERE wt.website_id = ?1
             ORDER BY t.name",
        )?;
        let rows = stmt.query_map([entry_id], |row| {
            Ok(TagRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                count: 0,
            })
        })?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    fn list_all_tags(&self) -> Result<Vec<TagRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, COUNT(wt.website_id) AS count
             FROM tags t
             LEFT JOIN website_tags wt ON t.id = wt.tag_id
             GROUP BY t.id
             ORDER BY count DESC, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TagRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                count: row.get(2)?,
            })
        })?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    fn add_note(&self, entry_id: i64, text: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO notes (website_id, note) VALUES (?1, ?2)",
            params![entry_id, text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_notes(&self, entry_id: i64) -> Result<Vec<NoteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, note, date_created
             FROM notes
             WHERE website_id = ?1
             ORDER BY date_created DESC, id DESC",
        )?;
        let rows = stmt.query_map([entry_id], |row| {
            Ok(NoteRecord {
                id: row.get(0)?,
                text: row.get(1)?,
                date_created: row.get(2)?,
            })
        })?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata(directory: &str) -> SnapshotMetadata {
        SnapshotMetadata {
            url: "https://example.com/page".to_string(),
            title: "Example Page".to_string(),
            domain: "example.com".to_string(),
            timestamp: "20240101_120000".to_string(),
            date_saved: "2024-01-01 12:00:00".to_string(),
            thumbnail: format!("{}/thumbnail.png", directory),
            directory: directory.to_string(),
            engine_used: "direct".to_string(),
            is_edited: None,
            original_directory: None,
            parent_id: None,
        }
    }

    #[test]
    fn test_add_and_find_entry() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let id = catalog
            .add_entry(&sample_metadata("saved/example_com_20240101_120000"))
            .unwrap()
            .unwrap();

        let entry = catalog
            .find_by_directory("saved/example_com_20240101_120000")
            .unwrap()
            .unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.title, "Example Page");
        assert!(!entry.is_edited);
    }

    #[test]
    fn test_duplicate_directory_returns_none() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let metadata = sample_metadata("saved/example_com_20240101_120000");

        assert!(catalog.add_entry(&metadata).unwrap().is_some());
        assert!(catalog.add_entry(&metadata).unwrap().is_none());
    }

    #[test]
    fn test_update_title() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let id = catalog
            .add_entry(&sample_metadata("saved/a"))
            .unwrap()
            .unwrap();

        catalog.update_title(id, "Renamed").unwrap();
        let entry = catalog.find_by_directory("saved/a").unwrap().unwrap();
        assert_eq!(entry.title, "Renamed");
    }

    #[test]
    fn test_update_missing_entry_fails() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let err = catalog.update_title(999, "x").unwrap_err();
        assert!(matches!(err, ArchiveError::EntryNotFound(_)));
    }

    #[test]
    fn test_list_entries_with_search() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let mut a = sample_metadata("saved/a");
        a.title = "Rust news".to_string();
        let mut b = sample_metadata("saved/b");
        b.title = "Cooking blog".to_string();
        catalog.add_entry(&a).unwrap();
        catalog.add_entry(&b).unwrap();

        let filter = ListFilter {
            search: Some("rust".to_string()),
            tag: None,
        };
        let entries = catalog.list_entries(&filter).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Rust news");
    }

    #[test]
    fn test_list_entries_with_tag_filter() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let a = catalog
            .add_entry(&sample_metadata("saved/a"))
            .unwrap()
            .unwrap();
        catalog.add_entry(&sample_metadata("saved/b")).unwrap();
        catalog.add_tag(a, "news").unwrap();

        let filter = ListFilter {
            search: None,
            tag: Some("news".to_string()),
        };
        let entries = catalog.list_entries(&filter).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, a);
    }

    #[test]
    fn test_tags_dedupe_and_count() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let a = catalog
            .add_entry(&sample_metadata("saved/a"))
            .unwrap()
            .unwrap();
        let b = catalog
            .add_entry(&sample_metadata("saved/b"))
            .unwrap()
            .unwrap();

        assert!(catalog.add_tag(a, "tech").unwrap());
        assert!(!catalog.add_tag(a, "tech").unwrap());
        assert!(catalog.add_tag(b, "tech").unwrap());
        assert!(catalog.add_tag(a, "news").unwrap());

        let tags = catalog.list_tags(a).unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["news", "tech"]);

        let all = catalog.list_all_tags().unwrap();
        assert_eq!(all[0].name, "tech");
        assert_eq!(all[0].count, 2);
    }

    #[test]
    fn test_notes_round_trip() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let a = catalog
            .add_entry(&sample_metadata("saved/a"))
            .unwrap()
            .unwrap();

        catalog.add_note(a, "first note").unwrap();
        catalog.add_note(a, "second note").unwrap();

        let notes = catalog.list_notes(a).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].text, "second note");
    }

    #[test]
    fn test_delete_entry_cascades() {
        let catalog = SqliteCatalog::new_in_memory().unwrap();
        let a = catalog
            .add_entry(&sample_metadata("saved/a"))
            .unwrap()
            .unwrap();
        catalog.add_tag(a, "tech").unwrap();
        catalog.add_note(a, "note").unwrap();

        catalog.delete_entry(a).unwrap();
        assert!(catalog.find_by_directory("saved/a").unwrap().is_none());
        assert!(catalog.list_notes(a).unwrap().is_empty());
        assert!(catalog.list_tags(a).unwrap().is_empty());
    }
}
