//! Catalog database schema

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
-- Archived snapshots, one row per bundle directory
CREATE TABLE IF NOT EXISTS websites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    title TEXT,
    domain TEXT,
    timestamp TEXT,
    date_saved TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    directory TEXT UNIQUE,
    thumbnail TEXT,
    is_edited BOOLEAN DEFAULT 0,
    parent_id INTEGER,
    FOREIGN KEY (parent_id) REFERENCES websites (id)
);

-- Tag names, shared across entries
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE
);

-- Entry-to-tag relation
CREATE TABLE IF NOT EXISTS website_tags (
    website_id INTEGER,
    tag_id INTEGER,
    PRIMARY KEY (website_id, tag_id),
    FOREIGN KEY (website_id) REFERENCES websites (id),
    FOREIGN KEY (tag_id) REFERENCES tags (id)
);

-- Free-form notes attached to entries
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    website_id INTEGER,
    note TEXT,
    date_created TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (website_id) REFERENCES websites (id)
);
"#;

/// Initializes the catalog schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
