//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Snapgraph database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Frontier: every discovered URL and its crawl status
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    category TEXT CHECK (category IN ('internal', 'external')),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'done', 'error')),
    last_attempt TEXT
);

CREATE INDEX IF NOT EXISTS idx_urls_status ON urls(status, id);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL DEFAULT 'desktop' CHECK (mode IN ('desktop', 'mobile', 'bot')),
    start_time TEXT NOT NULL,
    end_time TEXT
);

-- One immutable row per fetch attempt
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_id INTEGER NOT NULL REFERENCES urls(id) ON DELETE CASCADE,
    run_id INTEGER NOT NULL REFERENCES crawl_runs(id) ON DELETE CASCADE,
    mode TEXT NOT NULL CHECK (mode IN ('desktop', 'mobile', 'bot')),
    status_code INTEGER,
    content_hash TEXT,
    content TEXT,
    error_message TEXT,
    ttfb_ms INTEGER,
    dom_content_loaded_ms INTEGER,
    load_event_end_ms INTEGER,
    timestamp TEXT NOT NULL,
    CHECK ((status_code IS NULL) <> (error_message IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_snapshots_url ON snapshots(url_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_run ON snapshots(run_id);

-- Outgoing edges discovered while producing a snapshot
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES urls(id) ON DELETE CASCADE,
    target_id INTEGER NOT NULL REFERENCES urls(id) ON DELETE CASCADE,
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_id);
CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_id);
CREATE INDEX IF NOT EXISTS idx_links_snapshot ON links(snapshot_id);
"#;

/// Drops every table, children first; the database file itself is kept
pub const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS links;
DROP TABLE IF EXISTS snapshots;
DROP TABLE IF EXISTS crawl_runs;
DROP TABLE IF EXISTS urls;
"#;

/// Initializes the database schema
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

/// Drops all crawler tables
pub fn drop_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(DROP_SQL)?;
    Ok(())
}
