//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//!
//! Every worker opens its own `SqliteStorage` on the same database file.
//! SQLite admits a single writer at a time, so the claim transaction, which
//! takes the write lock up front, is serialised across all handles while
//! readers keep working against the WAL. A contended writer waits out the
//! busy timeout instead of failing.

use crate::state::{Category, RenderMode, UrlStatus};
use crate::storage::schema::{drop_schema, initialize_schema};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    ClaimedUrl, LinkRecord, NewSnapshot, RunRecord, SnapshotRecord, StagedLink, UrlRecord,
};
use crate::url::classify;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for the lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const URL_COLUMNS: &str = "id, url, category, status, last_attempt";

const SNAPSHOT_COLUMNS: &str = "id, url_id, run_id, mode, status_code, content_hash, content, \
     error_message, ttfb_ms, dom_content_loaded_ms, load_event_end_ms, timestamp";

/// Current time as a fixed-width UTC RFC 3339 string
///
/// Fixed width means lexical order of stored timestamps is chronological.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and provisions the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Set before anything that may need the write lock
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Drops all crawler tables, leaving the database file in place
    pub fn drop_tables(&mut self) -> StorageResult<()> {
        drop_schema(&self.conn)?;
        Ok(())
    }

    fn count(&self, sql: &str, param: impl rusqlite::ToSql) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, params![param], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn url_from_row(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        category: row.get(2)?,
        status: row.get(3)?,
        last_attempt: row.get(4)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        id: row.get(0)?,
        url_id: row.get(1)?,
        run_id: row.get(2)?,
        mode: row.get(3)?,
        status_code: row.get(4)?,
        content_hash: row.get(5)?,
        content: row.get(6)?,
        error_message: row.get(7)?,
        ttfb_ms: row.get(8)?,
        dom_content_loaded_ms: row.get(9)?,
        load_event_end_ms: row.get(10)?,
        timestamp: row.get(11)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LinkRecord> {
    Ok(LinkRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        snapshot_id: row.get(3)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn start_run(&mut self, mode: RenderMode) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_runs (mode, start_time) VALUES (?1, ?2)",
            params![mode, now_timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn end_run(&mut self, run_id: i64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET end_time = MAX(?1, start_time) WHERE id = ?2",
            params![now_timestamp(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, mode, start_time, end_time FROM crawl_runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, mode, start_time, end_time FROM crawl_runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Frontier =====

    fn reseed(&mut self, url: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO urls (url, status) VALUES (?1, ?2)
             ON CONFLICT(url) DO UPDATE SET status = excluded.status, last_attempt = NULL",
            params![url, UrlStatus::Pending],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM urls WHERE url = ?1", params![url], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    fn claim_next(&mut self, base_authority: &str) -> StorageResult<Option<ClaimedUrl>> {
        // IMMEDIATE takes the write lock before the select, so the row read
        // here cannot be claimed by anyone else before this commit.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidate: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, url FROM urls WHERE status = ?1 ORDER BY id ASC LIMIT 1",
                params![UrlStatus::Pending],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, url)) = candidate else {
            tx.commit()?;
            return Ok(None);
        };

        let category = classify(&url, base_authority);
        let last_attempt = now_timestamp();
        tx.execute(
            "UPDATE urls SET status = ?1, category = ?2, last_attempt = ?3 WHERE id = ?4",
            params![UrlStatus::InProgress, category, last_attempt, id],
        )?;
        tx.commit()?;

        Ok(Some(ClaimedUrl {
            id,
            url,
            category,
            last_attempt,
        }))
    }

    fn register_discovered(&mut self, url: &str, base_authority: &str) -> StorageResult<i64> {
        let category = classify(url, base_authority);

        // The unique index decides the winner; losers fall through to the read
        self.conn.execute(
            "INSERT INTO urls (url, category, status) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO NOTHING",
            params![url, category, UrlStatus::Pending],
        )?;

        let id = self
            .conn
            .query_row("SELECT id FROM urls WHERE url = ?1", params![url], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    fn get_url(&self, url_id: i64) -> StorageResult<UrlRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM urls WHERE id = ?1", URL_COLUMNS),
                params![url_id],
                url_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::UrlNotFound(format!("URL ID {}", url_id)))
    }

    fn get_url_by_address(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM urls WHERE url = ?1", URL_COLUMNS),
                params![url],
                url_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn list_urls(&self) -> StorageResult<Vec<UrlRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM urls ORDER BY id ASC", URL_COLUMNS))?;
        let urls = stmt
            .query_map([], url_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    // ===== Snapshots and Links =====

    fn record_snapshot(
        &mut self,
        snapshot: &NewSnapshot,
        links: &[StagedLink],
        final_status: UrlStatus,
    ) -> StorageResult<i64> {
        if !final_status.is_terminal() {
            return Err(StorageError::InvalidRecord(format!(
                "snapshot cannot leave URL {} in status {}",
                snapshot.url_id, final_status
            )));
        }

        let outcome = &snapshot.outcome;
        let timings = outcome.timings();

        // Dropping the transaction without commit rolls everything back
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO snapshots (url_id, run_id, mode, status_code, content_hash, content,
             error_message, ttfb_ms, dom_content_loaded_ms, load_event_end_ms, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                snapshot.url_id,
                snapshot.run_id,
                snapshot.mode,
                outcome.status_code(),
                outcome.content_hash(),
                outcome.content(),
                outcome.error_message(),
                timings.ttfb_ms,
                timings.dom_content_loaded_ms,
                timings.load_event_end_ms,
                now_timestamp(),
            ],
        )?;
        let snapshot_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO links (source_id, target_id, snapshot_id) VALUES (?1, ?2, ?3)",
            )?;
            for link in links {
                stmt.execute(params![link.source_id, link.target_id, snapshot_id])?;
            }
        }

        tx.execute(
            "UPDATE urls SET status = ?1 WHERE id = ?2",
            params![final_status, snapshot.url_id],
        )?;

        tx.commit()?;
        Ok(snapshot_id)
    }

    fn snapshots_for_url(&self, url_id: i64) -> StorageResult<Vec<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE url_id = ?1 ORDER BY id ASC",
            SNAPSHOT_COLUMNS
        ))?;
        let snapshots = stmt
            .query_map(params![url_id], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn links_for_snapshot(&self, snapshot_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, target_id, snapshot_id FROM links
             WHERE snapshot_id = ?1 ORDER BY id ASC",
        )?;
        let links = stmt
            .query_map(params![snapshot_id], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    // ===== Statistics =====

    fn count_urls_by_status(&self, status: UrlStatus) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM urls WHERE status = ?1", status)
    }

    fn count_urls_by_category(&self, category: Category) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM urls WHERE category = ?1", category)
    }

    fn count_snapshots(&self, run_id: i64) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM snapshots WHERE run_id = ?1", run_id)
    }

    fn count_error_snapshots(&self, run_id: i64) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM snapshots WHERE run_id = ?1 AND error_message IS NOT NULL",
            run_id,
        )
    }

    fn count_links(&self, run_id: i64) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM links l JOIN snapshots s ON s.id = l.snapshot_id
             WHERE s.run_id = ?1",
            run_id,
        )
    }
}
