//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{Category, RenderMode, UrlStatus};
use crate::storage::{
    ClaimedUrl, LinkRecord, NewSnapshot, RunRecord, SnapshotRecord, StagedLink, UrlRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("URL not found: {0}")]
    UrlNotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// One value of an implementing type is owned by exactly one worker. Methods
/// that coordinate between workers (`claim_next`, `register_discovered`,
/// `reseed`) must be safe when other handles to the same store call them
/// concurrently.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a run record stamped with the current time
    fn start_run(&mut self, mode: RenderMode) -> StorageResult<i64>;

    /// Stamps the run's end time
    ///
    /// The stored end time is never earlier than the start time.
    fn end_run(&mut self, run_id: i64) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Frontier =====

    /// Resets a URL to pending and clears its last attempt, inserting it if
    /// it is not yet known
    ///
    /// # Returns
    ///
    /// The frontier ID of the URL
    fn reseed(&mut self, url: &str) -> StorageResult<i64>;

    /// Atomically claims the oldest pending URL
    ///
    /// The claimed row is classified against `base_authority`, moved to
    /// `in_progress` and stamped with the attempt time in the same
    /// transaction. No two concurrent callers ever receive the same row.
    ///
    /// # Returns
    ///
    /// * `Some(ClaimedUrl)` - The row now held by the caller
    /// * `None` - No pending row exists
    fn claim_next(&mut self, base_authority: &str) -> StorageResult<Option<ClaimedUrl>>;

    /// Returns the ID of a URL, inserting it as a classified pending row if
    /// it is not yet known
    ///
    /// Concurrent calls for the same URL resolve to the single row that won
    /// the insert.
    fn register_discovered(&mut self, url: &str, base_authority: &str) -> StorageResult<i64>;

    /// Gets a URL by ID
    fn get_url(&self, url_id: i64) -> StorageResult<UrlRecord>;

    /// Gets a URL by its exact address
    fn get_url_by_address(&self, url: &str) -> StorageResult<Option<UrlRecord>>;

    /// Gets every frontier row in insertion order
    fn list_urls(&self) -> StorageResult<Vec<UrlRecord>>;

    // ===== Snapshots and Links =====

    /// Commits a snapshot, its link edges and the URL's terminal status in a
    /// single transaction
    ///
    /// Nothing is written if any part fails.
    ///
    /// # Returns
    ///
    /// The ID of the new snapshot
    fn record_snapshot(
        &mut self,
        snapshot: &NewSnapshot,
        links: &[StagedLink],
        final_status: UrlStatus,
    ) -> StorageResult<i64>;

    /// Gets all snapshots of a URL, oldest first
    fn snapshots_for_url(&self, url_id: i64) -> StorageResult<Vec<SnapshotRecord>>;

    /// Gets the link edges owned by a snapshot
    fn links_for_snapshot(&self, snapshot_id: i64) -> StorageResult<Vec<LinkRecord>>;

    // ===== Statistics =====

    /// Counts frontier rows in a status
    fn count_urls_by_status(&self, status: UrlStatus) -> StorageResult<u64>;

    /// Counts frontier rows in a category
    fn count_urls_by_category(&self, category: Category) -> StorageResult<u64>;

    /// Counts snapshots written by a run
    fn count_snapshots(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts error snapshots written by a run
    fn count_error_snapshots(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts link edges owned by a run's snapshots
    fn count_links(&self, run_id: i64) -> StorageResult<u64>;
}
