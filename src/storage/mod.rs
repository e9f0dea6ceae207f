//! Storage module for persisting crawl data
//!
//! This module owns everything that crosses a worker boundary:
//! - SQLite schema provisioning and teardown
//! - The frontier of URLs and the atomic claim protocol
//! - Crawl run lifecycle records
//! - Snapshots and the link edges committed together with them
//!
//! Workers never share a connection. Each opens its own handle to the same
//! database file, and the claim transaction is the only point where they
//! coordinate.

mod columns;
mod schema;
mod sqlite;
mod traits;

pub use schema::{drop_schema, initialize_schema};
pub use sqlite::{now_timestamp, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::render::NavigationTimings;
use crate::state::{Category, RenderMode, UrlStatus};

/// A frontier row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    /// Unset until the URL is first classified
    pub category: Option<Category>,
    pub status: UrlStatus,
    pub last_attempt: Option<String>,
}

/// A frontier row exclusively held by one worker
///
/// Produced only by [`Storage::claim_next`]; the category is the one computed
/// at claim time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedUrl {
    pub id: i64,
    pub url: String,
    pub category: Category,
    pub last_attempt: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: RenderMode,
    pub start_time: String,
    pub end_time: Option<String>,
}

impl RunRecord {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Wall-clock duration of a finished run
    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = chrono::DateTime::parse_from_rfc3339(&self.start_time).ok()?;
        let end = chrono::DateTime::parse_from_rfc3339(self.end_time.as_deref()?).ok()?;
        Some(end - start)
    }
}

/// What a single fetch attempt produced
///
/// Each variant carries exactly the fields that may be populated for it, so
/// a snapshot can never hold both a status code and an error message.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// Status-only check of an external URL
    Status { status_code: u16 },

    /// Full render of an internal page
    Rendered {
        status_code: u16,
        content: String,
        content_hash: String,
        timings: NavigationTimings,
    },

    /// The attempt failed; nothing but the failure text is kept
    Failed { error_message: String },
}

impl SnapshotOutcome {
    pub fn failed(error: impl ToString) -> Self {
        Self::Failed {
            error_message: error.to_string(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code } | Self::Rendered { status_code, .. } => Some(*status_code),
            Self::Failed { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Rendered { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn content_hash(&self) -> Option<&str> {
        match self {
            Self::Rendered { content_hash, .. } => Some(content_hash),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { error_message } => Some(error_message),
            _ => None,
        }
    }

    pub fn timings(&self) -> NavigationTimings {
        match self {
            Self::Rendered { timings, .. } => *timings,
            _ => NavigationTimings::default(),
        }
    }
}

/// A snapshot ready to be committed
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub url_id: i64,
    pub run_id: i64,
    pub mode: RenderMode,
    pub outcome: SnapshotOutcome,
}

/// A link edge held in memory until its snapshot is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StagedLink {
    pub source_id: i64,
    pub target_id: i64,
}

/// A persisted snapshot
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub id: i64,
    pub url_id: i64,
    pub run_id: i64,
    pub mode: RenderMode,
    pub status_code: Option<u16>,
    pub content_hash: Option<String>,
    pub content: Option<String>,
    pub error_message: Option<String>,
    pub ttfb_ms: Option<i64>,
    pub dom_content_loaded_ms: Option<i64>,
    pub load_event_end_ms: Option<i64>,
    pub timestamp: String,
}

impl SnapshotRecord {
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

/// A persisted link edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub snapshot_id: i64,
}
