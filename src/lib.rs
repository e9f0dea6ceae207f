//! Snapgraph: a rendering site crawler
//!
//! This crate crawls a site from a seed URL, fully rendering pages that share
//! the seed's authority and only checking the HTTP status of everything else.
//! Every fetch attempt is recorded as an immutable snapshot, together with the
//! link edges discovered while producing it.

pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Snapgraph operations
#[derive(Debug, Error)]
pub enum SnapgraphError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
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

/// Result type alias for Snapgraph operations
pub type Result<T> = std::result::Result<T, SnapgraphError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{Category, RenderMode, UrlStatus};
pub use url::{classify, extract_authority};
