//! Configuration module for Snapgraph
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key is optional; a missing file section falls back to the
//! built-in defaults.
//!
//! # Example
//!
//! ```no_run
//! use snapgraph::config::{load_config, resolve_config, Overrides};
//! use std::path::Path;
//!
//! let loaded = load_config(Path::new("snapgraph.toml")).unwrap();
//! let config = resolve_config(Some(loaded), Overrides::default()).unwrap();
//! println!("Crawling with {} workers", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrowserConfig, Config, CrawlerConfig, EngineKind, OutputConfig, Overrides};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_config};
pub use validation::validate;
