//! Output module for reporting on crawl runs
//!
//! This module handles:
//! - Loading per-run statistics from the store
//! - Printing them for the `stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, RunStatistics};
