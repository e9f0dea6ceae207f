//! Crawler module: the crawl orchestration engine
//!
//! This module contains the core crawling logic, including:
//! - Link extraction and staging of link edges
//! - The per-URL fetch pipeline
//! - The worker loop that drains the frontier
//! - Run coordination across workers

mod blocking;
mod coordinator;
mod links;
mod pipeline;
mod worker;

pub use coordinator::{crawl_with, run_crawl, seed_authority, RunSummary};
pub use links::{extract_links, filter_targets, stage_links};
pub use pipeline::{content_fingerprint, process_claimed, PipelineContext};
pub use worker::{run_worker, WorkerReport};

use crate::config::Config;
use crate::SnapgraphError;

pub(crate) use blocking::run_blocking;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Launch the configured rendering engine
/// 2. Open a crawl run and reset the seed to pending
/// 3. Drain the frontier with the configured number of workers
/// 4. Close the run once every worker has finished
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `seed` - The URL to start from
///
/// # Returns
///
/// * `Ok(RunSummary)` - Crawl completed
/// * `Err(SnapgraphError)` - Crawl failed
pub async fn crawl(config: &Config, seed: &str) -> Result<RunSummary, SnapgraphError> {
    run_crawl(config, seed).await
}
