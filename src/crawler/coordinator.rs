//! Crawl run coordination
//!
//! The coordinator brackets a crawl:
//! - records the run and resets the seed to pending
//! - starts the configured number of workers, each on its own storage handle
//! - waits for every worker to find the frontier empty
//! - shuts the rendering engine down and stamps the run's end time

use crate::config::{Config, EngineKind};
use crate::crawler::pipeline::PipelineContext;
use crate::crawler::worker::{run_worker, WorkerReport};
use crate::render::{ChromiumRenderer, HttpRenderer, Renderer};
use crate::storage::{SqliteStorage, Storage};
use crate::url::extract_authority;
use crate::{Result, SnapgraphError};
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Outcome of a finished crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: i64,
    pub workers: usize,
    pub report: WorkerReport,
}

/// Checks that the seed is an absolute http(s) URL and returns its authority
///
/// # Example
///
/// ```
/// use snapgraph::crawler::seed_authority;
///
/// assert_eq!(seed_authority("http://A.test:8080/").unwrap(), "a.test:8080");
/// assert!(seed_authority("ftp://a.test/").is_err());
/// ```
pub fn seed_authority(seed: &str) -> Result<String> {
    let invalid = |reason: &str| SnapgraphError::InvalidSeed {
        url: seed.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(seed)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https seeds can be crawled"));
    }
    extract_authority(&url).ok_or_else(|| invalid("URL has no host"))
}

/// Runs a crawl with the engine selected in the configuration
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `seed` - The URL the crawl starts from; its authority defines "internal"
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every worker finished and the run was closed
/// * `Err(SnapgraphError)` - The run could not be started or closed, or a
///   worker task panicked (the run is still closed first)
pub async fn run_crawl(config: &Config, seed: &str) -> Result<RunSummary> {
    // Fail on a bad seed before a browser is launched
    seed_authority(seed)?;

    match config.browser.engine {
        EngineKind::Chromium => {
            let renderer = ChromiumRenderer::launch(&config.browser, config.crawler.mode).await?;
            crawl_with(Arc::new(renderer), config, seed).await
        }
        EngineKind::Http => {
            let renderer = HttpRenderer::new(config.crawler.mode)?;
            crawl_with(Arc::new(renderer), config, seed).await
        }
    }
}

/// Runs a crawl against an already constructed engine
///
/// The engine is shut down before this returns, whether the run succeeded
/// or not.
pub async fn crawl_with<R>(
    renderer: Arc<R>,
    config: &Config,
    seed: &str,
) -> Result<RunSummary>
where
    R: Renderer + 'static,
{
    let result = drive_run(Arc::clone(&renderer), config, seed).await;

    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("Failed to shut down renderer: {}", e);
    }

    result
}

async fn drive_run<R>(
    renderer: Arc<R>,
    config: &Config,
    seed: &str,
) -> Result<RunSummary>
where
    R: Renderer + 'static,
{
    let base_authority = seed_authority(seed)?;
    let database_path = Path::new(&config.output.database_path);
    let mode = config.crawler.mode;

    let mut storage = SqliteStorage::new(database_path)?;
    let run_id = storage.start_run(mode)?;
    tracing::info!("Starting crawl run {} (mode={}) from {}", run_id, mode, seed);

    storage.reseed(seed)?;

    let workers = config.crawler.concurrency as usize;
    let ctx = Arc::new(PipelineContext::new(config, run_id, base_authority));

    // Open every handle up front so a bad database fails before any work starts
    let handles = (0..workers)
        .map(|_| SqliteStorage::new(database_path))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let tasks: Vec<_> = handles
        .into_iter()
        .enumerate()
        .map(|(index, worker_storage)| {
            tokio::spawn(run_worker(
                index,
                Arc::clone(&renderer),
                worker_storage,
                Arc::clone(&ctx),
            ))
        })
        .collect();

    let mut report = WorkerReport::default();
    let mut failed_task = None;
    for (index, task) in tasks.into_iter().enumerate() {
        match task.await {
            Ok(Ok(worker_report)) => report.merge(worker_report),
            Ok(Err(e)) => tracing::error!(worker = index, "Worker stopped: {}", e),
            Err(e) => {
                tracing::error!(worker = index, "Worker task failed: {}", e);
                if failed_task.is_none() {
                    failed_task = Some(e);
                }
            }
        }
    }

    storage.end_run(run_id)?;
    if let Some(e) = failed_task {
        return Err(SnapgraphError::Join(e));
    }
    tracing::info!(
        "Finished crawl run {}: {} URLs, {} errors",
        run_id,
        report.claimed,
        report.errors
    );

    Ok(RunSummary {
        run_id,
        workers,
        report,
    })
}
