//! Worker loop
//!
//! A worker claims one URL at a time and runs the pipeline on it until the
//! frontier has nothing pending. Workers never talk to each other; the claim
//! is the only point where they meet.

use crate::crawler::pipeline::{process_claimed, PipelineContext};
use crate::crawler::run_blocking;
use crate::render::Renderer;
use crate::state::UrlStatus;
use crate::storage::{Storage, StorageResult};
use std::sync::Arc;

/// What one worker did before it found the frontier empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// URLs claimed
    pub claimed: u64,
    /// URLs left in `error`
    pub errors: u64,
    /// URLs whose snapshot could not be written at all
    pub unrecorded: u64,
}

impl WorkerReport {
    pub fn merge(&mut self, other: WorkerReport) {
        self.claimed += other.claimed;
        self.errors += other.errors;
        self.unrecorded += other.unrecorded;
    }
}

/// Drains the frontier
///
/// # Arguments
///
/// * `index` - Worker number, for logging
/// * `renderer` - Engine shared by all workers
/// * `storage` - This worker's own storage handle
/// * `ctx` - Run-wide pipeline settings
///
/// # Returns
///
/// * `Ok(WorkerReport)` - The frontier was observed empty
/// * `Err(StorageError)` - Claiming failed; the worker stops
pub async fn run_worker<R, S>(
    index: usize,
    renderer: Arc<R>,
    mut storage: S,
    ctx: Arc<PipelineContext>,
) -> StorageResult<WorkerReport>
where
    R: Renderer + ?Sized,
    S: Storage + Send,
{
    let mut report = WorkerReport::default();

    while let Some(claimed) = run_blocking(|| storage.claim_next(&ctx.base_authority))? {
        report.claimed += 1;
        tracing::info!(
            worker = index,
            "Crawling: {} ({})",
            claimed.url,
            claimed.category
        );

        match process_claimed(renderer.as_ref(), &mut storage, &ctx, &claimed).await {
            Ok(UrlStatus::Error) => report.errors += 1,
            Ok(_) => {}
            Err(e) => {
                // The row is left in_progress
                report.unrecorded += 1;
                tracing::error!(worker = index, "Failed to record {}: {}", claimed.url, e);
            }
        }
    }

    tracing::debug!(worker = index, "Frontier empty after {} URLs", report.claimed);
    Ok(report)
}
