//! Per-URL fetch pipeline
//!
//! A claimed URL goes down one of two paths:
//! - external URLs get a status-only request and always end `done`
//! - internal URLs are rendered, settled, measured and scanned for links,
//!   ending `done` on success and `error` on any failure
//!
//! Either way exactly one snapshot is written for the attempt. Failures are
//! contained here; the caller only sees storage errors raised while writing
//! the final snapshot.

use crate::config::Config;
use crate::crawler::links::{extract_links, stage_links};
use crate::crawler::run_blocking;
use crate::render::{settle, PageHandle, RenderError, Renderer, SettlePolicy};
use crate::state::{Category, RenderMode, UrlStatus};
use crate::storage::{
    ClaimedUrl, NewSnapshot, SnapshotOutcome, StagedLink, Storage, StorageResult,
};
use crate::SnapgraphError;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Run-wide settings shared by every worker
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub run_id: i64,
    pub mode: RenderMode,
    /// Authority of the seed URL; decides internal vs external
    pub base_authority: String,
    pub navigation_timeout: Duration,
    pub request_timeout: Duration,
    pub settle: SettlePolicy,
}

impl PipelineContext {
    pub fn new(config: &Config, run_id: i64, base_authority: String) -> Self {
        Self {
            run_id,
            mode: config.crawler.mode,
            base_authority,
            navigation_timeout: config.crawler.navigation_timeout(),
            request_timeout: config.crawler.request_timeout(),
            settle: SettlePolicy::from_config(&config.crawler),
        }
    }

    fn snapshot(&self, url_id: i64, outcome: SnapshotOutcome) -> NewSnapshot {
        NewSnapshot {
            url_id,
            run_id: self.run_id,
            mode: self.mode,
            outcome,
        }
    }
}

/// SHA-256 of the serialized document, hex encoded
pub fn content_fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Runs the pipeline for one claimed URL and records its snapshot
///
/// # Returns
///
/// * `Ok(UrlStatus)` - The terminal status the URL was left in
/// * `Err(StorageError)` - Even the final snapshot could not be written
pub async fn process_claimed<R, S>(
    renderer: &R,
    storage: &mut S,
    ctx: &PipelineContext,
    claimed: &ClaimedUrl,
) -> StorageResult<UrlStatus>
where
    R: Renderer + ?Sized,
    S: Storage + Send + ?Sized,
{
    match claimed.category {
        Category::External => check_external(renderer, storage, ctx, claimed).await,
        Category::Internal => render_internal(renderer, storage, ctx, claimed).await,
    }
}

async fn check_external<R, S>(
    renderer: &R,
    storage: &mut S,
    ctx: &PipelineContext,
    claimed: &ClaimedUrl,
) -> StorageResult<UrlStatus>
where
    R: Renderer + ?Sized,
    S: Storage + Send + ?Sized,
{
    let outcome = match renderer
        .request_status(&claimed.url, ctx.request_timeout)
        .await
    {
        Ok(status_code) => {
            tracing::info!("External status for {}: {}", claimed.url, status_code);
            SnapshotOutcome::Status { status_code }
        }
        Err(e) => {
            tracing::warn!("External check failed for {}: {}", claimed.url, e);
            SnapshotOutcome::failed(e)
        }
    };

    let snapshot = ctx.snapshot(claimed.id, outcome);
    run_blocking(|| storage.record_snapshot(&snapshot, &[], UrlStatus::Done))?;
    Ok(UrlStatus::Done)
}

async fn render_internal<R, S>(
    renderer: &R,
    storage: &mut S,
    ctx: &PipelineContext,
    claimed: &ClaimedUrl,
) -> StorageResult<UrlStatus>
where
    R: Renderer + ?Sized,
    S: Storage + Send + ?Sized,
{
    let rendered = match renderer.open_page().await {
        Ok(mut page) => {
            let result = render_page(&mut page, storage, ctx, claimed).await;
            if let Err(e) = page.close().await {
                tracing::warn!("Failed to release page for {}: {}", claimed.url, e);
            }
            result
        }
        Err(e) => Err(e.into()),
    };

    let failure = match rendered {
        Ok((outcome, links)) => {
            let snapshot = ctx.snapshot(claimed.id, outcome);
            match run_blocking(|| storage.record_snapshot(&snapshot, &links, UrlStatus::Done)) {
                Ok(_) => return Ok(UrlStatus::Done),
                Err(e) => SnapgraphError::from(e),
            }
        }
        Err(e) => e,
    };

    tracing::warn!("Error on {}: {}", claimed.url, failure);
    let snapshot = ctx.snapshot(claimed.id, SnapshotOutcome::failed(&failure));
    run_blocking(|| storage.record_snapshot(&snapshot, &[], UrlStatus::Error))?;
    Ok(UrlStatus::Error)
}

/// Everything the internal path does between navigation and commit
async fn render_page<P, S>(
    page: &mut P,
    storage: &mut S,
    ctx: &PipelineContext,
    claimed: &ClaimedUrl,
) -> Result<(SnapshotOutcome, Vec<StagedLink>), SnapgraphError>
where
    P: PageHandle + ?Sized,
    S: Storage + Send + ?Sized,
{
    let status_code = page
        .navigate(&claimed.url, ctx.navigation_timeout)
        .await?
        .ok_or_else(|| RenderError::NoResponse(claimed.url.clone()))?;

    if !settle(page, ctx.settle).await? {
        tracing::debug!("{} did not fully settle", claimed.url);
    }

    let timings = page.timings().await?;

    let targets = extract_links(page, &claimed.url).await?;
    let links =
        run_blocking(|| stage_links(&mut *storage, claimed.id, &targets, &ctx.base_authority))?;
    tracing::debug!("Detected {} outgoing links on {}", links.len(), claimed.url);

    let content = page.content().await?;
    let content_hash = content_fingerprint(&content);

    Ok((
        SnapshotOutcome::Rendered {
            status_code,
            content,
            content_hash,
            timings,
        },
        links,
    ))
}
