//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::state::{Category, UrlStatus};
use crate::storage::{RunRecord, Storage};
use crate::SnapgraphError;

/// Run statistics summary
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// The run being reported on
    pub run: RunRecord,

    /// Snapshots written by the run
    pub snapshots: u64,

    /// Snapshots that recorded a failure
    pub error_snapshots: u64,

    /// Link edges owned by the run's snapshots
    pub links: u64,

    /// Frontier rows per status, across all runs
    pub urls_by_status: Vec<(UrlStatus, u64)>,

    /// Frontier rows per category, across all runs
    pub urls_by_category: Vec<(Category, u64)>,
}

impl RunStatistics {
    pub fn total_urls(&self) -> u64 {
        self.urls_by_status.iter().map(|(_, count)| count).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run_id` - Run to report on; the latest run when `None`
///
/// # Returns
///
/// * `Ok(Some(RunStatistics))` - Statistics for the run
/// * `Ok(None)` - No run has been recorded yet
/// * `Err(SnapgraphError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    run_id: Option<i64>,
) -> Result<Option<RunStatistics>, SnapgraphError> {
    let run = match run_id {
        Some(id) => storage.get_run(id)?,
        None => match storage.get_latest_run()? {
            Some(run) => run,
            None => return Ok(None),
        },
    };

    let urls_by_status = UrlStatus::all()
        .into_iter()
        .map(|status| Ok((status, storage.count_urls_by_status(status)?)))
        .collect::<Result<Vec<_>, SnapgraphError>>()?;

    let urls_by_category = [Category::Internal, Category::External]
        .into_iter()
        .map(|category| Ok((category, storage.count_urls_by_category(category)?)))
        .collect::<Result<Vec<_>, SnapgraphError>>()?;

    Ok(Some(RunStatistics {
        snapshots: storage.count_snapshots(run.id)?,
        error_snapshots: storage.count_error_snapshots(run.id)?,
        links: storage.count_links(run.id)?,
        run,
        urls_by_status,
        urls_by_category,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    let run = &stats.run;
    println!("=== Crawl Run {} ===\n", run.id);

    println!("Run:");
    println!("  Mode: {}", run.mode);
    println!("  Started: {}", run.start_time);
    match &run.end_time {
        Some(end_time) => println!("  Finished: {}", end_time),
        None => println!("  Finished: (still running or interrupted)"),
    }
    if let Some(duration) = run.duration() {
        println!(
            "  Duration: {:.1}s",
            duration.num_milliseconds() as f64 / 1000.0
        );
    }
    println!();

    println!("Snapshots:");
    println!("  Written: {}", stats.snapshots);
    println!("  Errors: {}", stats.error_snapshots);
    println!("  Links: {}", stats.links);
    println!();

    let total = stats.total_urls();
    println!("Frontier ({} URLs):", total);
    for (status, count) in &stats.urls_by_status {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    for (category, count) in &stats.urls_by_category {
        println!("  {}: {}", category, count);
    }
}
