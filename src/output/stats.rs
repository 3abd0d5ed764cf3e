//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::BTreeMap;

/// Statistics of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run: RunRecord,

    /// Total number of pages processed
    pub total_pages: u64,

    pub succeeded: u64,
    pub failed: u64,

    /// Pages per depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Pages per frontier origin
    pub source_breakdown: BTreeMap<String, u64>,

    /// Failure messages with counts, most frequent first
    pub error_summary: Vec<(String, u64)>,
}

impl CrawlStatistics {
    /// Share of processed pages that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_pages > 0 {
            (self.succeeded as f64 / self.total_pages as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics of the most recent run
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(CrawlStatistics))` - Statistics of the latest run
/// * `Ok(None)` - The database holds no runs
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<Option<CrawlStatistics>> {
    let Some(run) = storage.get_latest_run()? else {
        return Ok(None);
    };

    Ok(Some(CrawlStatistics {
        total_pages: storage.count_results(run.id, None)?,
        succeeded: storage.count_results(run.id, Some(true))?,
        failed: storage.count_results(run.id, Some(false))?,
        depth_breakdown: storage.get_depth_breakdown(run.id)?,
        source_breakdown: storage.get_source_breakdown(run.id)?,
        error_summary: storage.get_error_summary(run.id)?,
        run,
    }))
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run:");
    println!("  ID: {}", stats.run.id);
    println!("  Seed: {}", stats.run.seed_url);
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", stats.run.config_hash);
    println!();

    println!("Overview:");
    println!("  Pages processed: {}", stats.total_pages);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed: {}", stats.failed);
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Pages by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.source_breakdown.is_empty() {
        println!("Pages by Source:");
        for (source, count) in &stats.source_breakdown {
            println!("  {}: {}", source, count);
        }
        println!();
    }

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        for (message, count) in &stats.error_summary {
            println!("  {}: {}", message, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        stats.success_rate(),
        stats.succeeded,
        stats.total_pages
    );
}
