//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::CrawlResult;
use crate::storage::{ResultRecord, RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Runs are created before the first event is handled and completed when the
/// `Finished` event arrives. Results are keyed by (run, URL); recording the
/// same URL twice in one run replaces the earlier row.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `seed_url` - The run's seed URL
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, seed_url: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp and page total
    fn complete_run(&mut self, run_id: i64, pages_total: usize) -> StorageResult<()>;

    // ===== Results =====

    /// Records one page outcome
    fn record_result(&mut self, run_id: i64, result: &CrawlResult) -> StorageResult<()>;

    /// Gets all results of a run in processing order
    fn get_results(&self, run_id: i64) -> StorageResult<Vec<ResultRecord>>;

    // ===== Statistics =====

    /// Counts results of a run, optionally only successes or failures
    fn count_results(&self, run_id: i64, success: Option<bool>) -> StorageResult<u64>;

    /// Gets result count breakdown by depth
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>>;

    /// Gets result count breakdown by frontier origin
    fn get_source_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<String, u64>>;

    /// Gets failure messages with their counts, most frequent first
    fn get_error_summary(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>>;
}
