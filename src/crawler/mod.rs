//! Crawler module for crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - The crawl request and per-page result types
//! - Frontier scheduling, budget accounting, and pacing
//! - Retry of rate-limited fetches
//! - The coordinator that drives a run and streams its events

mod coordinator;
mod events;
mod request;
mod result;
mod retry;
mod scheduler;

pub use coordinator::{Coordinator, MAX_LINKS_PER_PAGE};
pub use events::{
    group_by_path_prefix, CrawlEvent, FinishedSummary, ProgressUpdate, SiteMapSummary,
    SiteStructure,
};
pub use request::{
    ChunkingOptions, ChunkingStrategy, CrawlRequest, ExtractionOptions, ExtractionStrategy,
    FetchOptions, DEFAULT_DELAY_MS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_URLS,
};
pub use result::{CrawlResult, PerformanceMetrics};
pub use retry::{
    classify_rate_limit, parse_retry_delay, FailureClass, FailureClassifier, RetryPolicy,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
pub use scheduler::{FrontierEntry, Origin, Pacer, Rejection, Scheduler};

use crate::fetch::FetchClient;
use futures::stream::BoxStream;

/// Runs a crawl with the default retry policy
///
/// This is the main entry point for starting a crawl. The returned stream
/// borrows `client`; nothing is fetched until it is polled.
///
/// # Arguments
///
/// * `client` - The fetch client, shared across runs by the caller
/// * `request` - The crawl policy
///
/// # Returns
///
/// The run's event stream
pub fn crawl(client: &dyn FetchClient, request: CrawlRequest) -> BoxStream<'_, CrawlEvent> {
    Coordinator::new(client, request).run()
}
