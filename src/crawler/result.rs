//! Per-page crawl outcome

use crate::crawler::scheduler::Origin;
use crate::discovery::PaginationOutcome;
use crate::fetch::{Chunk, FetchedPage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of crawling one URL
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub success: bool,

    /// The URL that was requested
    pub url: String,

    /// Depth at which the URL was dequeued
    pub depth: u32,

    /// How the URL entered the frontier
    pub source: Origin,

    /// URL after redirects, when it differs from `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Chunk>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_info: Option<PaginationOutcome>,

    pub performance_metrics: PerformanceMetrics,

    /// Number of retries spent on this URL
    pub retries: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub crawled_at: DateTime<Utc>,
}

/// Timing and size figures for one page
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    /// Wall time across all attempts (milliseconds)
    pub response_time: u64,
    pub content_size: usize,
    pub markdown_size: usize,
    pub links_count: usize,
    pub media_count: usize,
}

impl CrawlResult {
    /// Builds a successful result from a fetched page
    pub fn from_page(url: &str, page: FetchedPage, elapsed: Duration, retries: u32) -> Self {
        let performance_metrics = PerformanceMetrics {
            response_time: elapsed.as_millis() as u64,
            content_size: page.html.len(),
            markdown_size: page.markdown.as_ref().map_or(0, String::len),
            links_count: page.links.len(),
            media_count: page.media.len(),
        };

        let final_url = page.final_url.filter(|u| u != url);

        Self {
            success: true,
            url: url.to_string(),
            depth: 0,
            source: Origin::Direct,
            final_url,
            status_code: page.status_code,
            title: page.title,
            markdown: page.markdown,
            html: Some(page.html),
            extracted_content: page.extracted_content,
            links: Some(page.links),
            media: Some(page.media),
            metadata: Some(page.metadata),
            chunks: page.chunks,
            pagination_info: None,
            performance_metrics,
            retries,
            error: None,
            crawled_at: Utc::now(),
        }
    }

    /// Builds a failed result
    pub fn failure(url: &str, error: impl Into<String>, elapsed: Duration, retries: u32) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            depth: 0,
            source: Origin::Direct,
            final_url: None,
            status_code: None,
            title: None,
            markdown: None,
            html: None,
            extracted_content: None,
            links: None,
            media: None,
            metadata: None,
            chunks: None,
            pagination_info: None,
            performance_metrics: PerformanceMetrics {
                response_time: elapsed.as_millis() as u64,
                ..PerformanceMetrics::default()
            },
            retries,
            error: Some(error.into()),
            crawled_at: Utc::now(),
        }
    }

    /// Annotates the result with its frontier position
    pub fn at(mut self, depth: u32, source: Origin) -> Self {
        self.depth = depth;
        self.source = source;
        self
    }

    /// Returns the fetched HTML of a successful result
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref().filter(|_| self.success)
    }
}
