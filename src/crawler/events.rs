//! Events streamed to the caller during a crawl
//!
//! A run yields exactly one `SiteMap`, then a `Result` followed by a
//! `Progress` for every processed page, then exactly one `Finished`. Events
//! serialize as `{"type": "...", "data": {...}}`.

use crate::crawler::result::CrawlResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// One event of a crawl run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CrawlEvent {
    SiteMap(SiteMapSummary),
    Progress(ProgressUpdate),
    Result(Box<CrawlResult>),
    Finished(FinishedSummary),
}

impl CrawlEvent {
    /// Returns the wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SiteMap(_) => "site_map",
            Self::Progress(_) => "progress",
            Self::Result(_) => "result",
            Self::Finished(_) => "finished",
        }
    }

    /// Returns the page result carried by a `Result` event
    pub fn as_result(&self) -> Option<&CrawlResult> {
        match self {
            Self::Result(result) => Some(result),
            _ => None,
        }
    }
}

/// What is known about the site before the first page is fetched
#[derive(Debug, Clone, Serialize)]
pub struct SiteMapSummary {
    pub base_url: String,
    pub sitemap_available: bool,
    pub sitemap_urls_count: usize,
    pub site_structure: SiteStructure,
}

/// Counters emitted after each page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Pages processed so far
    pub completed: usize,

    /// Pages processed plus pages waiting in the frontier
    pub total: usize,

    /// Size of the visited set
    pub crawled: usize,
}

/// Terminal summary of a run
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSummary {
    /// Pages processed
    pub total: usize,
    pub site_structure: SiteStructure,
    pub timestamp: DateTime<Utc>,
}

/// Seed URL plus the sitemap grouped by first path segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStructure {
    pub root: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<BTreeMap<String, Vec<String>>>,
}

impl SiteStructure {
    pub fn new(root: impl Into<String>, sitemap_urls: &[String]) -> Self {
        let sitemap = if sitemap_urls.is_empty() {
            None
        } else {
            Some(group_by_path_prefix(sitemap_urls))
        };

        Self {
            root: root.into(),
            sitemap,
        }
    }
}

/// Groups URLs by their first path segment (`/blog/post` under `/blog`)
///
/// Root-level pages and unparseable URLs are grouped under `/`.
pub fn group_by_path_prefix(urls: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for url in urls {
        let prefix = Url::parse(url)
            .ok()
            .and_then(|parsed| {
                let path = parsed.path().trim_start_matches('/');
                let (first, rest) = path.split_once('/').unwrap_or((path, ""));
                // a lone file at the root ("/about") is a root page
                if first.is_empty() || (rest.is_empty() && !path.ends_with('/')) {
                    None
                } else {
                    Some(format!("/{}", first))
                }
            })
            .unwrap_or_else(|| "/".to_string());

        groups.entry(prefix).or_default().push(url.clone());
    }

    groups
}
