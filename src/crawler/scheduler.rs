//! Scheduler for managing the crawl frontier and rate limiting
//!
//! This module handles:
//! - FIFO frontier management (breadth-first order)
//! - The visited set and enqueue-time duplicate suppression
//! - Depth and page-budget accounting
//! - The pagination-chain registry that stops "next" loops
//! - Spacing between rate-limit-sensitive fetches

use crate::url::frontier_key;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// How a URL entered the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The seed URL
    Direct,
    /// Listed in the site's sitemap
    Sitemap,
    /// "Next page" successor of a crawled page
    Pagination,
    /// Link discovered inside a crawled page
    DeepCrawl,
}

impl Origin {
    /// Converts the origin to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Sitemap => "sitemap",
            Self::Pagination => "pagination",
            Self::DeepCrawl => "deep_crawl",
        }
    }
}

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The URL to fetch, as discovered
    pub url: String,

    /// Distance from the seed
    pub depth: u32,

    /// How the URL was discovered
    pub origin: Origin,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, depth: u32, origin: Origin) -> Self {
        Self {
            url: url.into(),
            depth,
            origin,
        }
    }
}

/// Why an entry was not added to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Already visited in this run
    Visited,
    /// Already waiting in the frontier
    Queued,
    /// The page budget is spent
    BudgetExhausted,
    /// The pagination successor was already registered for this page
    ChainSeen,
}

/// Scheduler owns the per-run frontier, visited set, and pagination registry
///
/// One scheduler exists per crawl run and is mutated only by that run's
/// control loop.
#[derive(Debug)]
pub struct Scheduler {
    /// FIFO queue of URLs to fetch
    frontier: VecDeque<FrontierEntry>,

    /// Keys of URLs currently waiting in the frontier
    queued: HashSet<String>,

    /// Keys of URLs already dequeued and processed
    visited: HashSet<String>,

    /// Page key -> successor keys already appended from it
    pagination_chains: HashMap<String, HashSet<String>>,

    max_depth: u32,
    max_urls: usize,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Entries deeper than this are dropped at dequeue time
    /// * `max_urls` - Page budget for the run
    pub fn new(max_depth: u32, max_urls: usize) -> Self {
        Self {
            frontier: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            pagination_chains: HashMap::new(),
            max_depth,
            max_urls,
        }
    }

    /// Returns true while more pages may be visited
    pub fn has_budget(&self) -> bool {
        self.visited.len() < self.max_urls
    }

    /// Adds an entry to the back of the frontier
    ///
    /// The entry is rejected if its URL was visited, is already queued, or the
    /// budget is spent.
    pub fn enqueue(&mut self, entry: FrontierEntry) -> Result<(), Rejection> {
        let key = frontier_key(&entry.url);

        if self.visited.contains(&key) {
            return Err(Rejection::Visited);
        }
        if self.queued.contains(&key) {
            return Err(Rejection::Queued);
        }
        if !self.has_budget() {
            return Err(Rejection::BudgetExhausted);
        }

        tracing::trace!(
            "Queued {} at depth {} ({})",
            entry.url,
            entry.depth,
            entry.origin.as_str()
        );
        self.queued.insert(key);
        self.frontier.push_back(entry);
        Ok(())
    }

    /// Adds the pagination successor of `from` to the frontier
    ///
    /// A given successor is registered at most once per page, so a page whose
    /// "next" link keeps pointing at itself or at an already-seen page cannot
    /// grow the frontier.
    pub fn enqueue_pagination(
        &mut self,
        from: &str,
        next_url: &str,
        depth: u32,
    ) -> Result<(), Rejection> {
        let from_key = frontier_key(from);
        let next_key = frontier_key(next_url);

        if self
            .pagination_chains
            .get(&from_key)
            .is_some_and(|chain| chain.contains(&next_key))
        {
            return Err(Rejection::ChainSeen);
        }
        if self.visited.contains(&next_key) {
            return Err(Rejection::Visited);
        }
        if !self.has_budget() {
            return Err(Rejection::BudgetExhausted);
        }

        self.pagination_chains
            .entry(from_key)
            .or_default()
            .insert(next_key);

        self.enqueue(FrontierEntry::new(next_url, depth, Origin::Pagination))
    }

    /// Gets the next entry to process
    ///
    /// Entries that were visited meanwhile or lie beyond the depth limit are
    /// discarded. The returned entry is already marked visited.
    ///
    /// # Returns
    ///
    /// * `Some(FrontierEntry)` - An entry to crawl now
    /// * `None` - The frontier is empty or the budget is spent
    pub fn next_entry(&mut self) -> Option<FrontierEntry> {
        while self.has_budget() {
            let entry = self.frontier.pop_front()?;
            let key = frontier_key(&entry.url);
            self.queued.remove(&key);

            if self.visited.contains(&key) {
                tracing::trace!("Skipping already visited {}", entry.url);
                continue;
            }
            if entry.depth > self.max_depth {
                tracing::trace!(
                    "Skipping {} at depth {} (max {})",
                    entry.url,
                    entry.depth,
                    self.max_depth
                );
                continue;
            }

            self.visited.insert(key);
            return Some(entry);
        }

        None
    }

    /// Returns how many more URLs fit in the budget counting queued entries
    ///
    /// Bulk sources (sitemaps, deep-crawl links) are capped by this so the
    /// frontier never holds more work than the run can visit.
    pub fn remaining_capacity(&self) -> usize {
        self.max_urls
            .saturating_sub(self.visited.len() + self.frontier.len())
    }

    /// Returns true if the URL was already processed
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&frontier_key(url))
    }

    /// Returns the number of URLs in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns the number of visited URLs
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }
}

/// Enforces a minimum spacing between rate-limit-sensitive calls
///
/// Spacing is measured from the completion of the previous call.
#[derive(Debug)]
pub struct Pacer {
    min_spacing: Duration,
    last_completed: Option<Instant>,
}

impl Pacer {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_completed: None,
        }
    }

    /// Time left before the next call may start
    pub fn time_until_ready(&self, now: Instant) -> Duration {
        match self.last_completed {
            Some(last) => self
                .min_spacing
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Sleeps until the next call may start
    pub async fn wait(&self) {
        let remaining = self.time_until_ready(Instant::now());
        if !remaining.is_zero() {
            tracing::debug!("Pacing rate-limited call, waiting {:?}", remaining);
            tokio::time::sleep(remaining).await;
        }
    }

    /// Records that a call just completed
    pub fn record_completion(&mut self) {
        self.last_completed = Some(Instant::now());
    }
}
