//! Per-origin robots.txt cache
//!
//! Entries expire after 24 hours so long-lived fetch clients pick up changes
//! made by site owners.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Thread-safe map of origin (`scheme://host[:port]`) to robots.txt
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for an origin unless missing or stale
    pub fn get(&self, origin: &str) -> Option<ParsedRobots> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(origin)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.content.clone())
    }

    /// Stores the rules for an origin, replacing any previous entry
    pub fn insert(&self, origin: &str, robots: ParsedRobots) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(origin.to_string(), CachedRobots::new(robots));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
