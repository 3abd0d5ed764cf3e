//! Retry policy for transient fetch failures
//!
//! A single page fetch is retried only when its failure is classified as
//! transient (rate limiting). The wait between attempts comes from the
//! failure itself when it carries one, otherwise from a fixed default.
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 429 | Retry up to `max_retries` times |
//! | "rate limit" / "retry after" / "too many requests" / a standalone "429" in message | Retry up to `max_retries` times |
//! | Anything else | Return the failure immediately |

use crate::crawler::request::FetchOptions;
use crate::crawler::result::CrawlResult;
use crate::fetch::{FetchClient, FetchFailure};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay used when a failure does not say how long to wait
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Classification of a fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying after a delay
    Transient,
    /// Retrying will not help
    Fatal,
}

/// Decides whether a failure is worth retrying
pub type FailureClassifier = Arc<dyn Fn(&FetchFailure) -> FailureClass + Send + Sync>;

/// Default classifier: HTTP 429 or a rate-limit keyword in the message
pub fn classify_rate_limit(failure: &FetchFailure) -> FailureClass {
    if failure.status == Some(429) {
        return FailureClass::Transient;
    }

    static KEYWORDS: OnceLock<Regex> = OnceLock::new();
    // "429" must stand alone so ports and ids such as ":54290" don't match
    let keywords = KEYWORDS.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|retry.after|too many requests|\b429\b")
            .expect("rate limit pattern is valid")
    });

    if keywords.is_match(&failure.message) {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

/// Parses an explicit wait such as "retry after 2 seconds" from a message
pub fn parse_retry_delay(message: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?i)retry\s+(?:after|in)\s+(\d+(?:\.\d+)?)\s*(?:seconds?|secs?|s)\b")
            .expect("retry delay pattern is valid")
    });

    let seconds: f64 = pattern.captures(message)?.get(1)?.as_str().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// Bounded retry around a single fetch
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    default_delay: Duration,
    classifier: FailureClassifier,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("default_delay", &self.default_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy using the keyword/status classifier
    pub fn new(max_retries: u32, default_delay: Duration) -> Self {
        Self {
            max_retries,
            default_delay,
            classifier: Arc::new(classify_rate_limit),
        }
    }

    /// Replaces the failure classifier
    ///
    /// Fetch clients that report structured signals can classify on those
    /// instead of on message text.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&FetchFailure) -> FailureClass + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// Never returns an error: failures become a failed `CrawlResult` whose
    /// error text names the retry count and the underlying cause.
    pub async fn attempt(
        &self,
        client: &dyn FetchClient,
        url: &str,
        options: &FetchOptions,
    ) -> CrawlResult {
        let start = Instant::now();
        let mut retries = 0;

        loop {
            let failure = match client.fetch(url, options).await {
                Ok(page) => return CrawlResult::from_page(url, page, start.elapsed(), retries),
                Err(failure) => failure,
            };

            if (self.classifier)(&failure) == FailureClass::Fatal {
                tracing::debug!("Fetch of {} failed: {}", url, failure);
                return CrawlResult::failure(url, failure.to_string(), start.elapsed(), retries);
            }

            if retries >= self.max_retries {
                tracing::warn!(
                    "Giving up on {} after {} retries: {}",
                    url,
                    retries,
                    failure
                );
                return CrawlResult::failure(
                    url,
                    format!("Rate limited after {} retries: {}", retries, failure),
                    start.elapsed(),
                    retries,
                );
            }

            let delay = self.delay_for(&failure);
            retries += 1;
            tracing::info!(
                "Rate limited on {}, retry {}/{} in {:?}",
                url,
                retries,
                self.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Chooses the wait before the next attempt
    fn delay_for(&self, failure: &FetchFailure) -> Duration {
        failure
            .retry_after
            .or_else(|| parse_retry_delay(&failure.message))
            .unwrap_or(self.default_delay)
    }
}
