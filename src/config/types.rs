use crate::crawler::{
    ChunkingOptions, ChunkingStrategy, CrawlRequest, ExtractionOptions, ExtractionStrategy,
    FetchOptions, RetryPolicy, DEFAULT_DELAY_MS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_URLS,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Main configuration structure for Sumi-Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds the crawl request described by this configuration
    pub fn to_request(&self) -> CrawlRequest {
        CrawlRequest {
            url: self.crawl.url.clone(),
            max_depth: self.crawl.max_depth,
            max_urls: self.crawl.max_urls,
            enable_pagination: self.crawl.enable_pagination,
            enable_deep_crawl: self.crawl.enable_deep_crawl,
            same_domain_only: self.crawl.same_domain_only,
            fetch: FetchOptions {
                user_agent: self.fetch.user_agent.clone(),
                proxy: self.fetch.proxy.clone(),
                wait_for: self.fetch.wait_for.clone(),
                screenshot: self.fetch.screenshot,
                extraction: ExtractionOptions {
                    strategy: self.extraction.strategy,
                    provider: self.extraction.provider.clone(),
                    api_token: self.extraction.api_token.clone(),
                    instruction: self.extraction.instruction.clone(),
                    schema: self.extraction.schema.clone(),
                    semantic_filter: self.extraction.semantic_filter.clone(),
                },
                chunking: ChunkingOptions {
                    strategy: self.chunking.strategy,
                    max_length: self.chunking.max_length,
                    overlap: self.chunking.overlap,
                },
            },
            delay_ms: self.crawl.delay_ms,
        }
    }

    /// Builds the retry policy described by the `[retry]` section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.default_delay_ms),
        )
    }
}

/// What to crawl and how far
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Seed URL
    pub url: String,

    /// Maximum depth to crawl from the seed
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of pages visited
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    #[serde(default)]
    pub enable_pagination: bool,

    #[serde(default)]
    pub enable_deep_crawl: bool,

    /// Keep deep-crawl links on the seed's host
    #[serde(default = "default_true")]
    pub same_domain_only: bool,

    /// Minimum time between model-backed extraction fetches (milliseconds)
    #[serde(default = "default_delay_ms", rename = "delay")]
    pub delay_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClientConfig {
    /// Whole-request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,

    pub max_redirects: usize,

    /// Honor robots.txt rules for the configured user agent
    pub respect_robots: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
            respect_robots: true,
        }
    }
}

/// Per-page fetch options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    /// Overrides the user agent built from `[user-agent]`
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub wait_for: Option<String>,
    pub screenshot: bool,
}

/// Structured extraction settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractionConfig {
    pub strategy: ExtractionStrategy,
    pub provider: Option<String>,
    pub api_token: Option<String>,
    pub instruction: Option<String>,

    /// Strategy-specific schema, given inline as a TOML table
    pub schema: Option<Value>,
    pub semantic_filter: Option<String>,
}

/// Content chunking settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    pub max_length: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let options = ChunkingOptions::default();
        Self {
            strategy: options.strategy,
            max_length: options.max_length,
            overlap: options.overlap,
        }
    }
}

/// Retry settings for rate-limited fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    pub max_retries: u32,

    /// Wait used when a failure carries no hint (milliseconds)
    pub default_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            default_delay_ms: 1000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the SQLite database file; results are not stored when unset
    pub database_path: Option<String>,

    /// Path of the JSON-lines event file; events go to stdout when unset
    pub events_path: Option<String>,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_max_urls() -> usize {
    DEFAULT_MAX_URLS
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_true() -> bool {
    true
}
