//! Crawl request types
//!
//! A `CrawlRequest` is the immutable policy for one crawl run. It is built
//! either programmatically (`CrawlRequest::new`) or from a loaded
//! configuration file (`Config::to_request`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default maximum crawl depth
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default page budget
pub const DEFAULT_MAX_URLS: usize = 50;

/// Default spacing between rate-limit-sensitive fetches (milliseconds)
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Policy for a single crawl run
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Seed URL
    pub url: String,

    /// Maximum depth (the seed is depth 0)
    pub max_depth: u32,

    /// Maximum number of pages visited in this run
    pub max_urls: usize,

    /// Follow detected "next page" links
    pub enable_pagination: bool,

    /// Follow in-page links discovered in content regions
    pub enable_deep_crawl: bool,

    /// Restrict deep-crawl links to the seed's host and port
    pub same_domain_only: bool,

    /// Options handed to the fetch client for every page
    pub fetch: FetchOptions,

    /// Minimum spacing between rate-limit-sensitive fetches (milliseconds)
    pub delay_ms: u64,
}

impl CrawlRequest {
    /// Creates a request for `url` with default policy
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_urls: DEFAULT_MAX_URLS,
            enable_pagination: false,
            enable_deep_crawl: false,
            same_domain_only: true,
            fetch: FetchOptions::default(),
            delay_ms: DEFAULT_DELAY_MS,
        }
    }

    /// Whether sitemap discovery should run before the main loop
    pub fn wants_sitemap(&self) -> bool {
        self.enable_pagination || self.enable_deep_crawl
    }

    /// Whether fetches must be spaced by `delay_ms`
    pub fn is_rate_limit_sensitive(&self) -> bool {
        self.fetch.extraction.strategy.is_rate_limit_sensitive()
    }
}

/// Per-page options passed to the fetch client
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// User agent override for this crawl
    pub user_agent: Option<String>,

    /// Proxy URL (e.g. `http://proxy.local:8080`)
    pub proxy: Option<String>,

    /// CSS selector the page must contain before it counts as loaded
    pub wait_for: Option<String>,

    /// Request a screenshot of the rendered page
    pub screenshot: bool,

    /// Structured-content extraction settings
    pub extraction: ExtractionOptions,

    /// Content chunking settings
    pub chunking: ChunkingOptions,
}

/// Name of an extraction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// No structured extraction
    #[default]
    None,

    /// Field-to-selector mapping evaluated against the page
    CssSelector,

    /// Model-backed extraction (subject to provider rate limits)
    LlmBased,

    /// Similarity clustering over page blocks
    Cosine,
}

impl ExtractionStrategy {
    /// Returns true if calls under this strategy hit a rate-limited provider
    pub fn is_rate_limit_sensitive(&self) -> bool {
        matches!(self, Self::LlmBased)
    }

    /// Returns the wire name of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CssSelector => "css_selector",
            Self::LlmBased => "llm_based",
            Self::Cosine => "cosine",
        }
    }
}

/// Extraction strategy plus provider configuration
#[derive(Debug, Clone, Default)]
pub struct ExtractionOptions {
    pub strategy: ExtractionStrategy,

    /// Provider name for model-backed strategies (e.g. "openai")
    pub provider: Option<String>,

    /// Provider API token
    pub api_token: Option<String>,

    /// Free-form instruction for model-backed strategies
    pub instruction: Option<String>,

    /// Strategy-specific schema (selector map, output schema, ...)
    pub schema: Option<Value>,

    /// Topic filter for the cosine strategy
    pub semantic_filter: Option<String>,
}

impl ExtractionOptions {
    /// Returns true if no extraction should run
    pub fn is_disabled(&self) -> bool {
        self.strategy == ExtractionStrategy::None
    }
}

/// How fetched content is split into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// No chunking
    #[default]
    None,

    /// Split on sentence boundaries
    Semantic,

    /// Split on blank lines and sentence ends
    Regex,
}

/// Chunking strategy plus size limits
#[derive(Debug, Clone)]
pub struct ChunkingOptions {
    pub strategy: ChunkingStrategy,

    /// Maximum chunk length in characters
    pub max_length: usize,

    /// Characters carried over from the end of one chunk into the next
    pub overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::None,
            max_length: 8192,
            overlap: 100,
        }
    }
}
