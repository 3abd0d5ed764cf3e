//! Page fetching
//!
//! The crawl loop talks to the outside world only through the `FetchClient`
//! trait. This module defines that contract and ships a static HTTP
//! implementation built on reqwest, together with the pieces it uses:
//! - Page parsing (title, links, media, metadata)
//! - Structured extraction through pluggable `Extractor`s
//! - Content chunking
//! - Sitemap parsing

mod chunking;
mod extractor;
mod http;
mod page;
mod sitemap;

pub use chunking::{chunk_text, Chunk};
pub use extractor::{
    normalize_payload, CosineExtractor, CssSelectorExtractor, ExtractionInput, Extractor,
    DEFAULT_SEMANTIC_FILTER,
};
pub use http::{build_http_client, ReqwestFetchClient};
pub use page::{parse_page, ParsedPage};
pub use sitemap::{parse_sitemap, SitemapDocument};

use crate::crawler::FetchOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// A successfully fetched page
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: Option<String>,

    /// HTTP status code, when the client speaks HTTP
    pub status_code: Option<u16>,

    pub title: Option<String>,

    /// Raw page markup
    pub html: String,

    pub markdown: Option<String>,

    /// Absolute links found on the page
    pub links: Vec<String>,

    /// Absolute media references (images, video, audio)
    pub media: Vec<String>,

    /// Meta tags and document attributes
    pub metadata: BTreeMap<String, String>,

    /// Normalized extractor payload
    pub extracted_content: Option<Value>,

    pub chunks: Option<Vec<Chunk>>,
}

/// A failed fetch
///
/// `status` and `retry_after` carry structured signals when the client has
/// them; `message` is always set.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FetchFailure {
    pub message: String,
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
}

impl FetchFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            retry_after: None,
        }
    }
}

/// Contract between the crawl loop and whatever retrieves pages
///
/// Implementations must be safe to call repeatedly for the same URL and must
/// not serve cached page content within a run. One client is constructed by
/// the hosting process and shared by reference across runs.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetches (and, if configured, extracts) a single page
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchFailure>;

    /// Lists page URLs advertised by the seed's sitemap
    ///
    /// The default implementation reports no sitemap.
    async fn discover_sitemap(&self, seed: &str) -> Result<Vec<String>, FetchFailure> {
        let _ = seed;
        Ok(Vec::new())
    }
}
