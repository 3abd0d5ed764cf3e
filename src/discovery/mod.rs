//! Page structure discovery
//!
//! This module inspects fetched HTML to find where a crawl can go next:
//! - `PaginationDetector` looks for a "next page" affordance
//! - `LinkDiscoverer` collects outbound links, preferring content regions
//!
//! Both are pure functions of the markup and the page URL. Neither applies
//! crawl scope; that is the coordinator's job.

mod links;
mod pagination;

pub use links::LinkDiscoverer;
pub use pagination::{PaginationDetector, PaginationOutcome, PaginationType};

use thiserror::Error;
use url::Url;

/// Errors raised while inspecting a page
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid page URL '{url}': {source}")]
    InvalidPageUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Parses the URL relative links on a page are resolved against
pub(crate) fn page_base(page_url: &str) -> Result<Url, DiscoveryError> {
    Url::parse(page_url.trim()).map_err(|source| DiscoveryError::InvalidPageUrl {
        url: page_url.to_string(),
        source,
    })
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// The fragment of the resolved URL is dropped.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);

    Some(absolute_url.to_string())
}
