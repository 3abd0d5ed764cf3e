//! URL handling module for Sumi-Trawl
//!
//! This module provides URL normalization for frontier bookkeeping, domain
//! extraction, and the same-site test used to scope deep crawls.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, network_location, origin_string, same_site};
pub use normalize::normalize_url;

/// Returns the normalized frontier key for a URL, falling back to the trimmed
/// input when it cannot be normalized
///
/// Seeds and discovered links that fail normalization are still tracked so
/// the budget and duplicate checks stay exact.
pub fn frontier_key(url: &str) -> String {
    match normalize_url(url) {
        Ok(normalized) => normalized.to_string(),
        Err(e) => {
            tracing::trace!("Using raw frontier key for {}: {}", url, e);
            url.trim().to_string()
        }
    }
}
