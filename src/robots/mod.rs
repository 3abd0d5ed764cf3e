//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when fetching pages and reads the
//! `Sitemap:` directives used for sitemap discovery.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::Client;

/// Fetches robots.txt for an origin
///
/// Any failure (network error, non-2xx status, unreadable body) yields a
/// permissive `ParsedRobots`, so a missing robots.txt never blocks a crawl.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `origin` - The origin to fetch from (e.g., "https://example.com")
/// * `user_agent` - The full user agent header value
///
/// # Returns
///
/// The parsed robots.txt, or an allow-all instance
pub async fn fetch_robots(client: &Client, origin: &str, user_agent: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client
        .get(&robots_url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!("{} returned {}", robots_url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Extracts the product token robots.txt groups are matched against
///
/// `"SumiTrawl/1.0 (+https://example.com)"` becomes `"SumiTrawl"`.
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .unwrap_or(user_agent)
}
