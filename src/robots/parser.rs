//! Robots.txt parser implementation
//!
//! This module provides functionality for parsing robots.txt content using the robotstxt crate.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
///
/// This is a wrapper around the robotstxt crate's types, providing a simplified
/// interface for checking if URLs are allowed.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    ///
    /// # Returns
    ///
    /// A ParsedRobots instance that can be used to check URL permissions
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used as the default when robots.txt cannot be fetched or parsed.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The URL or path to check (e.g., "/page.html")
    /// * `user_agent` - The user agent product token (e.g., "SumiTrawl")
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            // Empty content or explicit allow-all means allow all
            return true;
        }

        // Parse and check on-demand
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns the sitemap URLs advertised with `Sitemap:` directives
    ///
    /// Directive names are matched case-insensitively and apply regardless of
    /// the surrounding user-agent group.
    ///
    /// # Returns
    ///
    /// The sitemap URLs in file order
    pub fn sitemaps(&self) -> Vec<String> {
        self.content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.trim().split_once(':')?;
                if key.trim().eq_ignore_ascii_case("sitemap") {
                    Some(value.trim().to_string())
                } else {
                    None
                }
            })
            .filter(|value| !value.is_empty())
            .collect()
    }
}
