//! HTML parser for page metadata
//!
//! This module handles parsing fetched HTML to extract:
//! - Page title
//! - Links (from <a> tags and canonical links)
//! - Media references (images, video, audio)
//! - Meta tags

use crate::discovery::resolve_link;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs, first occurrence order)
    pub links: Vec<String>,

    /// All media sources found on the page (absolute URLs)
    pub media: Vec<String>,

    /// `<meta name|property=... content=...>` pairs plus the document language
    pub metadata: BTreeMap<String, String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// # Example
///
/// ```
/// use sumi_trawl::fetch::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_page(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
        media: extract_media(&document, base_url),
        metadata: extract_metadata(&document),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Extracts image, video, and audio sources
fn extract_media(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut media = Vec::new();

    if let Ok(selector) = Selector::parse("img[src], video[src], audio[src], source[src]") {
        for element in document.select(&selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("src")
                .and_then(|src| resolve_link(src, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    media.push(absolute_url);
                }
            }
        }
    }

    media
}

/// Extracts meta tags keyed by their `name` or `property` attribute
fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    if let Ok(selector) = Selector::parse("meta[content]") {
        for element in document.select(&selector) {
            let attrs = element.value();
            let key = attrs.attr("name").or_else(|| attrs.attr("property"));
            if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
                let content = content.trim();
                if !content.is_empty() {
                    metadata
                        .entry(key.to_lowercase())
                        .or_insert_with(|| content.to_string());
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("html[lang]") {
        if let Some(lang) = document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("lang"))
        {
            metadata.insert("lang".to_string(), lang.to_string());
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_extract_relative_link() {
        let html = r#"<html><body><a href="/other">Link</a></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links, vec!["https://example.com/other".to_string()]);
    }

    #[test]
    fn test_duplicate_links_collapsed() {
        let html = r#"<html><body><a href="/a">A</a><a href="/a">A again</a></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links.len(), 1);
    }

    #[test]
    fn test_skip_download_and_special_links() {
        let html = r#"<html><body>
            <a href="/file.pdf" download>Download</a>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="/valid">Valid</a>
        </body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.links, vec!["https://example.com/valid".to_string()]);
    }

    #[test]
    fn test_extract_canonical_link() {
        let html = r#"<html><head><link rel="canonical" href="https://example.com/canonical" /></head><body></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert!(parsed
            .links
            .contains(&"https://example.com/canonical".to_string()));
    }

    #[test]
    fn test_extract_media() {
        let html = r#"<html><body>
            <img src="/logo.png">
            <video src="https://cdn.example.com/clip.mp4"></video>
            <img src="/logo.png">
        </body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(
            parsed.media,
            vec![
                "https://example.com/logo.png".to_string(),
                "https://cdn.example.com/clip.mp4".to_string()
            ]
        );
    }

    #[test]
    fn test_extract_metadata() {
        let html = r#"<html lang="en"><head>
            <meta name="Description" content=" A page ">
            <meta property="og:title" content="OG Title">
            <meta charset="utf-8">
        </head><body></body></html>"#;
        let parsed = parse_page(html, &base_url());
        assert_eq!(parsed.metadata.get("description").unwrap(), "A page");
        assert_eq!(parsed.metadata.get("og:title").unwrap(), "OG Title");
        assert_eq!(parsed.metadata.get("lang").unwrap(), "en");
        assert_eq!(parsed.metadata.len(), 3);
    }
}
