//! Outbound link discovery
//!
//! Links inside content regions are preferred. When no content region yields
//! a link, every anchor on the page is considered except those sitting in
//! navigation chrome (nav bars, menus, sidebars, footers).

use crate::discovery::{page_base, resolve_link, DiscoveryError};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements that usually hold the page's primary content
const CONTENT_REGIONS: &str =
    r#"main, article, [role="main"], #main, .main, #content, .content, #article, .article"#;

/// Elements whose links are boilerplate
const NAVIGATION_REGIONS: &str =
    r#"nav, footer, .nav, .navigation, .menu, .sidebar, .footer, [role="navigation"]"#;

/// How many element ancestors are checked for navigation chrome
const NAVIGATION_ANCESTOR_DEPTH: usize = 3;

/// Collects de-duplicated absolute http(s) links from a page
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkDiscoverer;

impl LinkDiscoverer {
    pub fn new() -> Self {
        Self
    }

    /// Discovers outbound links on a page
    ///
    /// # Arguments
    ///
    /// * `html` - The page markup
    /// * `page_url` - The page's URL, used to resolve relative links
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Links in document order, first occurrence kept
    /// * `Err(DiscoveryError)` - The page URL could not be parsed
    pub fn discover(&self, html: &str, page_url: &str) -> Result<Vec<String>, DiscoveryError> {
        let base = page_base(page_url)?;
        let document = Html::parse_document(html);

        let content_links = content_region_links(&document, &base);
        if !content_links.is_empty() {
            return Ok(content_links);
        }

        Ok(non_navigation_links(&document, &base))
    }
}

fn content_region_links(document: &Html, base: &Url) -> Vec<String> {
    let (Ok(regions), Ok(anchors)) = (
        Selector::parse(CONTENT_REGIONS),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let mut collector = LinkCollector::new(base);
    for region in document.select(&regions) {
        for anchor in region.select(&anchors) {
            collector.push(anchor);
        }
    }
    collector.links
}

fn non_navigation_links(document: &Html, base: &Url) -> Vec<String> {
    let (Ok(navigation), Ok(anchors)) = (
        Selector::parse(NAVIGATION_REGIONS),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let mut collector = LinkCollector::new(base);
    for anchor in document.select(&anchors) {
        if !in_navigation(anchor, &navigation) {
            collector.push(anchor);
        }
    }
    collector.links
}

/// Checks the nearest element ancestors for navigation chrome
fn in_navigation(anchor: ElementRef<'_>, navigation: &Selector) -> bool {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(NAVIGATION_ANCESTOR_DEPTH)
        .any(|ancestor| navigation.matches(&ancestor))
}

struct LinkCollector<'a> {
    base: &'a Url,
    seen: HashSet<String>,
    links: Vec<String>,
}

impl<'a> LinkCollector<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            seen: HashSet::new(),
            links: Vec::new(),
        }
    }

    fn push(&mut self, anchor: ElementRef<'_>) {
        let Some(link) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, self.base))
        else {
            return;
        };

        if self.seen.insert(link.clone()) {
            self.links.push(link);
        }
    }
}
