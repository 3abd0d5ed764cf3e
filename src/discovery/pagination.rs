//! Pagination detection
//!
//! Patterns are tried in a fixed order and the first match wins:
//!
//! | Order | Pattern | Type |
//! |-------|---------|------|
//! | 1 | `<a>` whose target carries a page-number query parameter | `url_parameter` |
//! | 2 | `a.next`, `.pagination .next` | `next_link` |
//! | 3 | `a[rel=next]`, `link[rel=next]` | `rel_next` |
//! | 4 | `.load-more`, `.more-results` | `infinite_scroll` |
//! | 5 | `button[onclick*="page" i]` | `javascript_button` |
//! | 6 | anchors whose text is an integer > 1 | `numbered` |
//!
//! Confidence is fixed per outcome: a resolved next URL scores highest, a
//! matched pattern without one scores lower, the numbered fallback lower
//! still. A page with none of the patterns is reported absent with high
//! confidence; a detection error is reported absent with zero confidence.

use crate::discovery::{page_base, resolve_link};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

/// Confidence when a next-page URL was resolved
pub const CONFIDENCE_RESOLVED: f64 = 0.8;

/// Confidence when a pattern matched but no next-page URL was resolved
pub const CONFIDENCE_UNRESOLVED: f64 = 0.6;

/// Confidence of the numbered-anchor fallback
pub const CONFIDENCE_NUMBERED: f64 = 0.5;

/// Confidence that a page without any known pattern has no pagination
pub const CONFIDENCE_ABSENT: f64 = 0.9;

/// Query parameters that carry a page number
const PAGE_PARAMS: &[&str] = &["page", "pg", "paged", "pagenum", "page_num", "pagenumber"];

/// How pagination was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    None,
    UrlParameter,
    NextLink,
    RelNext,
    InfiniteScroll,
    JavascriptButton,
    Numbered,
}

impl PaginationType {
    /// Returns the wire name of the pattern
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::UrlParameter => "url_parameter",
            Self::NextLink => "next_link",
            Self::RelNext => "rel_next",
            Self::InfiniteScroll => "infinite_scroll",
            Self::JavascriptButton => "javascript_button",
            Self::Numbered => "numbered",
        }
    }
}

/// Result of pagination detection on one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationOutcome {
    pub has_pagination: bool,
    pub pagination_type: PaginationType,

    /// Absolute URL of the next page, when one could be resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_url: Option<String>,

    pub confidence: f64,

    /// Number of elements that matched the winning pattern
    pub elements_found: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaginationOutcome {
    /// No known pattern on the page
    pub fn absent() -> Self {
        Self {
            has_pagination: false,
            pagination_type: PaginationType::None,
            next_page_url: None,
            confidence: CONFIDENCE_ABSENT,
            elements_found: 0,
            error: None,
        }
    }

    /// Detection could not run
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            has_pagination: false,
            pagination_type: PaginationType::None,
            next_page_url: None,
            confidence: 0.0,
            elements_found: 0,
            error: Some(error.into()),
        }
    }

    fn found(
        pagination_type: PaginationType,
        next_page_url: Option<String>,
        elements: usize,
    ) -> Self {
        let confidence = if next_page_url.is_some() {
            CONFIDENCE_RESOLVED
        } else {
            CONFIDENCE_UNRESOLVED
        };

        Self {
            has_pagination: true,
            pagination_type,
            next_page_url,
            confidence,
            elements_found: elements,
            error: None,
        }
    }
}

/// Classifies whether a page exposes a "next page" affordance
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationDetector;

impl PaginationDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detects pagination on a page
    ///
    /// # Arguments
    ///
    /// * `html` - The page markup
    /// * `page_url` - The page's URL, used to resolve relative targets
    ///
    /// # Returns
    ///
    /// The outcome; never fails. Errors are carried in `error`.
    pub fn detect(&self, html: &str, page_url: &str) -> PaginationOutcome {
        let base = match page_base(page_url) {
            Ok(base) => base,
            Err(e) => return PaginationOutcome::failed(e.to_string()),
        };

        let document = Html::parse_document(html);

        detect_url_parameter(&document, &base)
            .or_else(|| detect_next_control(&document, &base))
            .or_else(|| {
                detect_marker(
                    &document,
                    ".load-more, .more-results",
                    PaginationType::InfiniteScroll,
                )
            })
            .or_else(|| {
                detect_marker(
                    &document,
                    r#"button[onclick*="page" i]"#,
                    PaginationType::JavascriptButton,
                )
            })
            .or_else(|| detect_numbered(&document, &base))
            .unwrap_or_else(PaginationOutcome::absent)
    }
}

/// Reads the page number from a URL's query string
fn page_number(url: &Url) -> Option<u64> {
    url.query_pairs()
        .find(|(key, _)| PAGE_PARAMS.contains(&key.to_ascii_lowercase().as_str()))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Picks the lowest page number above the current one
fn detect_url_parameter(document: &Html, base: &Url) -> Option<PaginationOutcome> {
    let selector = Selector::parse("a[href]").ok()?;
    let current = page_number(base).unwrap_or(1);

    let candidates: Vec<(u64, String)> = document
        .select(&selector)
        .filter_map(|anchor| {
            let link = resolve_link(anchor.value().attr("href")?, base)?;
            let number = page_number(&Url::parse(&link).ok()?)?;
            Some((number, link))
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let next = candidates
        .iter()
        .filter(|(number, _)| *number > current)
        .min_by_key(|(number, _)| *number)
        .map(|(_, link)| link.clone());

    Some(PaginationOutcome::found(
        PaginationType::UrlParameter,
        next,
        candidates.len(),
    ))
}

fn detect_next_control(document: &Html, base: &Url) -> Option<PaginationOutcome> {
    let patterns = [
        ("a.next, .pagination .next", PaginationType::NextLink),
        (
            r#"a[rel~="next"], link[rel~="next"]"#,
            PaginationType::RelNext,
        ),
    ];

    for (selector, pagination_type) in patterns {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };

        let elements: Vec<ElementRef<'_>> = document.select(&selector).collect();
        if elements.is_empty() {
            continue;
        }

        let next = elements
            .iter()
            .filter_map(|element| element_href(*element))
            .find_map(|href| resolve_link(href, base));

        return Some(PaginationOutcome::found(
            pagination_type,
            next,
            elements.len(),
        ));
    }

    None
}

/// Patterns that never carry a resolvable target
fn detect_marker(
    document: &Html,
    selector: &str,
    pagination_type: PaginationType,
) -> Option<PaginationOutcome> {
    let selector = Selector::parse(selector).ok()?;
    let count = document.select(&selector).count();

    (count > 0).then(|| PaginationOutcome::found(pagination_type, None, count))
}

fn detect_numbered(document: &Html, base: &Url) -> Option<PaginationOutcome> {
    let selector = Selector::parse("a[href]").ok()?;

    let numbered: Vec<(String, ElementRef<'_>)> = document
        .select(&selector)
        .map(|anchor| (anchor.text().collect::<String>().trim().to_string(), anchor))
        .filter(|(text, _)| text.parse::<u64>().map_or(false, |n| n > 1))
        .collect();

    if numbered.is_empty() {
        return None;
    }

    let next_page_url = numbered
        .iter()
        .find(|(text, _)| text == "2")
        .and_then(|(_, anchor)| resolve_link(anchor.value().attr("href")?, base));

    Some(PaginationOutcome {
        has_pagination: true,
        pagination_type: PaginationType::Numbered,
        next_page_url,
        confidence: CONFIDENCE_NUMBERED,
        elements_found: numbered.len(),
        error: None,
    })
}

/// The element's own `href`, or that of its first descendant anchor
fn element_href(element: ElementRef<'_>) -> Option<&str> {
    if let Some(href) = element.value().attr("href") {
        return Some(href);
    }

    let anchor = Selector::parse("a[href]").ok()?;
    let descendant = element.select(&anchor).next()?;
    descendant.value().attr("href")
}
