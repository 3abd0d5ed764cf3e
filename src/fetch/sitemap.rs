//! Sitemap XML parsing
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents; the
//! caller decides whether to follow the child sitemaps of an index.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;

/// The `<loc>` values of one sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// A `<urlset>` listing page URLs
    UrlSet(Vec<String>),
    /// A `<sitemapindex>` listing further sitemaps
    Index(Vec<String>),
}

impl SitemapDocument {
    pub fn locations(&self) -> &[String] {
        match self {
            SitemapDocument::UrlSet(locs) | SitemapDocument::Index(locs) => locs,
        }
    }
}

/// Parses a sitemap document
///
/// The root element decides the kind. Only absolute http(s) locations are
/// kept, in document order, with CDATA and entity references decoded. A
/// malformed document yields the locations read before the error.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(xml);
    let mut root_seen = false;
    let mut is_index = false;
    let mut current: Option<String> = None;
    let mut locations = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = element.local_name();
                if !root_seen {
                    root_seen = true;
                    is_index = name.as_ref() == b"sitemapindex";
                }
                if name.as_ref() == b"loc" {
                    current = Some(String::new());
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                if let Some(loc) = current.as_mut() {
                    push_reference(loc, &reference);
                }
            }
            Ok(Event::End(element)) => {
                if element.local_name().as_ref() == b"loc" {
                    if let Some(loc) = current.take() {
                        let loc = loc.trim();
                        if loc.starts_with("http://") || loc.starts_with("https://") {
                            locations.push(loc.to_string());
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    "Stopped reading sitemap at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
        }
    }

    if is_index {
        SitemapDocument::Index(locations)
    } else {
        SitemapDocument::UrlSet(locations)
    }
}

/// Appends the text an entity or character reference stands for
fn push_reference(out: &mut String, reference: &BytesRef<'_>) {
    if let Ok(Some(ch)) = reference.resolve_char_ref() {
        out.push(ch);
        return;
    }

    let name = String::from_utf8_lossy(reference);
    match resolve_predefined_entity(&name) {
        Some(text) => out.push_str(text),
        None => {
            out.push('&');
            out.push_str(&name);
            out.push(';');
        }
    }
}
