//! Structured content extraction
//!
//! Extractors turn a fetched page into a JSON payload. The fetch client
//! invokes them; the crawl loop only sees the normalized payload.

use crate::crawler::ExtractionOptions;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Topic used by the cosine strategy when no `semantic_filter` is set
pub const DEFAULT_SEMANTIC_FILTER: &str = "main content";

/// Most blocks the cosine strategy returns
const COSINE_TOP_K: usize = 10;

/// Elements read as blocks when a page has no markdown
const BLOCK_ELEMENTS: &str = "p, li, h1, h2, h3, h4, h5, h6, td, pre, blockquote";

/// Words ignored when building term vectors
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "with",
];

/// Page content handed to an extractor
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub url: &'a str,
    pub html: &'a str,
    pub markdown: Option<&'a str>,
}

/// Produces structured content from a page
///
/// Errors are plain messages; a message mentioning rate limiting (for example
/// "rate limit exceeded, retry after 20 seconds") lets the crawl loop retry
/// the page.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        input: &ExtractionInput<'_>,
        options: &ExtractionOptions,
    ) -> Result<Value, String>;
}

/// Normalizes an extractor payload
///
/// A JSON-encoded string is decoded; `null` (including an encoded one) means
/// no content; anything else is kept as-is.
pub fn normalize_payload(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Null) => None,
            Ok(decoded) => Some(decoded),
            Err(_) => Some(Value::String(text)),
        },
        other => Some(other),
    }
}

/// Built-in extractor mapping field names to CSS selectors
///
/// Schema forms:
///
/// ```json
/// {"title": "h1", "links": {"selector": "a", "attribute": "href"}}
/// {"base_selector": ".product", "fields": {"name": "h2", "price": ".price"}}
/// ```
///
/// Without `base_selector` every field maps to the list of matched values.
/// With it, the output is one object per base element holding the first
/// match of each field (or `null`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CssSelectorExtractor;

#[async_trait]
impl Extractor for CssSelectorExtractor {
    async fn extract(
        &self,
        input: &ExtractionInput<'_>,
        options: &ExtractionOptions,
    ) -> Result<Value, String> {
        let schema = options
            .schema
            .as_ref()
            .ok_or_else(|| "css_selector extraction requires a schema".to_string())?;
        extract_with_schema(input.html, schema)
    }
}

struct FieldSpec {
    name: String,
    selector: Selector,
    attribute: Option<String>,
}

fn extract_with_schema(html: &str, schema: &Value) -> Result<Value, String> {
    let schema = schema
        .as_object()
        .ok_or_else(|| "css_selector schema must be an object".to_string())?;

    let base_selector = match schema.get("base_selector") {
        Some(Value::String(s)) => Some(parse_selector(s)?),
        Some(_) => return Err("base_selector must be a string".to_string()),
        None => None,
    };

    let field_map = match schema.get("fields") {
        Some(Value::Object(fields)) => fields,
        Some(_) => return Err("fields must be an object".to_string()),
        None => schema,
    };

    let fields = field_map
        .iter()
        .filter(|(name, _)| name.as_str() != "base_selector")
        .map(|(name, spec)| parse_field(name, spec))
        .collect::<Result<Vec<_>, _>>()?;

    let document = Html::parse_document(html);

    match base_selector {
        Some(base) => {
            let items = document
                .select(&base)
                .map(|element| {
                    let mut item = Map::new();
                    for field in &fields {
                        let value = element
                            .select(&field.selector)
                            .find_map(|e| field_value(e, field))
                            .map_or(Value::Null, Value::String);
                        item.insert(field.name.clone(), value);
                    }
                    Value::Object(item)
                })
                .collect();
            Ok(Value::Array(items))
        }
        None => {
            let mut out = Map::new();
            for field in &fields {
                let values = document
                    .select(&field.selector)
                    .filter_map(|e| field_value(e, field))
                    .map(Value::String)
                    .collect();
                out.insert(field.name.clone(), Value::Array(values));
            }
            Ok(Value::Object(out))
        }
    }
}

fn parse_field(name: &str, spec: &Value) -> Result<FieldSpec, String> {
    let (selector, attribute) = match spec {
        Value::String(selector) => (selector.as_str(), None),
        Value::Object(obj) => {
            let selector = obj
                .get("selector")
                .and_then(Value::as_str)
                .ok_or_else(|| format!("field '{}' is missing a selector", name))?;
            let attribute = obj
                .get("attribute")
                .and_then(Value::as_str)
                .map(str::to_string);
            (selector, attribute)
        }
        _ => return Err(format!("field '{}' must be a selector or an object", name)),
    };

    Ok(FieldSpec {
        name: name.to_string(),
        selector: parse_selector(selector)?,
        attribute,
    })
}

fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("invalid selector '{}': {:?}", selector, e))
}

fn field_value(element: ElementRef<'_>, field: &FieldSpec) -> Option<String> {
    let value = match &field.attribute {
        Some(attr) => element.value().attr(attr)?.trim().to_string(),
        None => element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
    };
    Some(value).filter(|v| !v.is_empty())
}

/// Built-in extractor ranking page blocks against a topic
///
/// Each block (a markdown paragraph, or a text element when there is no
/// markdown) and the `semantic_filter` topic become term-frequency vectors.
/// Blocks with a positive cosine similarity to the topic are returned best
/// first as `{"index", "content", "score"}` objects, at most ten of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineExtractor;

#[async_trait]
impl Extractor for CosineExtractor {
    async fn extract(
        &self,
        input: &ExtractionInput<'_>,
        options: &ExtractionOptions,
    ) -> Result<Value, String> {
        let topic = options
            .semantic_filter
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SEMANTIC_FILTER);

        let query = term_vector(topic);
        if query.is_empty() {
            return Err(format!("semantic filter '{}' has no usable terms", topic));
        }

        let blocks = match input.markdown {
            Some(markdown) if !markdown.trim().is_empty() => markdown_blocks(markdown),
            _ => html_blocks(input.html),
        };

        let mut ranked: Vec<(usize, f64, String)> = blocks
            .into_iter()
            .enumerate()
            .filter_map(|(index, block)| {
                let score = cosine_similarity(&query, &term_vector(&block));
                (score > 0.0).then_some((index, score, block))
            })
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(COSINE_TOP_K);

        Ok(Value::Array(
            ranked
                .into_iter()
                .map(|(index, score, content)| {
                    json!({"index": index, "content": content, "score": score})
                })
                .collect(),
        ))
    }
}

fn markdown_blocks(markdown: &str) -> Vec<String> {
    markdown
        .split("\n\n")
        .map(|block| block.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|block| !block.is_empty())
        .collect()
}

fn html_blocks(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(BLOCK_ELEMENTS) else {
        return Vec::new();
    };

    Html::parse_document(html)
        .select(&selector)
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|block| !block.is_empty())
        .collect()
}

fn term_vector(text: &str) -> HashMap<String, f64> {
    let mut terms = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(&w.as_str()))
    {
        *terms.entry(word).or_insert(0.0) += 1.0;
    }
    terms
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }

    let norm = |v: &HashMap<String, f64>| v.values().map(|w| w * w).sum::<f64>().sqrt();
    dot / (norm(a) * norm(b))
}
