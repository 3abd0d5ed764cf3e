//! Content chunking
//!
//! Splits page text into pieces at natural boundaries and packs them into
//! chunks of at most `max_length` characters, carrying `overlap` characters
//! of the previous chunk into the next.

use crate::crawler::{ChunkingOptions, ChunkingStrategy};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// One chunk of page content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
}

/// Chunks `text` according to `options`
///
/// Returns an empty list when chunking is disabled or the text is blank.
pub fn chunk_text(text: &str, options: &ChunkingOptions) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let boundary = match options.strategy {
        ChunkingStrategy::None => return Vec::new(),
        ChunkingStrategy::Semantic => semantic_boundary(),
        ChunkingStrategy::Regex => regex_boundary(),
    };

    pack(split_after(text, boundary), options.max_length, options.overlap)
        .into_iter()
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .enumerate()
        .map(|(index, content)| Chunk { index, content })
        .collect()
}

/// Sentence ends and line breaks
fn semantic_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]\s+|\n+").expect("semantic boundary is valid"))
}

/// Blank lines and sentence ends
fn regex_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n|[.!?]\s+").expect("regex boundary is valid"))
}

/// Splits after each boundary match, keeping the delimiter with the left piece
fn split_after<'a>(text: &'a str, boundary: &Regex) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for m in boundary.find_iter(text) {
        if m.end() > start {
            pieces.push(&text[start..m.end()]);
            start = m.end();
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn pack(pieces: Vec<&str>, max_length: usize, overlap: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let overlap = overlap.min(max_length / 2);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in pieces.into_iter().flat_map(|p| split_long(p, max_length)) {
        let piece_len = piece.chars().count();

        if current_len > 0 && current_len + piece_len > max_length {
            let tail = tail_chars(&current, overlap).to_string();
            chunks.push(std::mem::take(&mut current));

            let tail_len = tail.chars().count();
            if tail_len + piece_len <= max_length {
                current = tail;
                current_len = tail_len;
            } else {
                current_len = 0;
            }
        }

        current.push_str(piece);
        current_len += piece_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Hard-splits a piece longer than `max_length` characters
fn split_long(piece: &str, max_length: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in piece.char_indices() {
        if count == max_length {
            parts.push(&piece[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    parts.push(&piece[start..]);

    parts
}

fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let skip = count - n;
    text.char_indices()
        .nth(skip)
        .map_or("", |(idx, _)| &text[idx..])
}
