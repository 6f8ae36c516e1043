//! Content processing.
//!
//! Turns a response body into display lines, choosing the extractor from the
//! `Content-Type` header:
//! - [`html`]: title, headings, paragraphs and links
//! - [`json`]: depth- and breadth-limited summary
//! - anything else: the start of the raw body

pub mod html;
pub mod json;

use crate::response::Headers;
use tracing::debug;

/// Characters of raw body shown for unrecognized content
pub const MAX_RAW_CHARS: usize = 4000;

/// How a body will be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML document
    Html,
    /// JSON document
    Json,
    /// Anything else
    Other,
}

impl ContentKind {
    /// Pick a kind from the content type, falling back to sniffing for a
    /// JSON object when the header is missing or inconclusive
    pub fn detect(content_type: Option<&str>, body: &str) -> Self {
        let content_type = content_type.map(str::to_lowercase).unwrap_or_default();

        if content_type.contains("json") {
            return ContentKind::Json;
        }
        if content_type.contains("html") {
            return ContentKind::Html;
        }

        let trimmed = body.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            ContentKind::Json
        } else {
            ContentKind::Other
        }
    }
}

/// Render a response body as display lines
pub fn process(headers: &Headers, body: &str) -> Vec<String> {
    let kind = ContentKind::detect(headers.get("content-type"), body);
    debug!(?kind, bytes = body.len(), "Processing content");

    match kind {
        ContentKind::Html => html::extract(&html::ScraperTree::parse(body)),
        ContentKind::Json => json::summarize(body),
        ContentKind::Other => truncate_raw(body),
    }
}

/// First [`MAX_RAW_CHARS`] characters of `body` as lines, with a notice when
/// anything was cut
pub fn truncate_raw(body: &str) -> Vec<String> {
    let total = body.chars().count();
    let shown: String = body.chars().take(MAX_RAW_CHARS).collect();

    let mut lines: Vec<String> = shown.lines().map(str::to_string).collect();
    if total > MAX_RAW_CHARS {
        lines.push(format!(
            "... [truncated: showing {} of {} characters]",
            MAX_RAW_CHARS, total
        ));
    }
    lines
}
