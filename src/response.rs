//! HTTP/1.1 response parsing.
//!
//! Splits the raw text read by the transport into status code, headers and
//! body. Malformed input never fails: a response without a header/body
//! separator is treated as all body.

use serde::{Deserialize, Serialize};

/// Status codes that trigger redirect following
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Order-preserving header map with lowercase keys.
///
/// Inserting an existing key replaces its value in place, so the last
/// occurrence wins while the first position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, lowercasing the key
    pub fn insert(&mut self, key: &str, value: &str) {
        let key = key.trim().to_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key, value.to_string())),
        }
    }

    /// Look up a header by case-insensitive name
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(key, value)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of distinct headers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no headers were parsed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Status code, absent when the status line is missing or not numeric
    pub status: Option<u16>,

    /// Response headers
    pub headers: Headers,

    /// Everything after the first blank line
    pub body: String,
}

impl ParsedResponse {
    /// Whether the status is one of the followed redirect codes
    pub fn is_redirect(&self) -> bool {
        self.status
            .is_some_and(|code| REDIRECT_STATUSES.contains(&code))
    }

    /// `Location` header, if present and non-empty
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").filter(|l| !l.is_empty())
    }

    /// `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Parse raw response text
pub fn parse(raw: &str) -> ParsedResponse {
    let Some((head, body)) = raw.split_once("\r\n\r\n") else {
        return ParsedResponse {
            status: None,
            headers: Headers::new(),
            body: raw.to_string(),
        };
    };

    let mut lines = head.split("\r\n");

    let status = lines
        .next()
        .and_then(|status_line| status_line.split_whitespace().nth(1))
        .and_then(|token| token.parse::<u16>().ok());

    let mut headers = Headers::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().is_empty() {
                continue;
            }
            headers.insert(key, value.trim());
        }
    }

    ParsedResponse {
        status,
        headers,
        body: body.to_string(),
    }
}
