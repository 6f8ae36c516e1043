//! Common types and data structures used throughout go2web.
//!
//! This module contains the shared types including:
//! - The error enum and result alias
//! - Normalized request targets
//! - Search results and outcomes

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::{Host, Url};

lazy_static! {
    /// Leading `scheme:` of a URL
    static ref SCHEME_PREFIX_REGEX: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").unwrap();
}

/// Result type alias for go2web operations
pub type Go2WebResult<T> = Result<T, Go2WebError>;

/// Errors that can occur during go2web operations
#[derive(Error, Debug)]
pub enum Go2WebError {
    /// Connect or read did not finish within the transport timeout
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Host name could not be resolved
    #[error("Could not resolve host {0}")]
    NameResolution(String),

    /// Peer refused the TCP connection
    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    /// Peer reset or aborted the connection mid-exchange
    #[error("Connection reset by {0}")]
    ConnectionReset(String),

    /// TLS configuration or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Other socket or file IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// URL parsed but cannot be fetched
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Redirect chain exceeded the hop limit
    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// Redirect chain returned to an already visited URL
    #[error("Redirect loop detected at {0}")]
    RedirectLoop(String),

    /// Invalid arguments provided
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// URL scheme supported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain-text HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl Scheme {
    /// Port used when the URL does not name one
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Whether connections for this scheme are wrapped in TLS
    pub fn uses_tls(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

impl std::str::FromStr for Scheme {
    type Err = Go2WebError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(Go2WebError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }
}

/// A normalized request target.
///
/// Missing schemes default to `http`, missing paths to `/`, and missing ports
/// to the scheme's default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// URL scheme
    pub scheme: Scheme,
    /// Host name or address literal
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Absolute path, always starting with `/`
    pub path: String,
    /// Query string without the leading `?`
    pub query: Option<String>,
}

impl Target {
    /// Normalize a user-supplied URL string into a request target
    pub fn parse(raw: &str) -> Go2WebResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Go2WebError::InvalidUrl("empty URL".to_string()));
        }

        // `host:port` also looks like `scheme:`; a digit after the colon
        // means a port.
        let with_scheme = match SCHEME_PREFIX_REGEX.captures(trimmed) {
            Some(caps) => {
                let rest = &trimmed[caps[0].len()..];
                if rest.starts_with("//") {
                    trimmed.to_string()
                } else if rest.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("http://{}", trimmed)
                } else {
                    return Err(Go2WebError::InvalidUrl(format!(
                        "unsupported scheme '{}'",
                        &caps[1]
                    )));
                }
            },
            None => format!("http://{}", trimmed),
        };

        let url = Url::parse(&with_scheme)?;
        let scheme: Scheme = url.scheme().parse()?;

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(Go2WebError::InvalidUrl(format!("no host in '{}'", raw))),
        };

        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let path = if url.path().is_empty() {
            "/".to_string()
        } else {
            url.path().to_string()
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query: url.query().map(str::to_string),
        })
    }

    /// Path plus query, as written on the request line
    pub fn request_path(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Host with the port appended when it is not the scheme default.
    /// IPv6 addresses are bracketed.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// `scheme://authority` with no path
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin(), self.request_path())
    }
}

/// A single search result, in provider rank order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based position in the provider's listing
    pub rank: usize,

    /// Title of the result
    pub title: String,

    /// URL of the result
    pub url: String,

    /// Snippet text, when the provider shows one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SearchResult {
    /// Display entry for this result: rank and title, then the URL and the
    /// snippet on indented lines
    pub fn display(&self) -> String {
        let mut entry = format!("{}. {}\n   {}", self.rank, self.title, self.url);
        if let Some(snippet) = self.snippet.as_deref().filter(|s| !s.is_empty()) {
            entry.push_str("\n   ");
            entry.push_str(snippet);
        }
        entry
    }
}

/// What a search hands back to callers and what gets cached
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// One display entry per result, never empty
    pub results: Vec<String>,

    /// Result URLs in rank order, for follow-up fetches
    pub urls: Vec<String>,
}
