//! Page fetching with redirect following and caching.
//!
//! A fetch checks the cache under the literal URL string, then follows
//! redirects in a bounded loop, renders the final response through the
//! content processor, and stores the rendered lines.

use crate::cache::ResponseCache;
use crate::content;
use crate::response::{self, ParsedResponse};
use crate::transport::{SocketTransport, Transport};
use crate::types::{Go2WebError, Go2WebResult, Target};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default maximum redirect hops
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

lazy_static! {
    /// A `Location` that starts with a scheme (or a bare `host:port`)
    static ref ABSOLUTE_URL_REGEX: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap();
}

/// Configuration for fetching
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,

    /// Headers appended to every request after the defaults
    pub extra_headers: Vec<(String, String)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            extra_headers: Vec::new(),
        }
    }
}

/// Client for fetching pages
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache>,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a fetch client over real sockets with the default cache file
    pub fn new() -> Go2WebResult<Self> {
        Ok(Self::from_parts(
            Arc::new(SocketTransport::new()?),
            Arc::new(ResponseCache::default()),
            FetchConfig::default(),
        ))
    }

    /// Assemble a client from explicit parts
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        cache: Arc<ResponseCache>,
        config: FetchConfig,
    ) -> Self {
        Self {
            transport,
            cache,
            config,
        }
    }

    /// Cache shared by this client
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Fetch a URL and return display lines. Failures come back as a single
    /// `Error: ...` line.
    pub async fn fetch(&self, url: &str) -> Vec<String> {
        match self.try_fetch(url).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                vec![format!("Error: {}", e)]
            },
        }
    }

    /// Fetch a URL and return display lines, or the error that stopped it
    #[instrument(skip(self))]
    pub async fn try_fetch(&self, url: &str) -> Go2WebResult<Vec<String>> {
        if let Some(lines) = self.cache.lookup::<Vec<String>>(url) {
            info!(url = %url, "Serving cached response");
            return Ok(lines);
        }

        let (target, response) = self.resolve(url).await?;
        let lines = content::process(&response.headers, &response.body);

        info!(
            url = %url,
            final_url = %target,
            status = ?response.status,
            lines = lines.len(),
            "Page fetched"
        );

        self.cache.store(url, &lines);
        Ok(lines)
    }

    /// Request `url`, following redirects until a non-redirect response.
    ///
    /// Returns the final target with its parsed response. A redirect status
    /// without a `Location` header is returned as the final response.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> Go2WebResult<(Target, ParsedResponse)> {
        let mut current = Target::parse(url)?;
        let mut visited = HashSet::from([current.to_string()]);
        let mut hops = 0;

        loop {
            let raw = self
                .transport
                .fetch(&current, &self.config.extra_headers)
                .await?;
            let parsed = response::parse(&raw);

            if !parsed.is_redirect() {
                return Ok((current, parsed));
            }

            let Some(location) = parsed.location() else {
                warn!(status = ?parsed.status, url = %current, "Redirect without Location header");
                return Ok((current, parsed));
            };

            if hops >= self.config.max_redirects {
                return Err(Go2WebError::TooManyRedirects(self.config.max_redirects));
            }

            let next = match Target::parse(&resolve_location(&current, location)) {
                Ok(next) => next,
                Err(e) => {
                    warn!(
                        location = %location,
                        error = %e,
                        url = %current,
                        "Unusable Location header"
                    );
                    return Ok((current, parsed));
                },
            };
            if !visited.insert(next.to_string()) {
                return Err(Go2WebError::RedirectLoop(next.to_string()));
            }

            info!(from = %current, to = %next, status = ?parsed.status, "Following redirect");
            hops += 1;
            current = next;
        }
    }
}

/// Fetch a URL with a default client
///
/// # Example
///
/// ```rust,no_run
/// use go2web::tools::fetch::fetch_url;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     for line in fetch_url("example.com").await? {
///         println!("{}", line);
///     }
///     Ok(())
/// }
/// ```
pub async fn fetch_url(url: &str) -> Go2WebResult<Vec<String>> {
    let client = FetchClient::new()?;
    Ok(client.fetch(url).await)
}

/// Compute the next URL from a `Location` header.
///
/// Locations with a scheme are used as-is. Relative locations are resolved
/// against the host root, not the current path: `next` from `http://h/a/b`
/// becomes `http://h/next`.
pub fn resolve_location(current: &Target, location: &str) -> String {
    let location = location.trim();

    if ABSOLUTE_URL_REGEX.is_match(location) {
        location.to_string()
    } else if location.starts_with("//") {
        format!("{}:{}", current.scheme, location)
    } else if location.starts_with('/') {
        format!("{}{}", current.origin(), location)
    } else {
        format!("{}/{}", current.origin(), location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport that answers from a fixed table and records each request
    #[derive(Default)]
    struct ScriptedTransport {
        responses: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn with(mut self, url: &str, raw: &str) -> Self {
            self.responses.insert(url.to_string(), raw.to_string());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(
            &self,
            target: &Target,
            _extra_headers: &[(String, String)],
        ) -> Go2WebResult<String> {
            let key = target.to_string();
            self.requests.lock().unwrap().push(key.clone());
            self.responses
                .get(&key)
                .cloned()
                .ok_or_else(|| Go2WebError::ConnectionRefused(target.authority()))
        }
    }

    fn client(transport: Arc<ScriptedTransport>, max_redirects: usize) -> FetchClient {
        FetchClient::from_parts(
            transport,
            Arc::new(ResponseCache::in_memory()),
            FetchConfig {
                max_redirects,
                ..Default::default()
            },
        )
    }

    fn redirect(location: &str) -> String {
        format!("HTTP/1.1 302 Found\r\nLocation: {}\r\n\r\n", location)
    }

    const HTML_OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<h1>Done</h1>";

    #[test]
    fn test_resolve_location_forms() {
        let current = Target::parse("https://example.com/a/b?c=d").unwrap();

        assert_eq!(
            resolve_location(&current, "http://other.org/x"),
            "http://other.org/x"
        );
        assert_eq!(resolve_location(&current, "/next"), "https://example.com/next");
        assert_eq!(resolve_location(&current, "next"), "https://example.com/next");
        assert_eq!(
            resolve_location(&current, "//cdn.example.com/y"),
            "https://cdn.example.com/y"
        );
        assert_eq!(
            resolve_location(&current, "mailto:someone@example.com"),
            "mailto:someone@example.com"
        );
        assert_eq!(
            resolve_location(&current, "localhost:8080/x"),
            "localhost:8080/x"
        );
    }

    #[test]
    fn test_resolve_location_keeps_port() {
        let current = Target::parse("http://127.0.0.1:8080/path").unwrap();
        assert_eq!(resolve_location(&current, "/next"), "http://127.0.0.1:8080/next");
    }

    #[tokio::test]
    async fn test_redirect_targets_host_root() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("http://example.com/start", &redirect("/next"))
                .with("http://example.com/next", HTML_OK),
        );
        let client = client(transport.clone(), 10);

        let lines = client.fetch("example.com/start").await;

        assert_eq!(lines, vec!["# Done"]);
        assert_eq!(
            transport.requests(),
            vec!["http://example.com/start", "http://example.com/next"]
        );
    }

    #[tokio::test]
    async fn test_relative_location_ignores_current_path() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("http://example.com/dir/page", &redirect("other"))
                .with("http://example.com/other", HTML_OK),
        );
        let client = client(transport.clone(), 10);

        let (target, response) = client.resolve("http://example.com/dir/page").await.unwrap();
        assert_eq!(target.to_string(), "http://example.com/other");
        assert_eq!(response.status, Some(200));
    }

    #[tokio::test]
    async fn test_redirect_loop_is_detected() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("http://a.test/", &redirect("http://b.test/"))
                .with("http://b.test/", &redirect("http://a.test/")),
        );
        let client = client(transport.clone(), 10);

        let result = client.resolve("http://a.test/").await;
        assert!(matches!(result, Err(Go2WebError::RedirectLoop(_))));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_redirect_hop_limit() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with("http://h.test/1", &redirect("/2"))
                .with("http://h.test/2", &redirect("/3"))
                .with("http://h.test/3", &redirect("/4"))
                .with("http://h.test/4", HTML_OK),
        );
        let client = client(transport.clone(), 2);

        let lines = client.fetch("http://h.test/1").await;
        assert_eq!(lines, vec!["Error: Too many redirects (limit 2)"]);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_redirect_without_location_falls_through() {
        let transport = Arc::new(ScriptedTransport::default().with(
            "http://h.test/",
            "HTTP/1.1 301 Moved Permanently\r\nContent-Type: text/plain\r\n\r\nmoved somewhere",
        ));
        let client = client(transport.clone(), 10);

        let lines = client.fetch("http://h.test/").await;
        assert_eq!(lines, vec!["moved somewhere"]);
    }

    #[tokio::test]
    async fn test_unusable_location_falls_through() {
        let transport = Arc::new(
            ScriptedTransport::default()
                .with(
                    "http://h.test/empty-host",
                    "HTTP/1.1 302 Found\r\nLocation: http://\r\nContent-Type: text/plain\r\n\r\nmoved",
                )
                .with(
                    "http://h.test/mail",
                    "HTTP/1.1 302 Found\r\nLocation: mailto:someone@h.test\r\nContent-Type: text/plain\r\n\r\nwrite to us",
                ),
        );
        let client = client(transport.clone(), 10);

        assert_eq!(client.fetch("http://h.test/empty-host").await, vec!["moved"]);
        assert_eq!(client.fetch("http://h.test/mail").await, vec!["write to us"]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_transport() {
        let transport = Arc::new(ScriptedTransport::default().with("http://h.test/", HTML_OK));
        let client = client(transport.clone(), 10);

        let first = client.fetch("http://h.test/").await;
        let second = client.fetch("http://h.test/").await;

        assert_eq!(first, second);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_key_is_literal_request_string() {
        let transport = Arc::new(ScriptedTransport::default().with("http://h.test/", HTML_OK));
        let client = client(transport.clone(), 10);

        client.fetch("http://h.test/").await;
        client.fetch("h.test").await;

        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_reported_and_not_cached() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone(), 10);

        let lines = client.fetch("http://down.test/").await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Error: Connection refused"));
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_degrades_to_body() {
        let transport =
            Arc::new(ScriptedTransport::default().with("http://h.test/", "no framing at all"));
        let client = client(transport, 10);

        let lines = client.fetch("http://h.test/").await;
        assert_eq!(lines, vec!["no framing at all"]);
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let client = client(Arc::new(ScriptedTransport::default()), 10);
        let lines = client.fetch("ftp://example.com").await;
        assert!(lines[0].starts_with("Error: Invalid URL"));
    }
}
