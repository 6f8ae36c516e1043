//! DuckDuckGo search implementation.
//!
//! This module queries DuckDuckGo's HTML interface over the raw-socket
//! transport and parses the result blocks in page order.

use crate::tools::fetch::FetchClient;
use crate::types::{Go2WebResult, SearchOutcome, SearchResult};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};

/// DuckDuckGo HTML search endpoint
pub const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// Maximum number of results returned
pub const MAX_RESULTS: usize = 10;

/// Single entry returned when no results could be parsed
pub const NO_RESULTS_PLACEHOLDER: &str = "No results found. The search provider may have \
     returned no matches, changed its page layout, or blocked the request.";

lazy_static! {
    /// Selector for search results
    static ref RESULT_SELECTOR: Selector = Selector::parse("div.result").unwrap();

    /// Selector for result title
    static ref TITLE_SELECTOR: Selector = Selector::parse("a.result__a").unwrap();

    /// Selector for result snippet
    static ref SNIPPET_SELECTOR: Selector = Selector::parse(".result__snippet").unwrap();

}

/// Client for web searches
#[derive(Clone)]
pub struct SearchClient {
    fetcher: FetchClient,
    endpoint: String,
}

impl SearchClient {
    /// Create a search client over real sockets with the default cache file
    pub fn new() -> Go2WebResult<Self> {
        Ok(Self::from_fetcher(FetchClient::new()?))
    }

    /// Search through an existing fetch client, sharing its transport and
    /// cache
    pub fn from_fetcher(fetcher: FetchClient) -> Self {
        Self {
            fetcher,
            endpoint: DDG_HTML_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint serving DuckDuckGo markup
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The query URL for `term`; also the cache key for its outcome
    pub fn search_url(&self, term: &str) -> String {
        format!("{}?q={}", self.endpoint, urlencoding::encode(term.trim()))
    }

    /// Search for `term`.
    ///
    /// Always returns at least one entry: either the ranked results, a
    /// placeholder when none were found, or an error line. Every outcome is
    /// cached under the query URL.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> SearchOutcome {
        let url = self.search_url(term);
        let cache = self.fetcher.cache();

        if let Some(outcome) = cache.lookup::<SearchOutcome>(&url) {
            info!(term = %term, "Serving cached search results");
            return outcome;
        }

        info!(term = %term, "Performing search");

        let outcome = match self.fetcher.resolve(&url).await {
            Ok((_, response)) => {
                let results = parse_search_results(&response.body);
                info!(term = %term, result_count = results.len(), "Search completed");
                outcome_from(results)
            },
            Err(e) => {
                warn!(term = %term, error = %e, "Search request failed");
                SearchOutcome {
                    results: vec![format!("Error: {}", e)],
                    urls: Vec::new(),
                }
            },
        };

        cache.store(&url, &outcome);
        outcome
    }
}

/// Search with a default client
///
/// # Example
///
/// ```rust,no_run
/// use go2web::tools::search::search_web;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let outcome = search_web("rust programming").await?;
///     for entry in outcome.results {
///         println!("{}", entry);
///     }
///     Ok(())
/// }
/// ```
pub async fn search_web(term: &str) -> Go2WebResult<SearchOutcome> {
    let client = SearchClient::new()?;
    Ok(client.search(term).await)
}

fn outcome_from(results: Vec<SearchResult>) -> SearchOutcome {
    if results.is_empty() {
        warn!("No search results found in response");
        return SearchOutcome {
            results: vec![NO_RESULTS_PLACEHOLDER.to_string()],
            urls: Vec::new(),
        };
    }

    SearchOutcome {
        results: results.iter().map(SearchResult::display).collect(),
        urls: results.into_iter().map(|r| r.url).collect(),
    }
}

/// Parse DuckDuckGo result markup, keeping page order
pub fn parse_search_results(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for element in document.select(&RESULT_SELECTOR) {
        if results.len() >= MAX_RESULTS {
            break;
        }

        // Extract title and URL
        let title_element = match element.select(&TITLE_SELECTOR).next() {
            Some(el) => el,
            None => continue,
        };

        let title = clean_text(&title_element.text().collect::<String>());
        let url = match title_element.value().attr("href") {
            Some(href) => extract_actual_url(href),
            None => continue,
        };

        // Skip invalid URLs
        if url.is_empty() || !url.starts_with("http") {
            continue;
        }

        let snippet = element
            .select(&SNIPPET_SELECTOR)
            .next()
            .map(|el| clean_text(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty());

        results.push(SearchResult {
            rank: results.len() + 1,
            title,
            url,
            snippet,
        });
    }

    results
}

/// Extract the actual URL from DuckDuckGo's redirect URL
fn extract_actual_url(href: &str) -> String {
    // DuckDuckGo wraps URLs in a redirect format
    // Example: //duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com
    if href.contains("uddg=")
        && let Some(encoded_url) = href.split("uddg=").nth(1)
        && let Some(decoded) = encoded_url.split('&').next()
    {
        return urlencoding::decode(decoded)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| href.to_string());
    }

    // Handle direct URLs
    if href.starts_with("//") {
        return format!("https:{}", href);
    }

    href.to_string()
}

/// Collapse whitespace in text scraper has already entity-decoded
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
