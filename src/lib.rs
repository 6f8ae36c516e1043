//! # go2web - HTTP over raw sockets, with page extraction and search
//!
//! go2web is a small HTTP/1.1 client that frames requests by hand, reads
//! responses off a TCP (or rustls) stream until the peer closes, follows
//! redirects, and turns the body into readable lines. It can be used as a
//! library or through the `go2web` binary.
//!
//! ## Features
//!
//! - **Raw transport**: hand-framed `GET` requests over TCP and TLS
//! - **Redirects**: bounded following with loop detection
//! - **Extraction**: HTML titles, headings, paragraphs and links; JSON summaries
//! - **Search**: DuckDuckGo results, ranked in page order
//! - **Caching**: one-hour, file-backed response cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use go2web::{FetchClient, SearchClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = FetchClient::new()?;
//!     for line in fetcher.fetch("https://example.com").await {
//!         println!("{}", line);
//!     }
//!
//!     let search = SearchClient::from_fetcher(fetcher);
//!     let outcome = search.search("rust programming").await;
//!     println!("{}", outcome.results.join("\n"));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`]: socket and TLS exchange
//! - [`response`]: status line, header and body parsing
//! - [`content`]: HTML extraction and JSON summarization
//! - [`cache`]: TTL-gated, write-through response cache
//! - [`tools`]: fetch (with redirects) and search
//! - [`types`]: common types and errors

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod content;
pub mod response;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{CacheConfig, Clock, ResponseCache, SystemClock};
pub use tools::{FetchClient, FetchConfig, SearchClient};
pub use transport::{SocketTransport, Transport};
pub use types::{Go2WebError, Go2WebResult, SearchOutcome, SearchResult, Target};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name
pub const APP_NAME: &str = "go2web";
