//! Integration tests for go2web
//!
//! Every test talks to a local mock server over real sockets, so none of
//! them need network access.

use go2web::{
    cache::{CacheConfig, ResponseCache},
    tools::{FetchClient, FetchConfig, NO_RESULTS_PLACEHOLDER, SearchClient},
    transport::{SocketTransport, Transport},
    types::{Go2WebError, Target},
};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with(cache: ResponseCache) -> FetchClient {
    FetchClient::from_parts(
        Arc::new(SocketTransport::new().unwrap()),
        Arc::new(cache),
        FetchConfig::default(),
    )
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_raw_exchange_returns_full_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .and(header("accept-encoding", "identity"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = SocketTransport::new().unwrap();
        let target = Target::parse(&format!("{}/hello", server.uri())).unwrap();
        let raw = transport.fetch(&target, &[]).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with("hello world"));
    }

    #[tokio::test]
    async fn test_extra_headers_reach_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = SocketTransport::new().unwrap();
        let target = Target::parse(&format!("{}/api", server.uri())).unwrap();
        let extra = vec![("X-Api-Key".to_string(), "secret".to_string())];
        let raw = transport.fetch(&target, &extra).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 204"));
    }
}

mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(html(
                "<html><head><title>Mock Page</title></head><body>\
                 <h1>Welcome</h1><p>Some text here.</p>\
                 <a href=\"https://www.rust-lang.org/\">Rust</a>\
                 </body></html>",
            ))
            .mount(&server)
            .await;

        let client = client_with(ResponseCache::disabled());
        let lines = client.fetch(&format!("{}/page", server.uri())).await;

        assert_eq!(lines[0], "Title: Mock Page");
        assert!(lines.contains(&"# Welcome".to_string()));
        assert!(lines.contains(&"Some text here.".to_string()));
        assert!(lines.contains(&"Rust: https://www.rust-lang.org/".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_json_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": "go2web", "tags": ["a", "b"]})),
            )
            .mount(&server)
            .await;

        let client = client_with(ResponseCache::disabled());
        let lines = client.fetch(&format!("{}/data.json", server.uri())).await;

        assert_eq!(
            lines,
            vec!["name: go2web", "tags: [2 items]", "  1. a", "  2. b"]
        );
    }

    #[tokio::test]
    async fn test_fetch_follows_relative_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/next"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next"))
            .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(ResponseCache::disabled());
        let lines = client.fetch(&format!("{}/docs/start", server.uri())).await;

        assert_eq!(lines, vec!["arrived"]);
    }

    #[tokio::test]
    async fn test_fetch_reports_redirect_loop() {
        let server = MockServer::start().await;
        Mock::given(path("/a"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/b"))
            .mount(&server)
            .await;
        Mock::given(path("/b"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/a"))
            .mount(&server)
            .await;

        let client = client_with(ResponseCache::disabled());
        let result = client.try_fetch(&format!("{}/a", server.uri())).await;

        assert!(matches!(result, Err(Go2WebError::RedirectLoop(_))));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_error_line() {
        let client = client_with(ResponseCache::disabled());
        let lines = client.fetch("http://go2web-test.invalid/").await;

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Error: "));
    }
}

mod search_tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
        <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&rut=x">Rust Programming Language</a>
            <a class="result__snippet">A language empowering everyone.</a>
        </div>
        <div class="result">
            <a class="result__a" href="https://doc.rust-lang.org/book/">The Rust Book</a>
        </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_search_against_mock_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "rust lang"))
            .respond_with(html(RESULTS_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let search = SearchClient::from_fetcher(client_with(ResponseCache::in_memory()))
            .with_endpoint(format!("{}/html/", server.uri()));

        let outcome = search.search("rust lang").await;
        assert_eq!(
            outcome.results,
            vec![
                "1. Rust Programming Language\n   https://www.rust-lang.org/\n   A language empowering everyone.",
                "2. The Rust Book\n   https://doc.rust-lang.org/book/",
            ]
        );
        assert_eq!(
            outcome.urls,
            vec!["https://www.rust-lang.org/", "https://doc.rust-lang.org/book/"]
        );

        // Served from cache the second time
        let again = search.search("rust lang").await;
        assert_eq!(again, outcome);
    }

    #[tokio::test]
    async fn test_search_without_results_gives_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(html("<html><body>Nothing here</body></html>"))
            .mount(&server)
            .await;

        let search = SearchClient::from_fetcher(client_with(ResponseCache::disabled()))
            .with_endpoint(format!("{}/html/", server.uri()));

        let outcome = search.search("zzzz").await;
        assert_eq!(outcome.results, vec![NO_RESULTS_PLACEHOLDER]);
        assert!(outcome.urls.is_empty());
    }
}

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cached"))
            .respond_with(ResponseTemplate::new(200).set_body_string("first body"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            path: Some(dir.path().join("cache.json")),
            ..Default::default()
        };
        let url = format!("{}/cached", server.uri());

        let first = client_with(ResponseCache::new(config.clone()))
            .fetch(&url)
            .await;
        assert_eq!(first, vec!["first body"]);
        assert!(dir.path().join("cache.json").exists());

        // A fresh client reading the same file must not hit the server
        let second = client_with(ResponseCache::new(config)).fetch(&url).await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_cache_key_is_literal_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("root"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_with(ResponseCache::in_memory());
        client.fetch(&server.uri()).await;
        client.fetch(&format!("{}/", server.uri())).await;

        assert_eq!(client.cache().len(), 2);
    }
}
