//! Raw socket transport.
//!
//! Writes one hand-framed `GET` request over TCP (wrapped in TLS for
//! `https`) and reads until the peer closes the connection. There is no
//! `Content-Length` or chunked-encoding handling: the whole byte stream up to
//! close is the response.

use crate::types::{Go2WebError, Go2WebResult, Target};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};

/// Browser-style user agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Connect and read timeout, applied to each socket operation
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read buffer size
const CHUNK_SIZE: usize = 4096;

/// Headers sent after `Host`, in wire order
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Connection", "close"),
    ("User-Agent", USER_AGENT),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    // No decompressor exists, so compression is declined outright.
    ("Accept-Encoding", "identity"),
    ("Upgrade-Insecure-Requests", "1"),
];

/// Something that can perform a single request/response exchange.
///
/// The redirect resolver and search adapter are written against this trait
/// so they can be driven by scripted transports in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one `GET` for `target` and return the raw response text
    async fn fetch(
        &self,
        target: &Target,
        extra_headers: &[(String, String)],
    ) -> Go2WebResult<String>;
}

/// Transport over real TCP sockets, with rustls for `https`
#[derive(Clone)]
pub struct SocketTransport {
    connector: TlsConnector,
}

impl SocketTransport {
    /// Create a transport that verifies certificates against the bundled
    /// Mozilla root set
    pub fn new() -> Go2WebResult<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Go2WebError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Resolve the host and open a TCP connection to the first address that
    /// accepts
    async fn connect(&self, target: &Target) -> Go2WebResult<TcpStream> {
        let authority = target.authority();

        let addrs: Vec<SocketAddr> =
            timeout(REQUEST_TIMEOUT, lookup_host((target.host.as_str(), target.port)))
                .await
                .map_err(|_| Go2WebError::Timeout(authority.clone()))?
                .map_err(|e| {
                    debug!(host = %target.host, error = %e, "Name resolution failed");
                    Go2WebError::NameResolution(target.host.clone())
                })?
                .collect();

        let mut last_error = None;

        for addr in addrs {
            debug!(%addr, "Connecting");
            match timeout(REQUEST_TIMEOUT, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => last_error = Some(classify_io_error(e, &authority)),
                Err(_) => last_error = Some(Go2WebError::Timeout(authority.clone())),
            }
        }

        Err(last_error.unwrap_or_else(|| Go2WebError::NameResolution(target.host.clone())))
    }

    /// Wrap an open TCP stream in a verified TLS session
    async fn handshake(
        &self,
        target: &Target,
        stream: TcpStream,
    ) -> Go2WebResult<tokio_rustls::client::TlsStream<TcpStream>> {
        let server_name = ServerName::try_from(target.host.clone()).map_err(|e| {
            Go2WebError::Tls(format!("invalid server name '{}': {}", target.host, e))
        })?;

        match timeout(REQUEST_TIMEOUT, self.connector.connect(server_name, stream)).await {
            Ok(Ok(tls)) => Ok(tls),
            Ok(Err(e)) => Err(match classify_io_error(e, &target.authority()) {
                Go2WebError::Io(inner) => Go2WebError::Tls(inner.to_string()),
                other => other,
            }),
            Err(_) => Err(Go2WebError::Timeout(target.authority())),
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    #[instrument(skip(self, extra_headers), fields(url = %target))]
    async fn fetch(
        &self,
        target: &Target,
        extra_headers: &[(String, String)],
    ) -> Go2WebResult<String> {
        let request = build_request(target, extra_headers);
        let authority = target.authority();

        let stream = self.connect(target).await?;

        // Every early return drops the stream, which closes the socket.
        let raw = if target.scheme.uses_tls() {
            let mut tls = self.handshake(target, stream).await?;
            exchange(&mut tls, request.as_bytes(), &authority).await?
        } else {
            let mut stream = stream;
            exchange(&mut stream, request.as_bytes(), &authority).await?
        };

        debug!(bytes = raw.len(), "Response received");

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Frame a `GET` request with the mandatory headers followed by the caller's
/// headers, unmodified
pub fn build_request(target: &Target, extra_headers: &[(String, String)]) -> String {
    let mut request = String::new();
    let _ = write!(request, "GET {} HTTP/1.1\r\n", target.request_path());
    let _ = write!(request, "Host: {}\r\n", target.authority());

    for (name, value) in DEFAULT_HEADERS {
        let _ = write!(request, "{}: {}\r\n", name, value);
    }
    for (name, value) in extra_headers {
        let _ = write!(request, "{}: {}\r\n", name, value);
    }

    request.push_str("\r\n");
    request
}

/// Write the request and read until the peer closes
async fn exchange<S>(stream: &mut S, request: &[u8], authority: &str) -> Go2WebResult<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(REQUEST_TIMEOUT, async {
        stream.write_all(request).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| Go2WebError::Timeout(authority.to_string()))?
    .map_err(|e| classify_io_error(e, authority))?;

    let mut raw = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let read = timeout(REQUEST_TIMEOUT, stream.read(&mut chunk))
            .await
            .map_err(|_| Go2WebError::Timeout(authority.to_string()))?;

        match read {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
            // Servers often drop TLS connections without close_notify.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(classify_io_error(e, authority)),
        }
    }

    Ok(raw)
}

/// Map a socket error onto the transport failure taxonomy
pub fn classify_io_error(error: std::io::Error, authority: &str) -> Go2WebError {
    let is_tls = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        .is_some();

    if is_tls {
        return Go2WebError::Tls(error.to_string());
    }

    match error.kind() {
        ErrorKind::TimedOut => Go2WebError::Timeout(authority.to_string()),
        ErrorKind::ConnectionRefused => Go2WebError::ConnectionRefused(authority.to_string()),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            Go2WebError::ConnectionReset(authority.to_string())
        },
        _ => Go2WebError::Io(error),
    }
}
