//! HTTP fetch pipeline.
//!
//! ### Transport
//! - One GET per call, behind the [`HttpTransport`] trait
//! - Overload responses (503, 429) are reported apart from every other failure
//! - Max redirects: 5, max body bytes: 5MB (configurable)
//!
//! ### Downloader
//! - Bounded retries with separate overload and error backoffs
//! - Hashes and compresses the body for the content store

pub mod download;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use download::{Download, Downloader, RetryPolicy, parse_last_modified};
pub use url::{UrlError, parse_request_url};

use fetchcache_core::{AppConfig, Error};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "fetchcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Per-attempt request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "fetchcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Body and metadata of one successful GET.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Response body bytes, transfer encodings already removed
    pub body: Bytes,
    /// Raw `Last-Modified` header value
    pub last_modified: Option<String>,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Failure of a single GET attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The origin asked us to back off (HTTP 503 or 429).
    #[error("origin overloaded: {0}")]
    Overloaded(String),

    /// Anything else: connection errors, other non-success statuses,
    /// oversized or unreadable bodies, invalid URLs.
    #[error("{0}")]
    Failed(String),
}

/// A single HTTP GET attempt, no retries.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    http: Client,
    config: FetchConfig,
}

impl ReqwestTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn is_overload(status: StatusCode) -> bool {
    status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url_str: &str) -> Result<RawResponse, TransportError> {
        let start = Instant::now();
        let url = parse_request_url(url_str).map_err(|e| TransportError::Failed(e.to_string()))?;

        let response = self
            .http
            .get(url.as_str())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| TransportError::Failed(format!("network error: {}", e)))?;

        let status = response.status();

        if is_overload(status) {
            return Err(TransportError::Overloaded(format!("status {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(TransportError::Failed(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(TransportError::Failed(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Failed(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(TransportError::Failed(format!(
                "{} bytes exceeds {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(url = %url, fetch_ms, bytes = body.len(), "fetched");

        Ok(RawResponse { body, last_modified, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a loopback port.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/chapter/1")
    }

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(FetchConfig { max_bytes: 64, ..Default::default() }).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "fetchcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "novel-reader/2".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "novel-reader/2");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_is_overload() {
        assert!(is_overload(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_overload(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_overload(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_overload(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_get_success_with_last_modified() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\nlast-modified: Tue, 15 Nov 1994 08:12:31 GMT\r\ncontent-length: 11\r\nconnection: close\r\n\r\n<p>body</p>",
        )
        .await;

        let response = transport().get(&url).await.unwrap();
        assert_eq!(&response.body[..], b"<p>body</p>");
        assert_eq!(response.last_modified.as_deref(), Some("Tue, 15 Nov 1994 08:12:31 GMT"));
    }

    #[tokio::test]
    async fn test_get_503_is_overload() {
        let url =
            serve_once("HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
        let result = transport().get(&url).await;
        assert!(matches!(result, Err(TransportError::Overloaded(_))));
    }

    #[tokio::test]
    async fn test_get_404_is_failure() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n").await;
        let result = transport().get(&url).await;
        assert!(matches!(result, Err(TransportError::Failed(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_get_body_too_large() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 100\r\nconnection: close\r\n\r\n0123456789012345678901234567890123456789012345678901234567890123456789012345678901234567890123456789",
        )
        .await;
        let result = transport().get(&url).await;
        assert!(matches!(result, Err(TransportError::Failed(msg)) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_get_invalid_url() {
        let result = transport().get("ftp://example.com/file").await;
        assert!(matches!(result, Err(TransportError::Failed(msg)) if msg.contains("unsupported scheme")));
    }

    #[tokio::test]
    async fn test_invalid_url_downloads_as_permanent() {
        let downloader = Downloader::new(std::sync::Arc::new(transport()), RetryPolicy {
            max_attempts: 2,
            overload_backoff: Duration::from_millis(1),
            error_backoff: Duration::from_millis(1),
        });
        let result = downloader.download("not a url").await;
        assert!(matches!(result, Err(Error::Permanent(msg)) if msg.contains("invalid URL")));
    }
}
