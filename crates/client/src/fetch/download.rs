//! Retrying downloader.
//!
//! Wraps an [`HttpTransport`] with a bounded retry schedule and prepares the
//! body for the content store (hash + compression).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use fetchcache_core::cache::{codec, hash};
use fetchcache_core::{AppConfig, CacheWrite, Error};

use super::{HttpTransport, RawResponse, TransportError};

/// `Last-Modified` layout as sent by origins (RFC 7231 IMF-fixdate).
const LAST_MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Retry schedule for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after an overload response
    pub overload_backoff: Duration,
    /// Wait after any other failure
    pub error_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, overload_backoff: Duration::from_secs(10), error_backoff: Duration::from_secs(1) }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            overload_backoff: config.overload_backoff(),
            error_backoff: config.error_backoff(),
        }
    }
}

/// A successful download, ready to return and to write back.
#[derive(Debug, Clone)]
pub struct Download {
    /// Raw body as served
    pub body: Bytes,
    /// zlib-compressed body for storage
    pub compressed: Vec<u8>,
    pub content_hash: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// Start of the successful attempt
    pub fetched_at: DateTime<Utc>,
}

impl Download {
    fn from_response(url: &str, response: RawResponse, fetched_at: DateTime<Utc>) -> Result<Self, Error> {
        let content_hash = hash::content_hash(&response.body);
        let compressed = codec::compress(&response.body).map_err(|err| permanent(url, err))?;
        let last_modified = response.last_modified.as_deref().and_then(parse_last_modified);
        Ok(Self { body: response.body, compressed, content_hash, last_modified, fetched_at })
    }

    /// Split into the bytes owed to the caller and the store write for `url`.
    pub fn into_write(self, url: &str) -> (Bytes, CacheWrite) {
        let write = CacheWrite {
            url: url.to_string(),
            content_hash: self.content_hash,
            compressed: self.compressed,
            last_modified: self.last_modified,
            refreshed_at: self.fetched_at,
        };
        (self.body, write)
    }
}

/// Best-effort parse of a `Last-Modified` header. Unparsable means unknown.
pub fn parse_last_modified(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), LAST_MODIFIED_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A download failure that retrying will not fix.
fn permanent(url: &str, cause: impl std::fmt::Display) -> Error {
    Error::Permanent(format!("{url}: {cause}"))
}

/// Issues GETs through a transport with bounded retries.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Download `url`, retrying per the policy.
    ///
    /// # Errors
    ///
    /// After the last attempt, `Error::Transient` if that attempt was an
    /// overload response, otherwise `Error::Permanent`.
    pub async fn download(&self, url: &str) -> Result<Download, Error> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let fetched_at = Utc::now();

            let err = match self.transport.get(url).await {
                Ok(response) => return Download::from_response(url, response, fetched_at),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                tracing::debug!(url, attempts = attempt, error = %err, "download failed");
                return Err(match err {
                    TransportError::Overloaded(msg) => Error::Transient(format!("{url}: {msg}")),
                    TransportError::Failed(msg) => permanent(url, msg),
                });
            }

            let delay = match err {
                TransportError::Overloaded(_) => self.policy.overload_backoff,
                TransportError::Failed(_) => self.policy.error_backoff,
            };
            tracing::warn!(
                url,
                attempt,
                max_attempts,
                error = %err,
                "download attempt failed, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, Step};
    use chrono::TimeZone;

    fn downloader(transport: &Arc<ScriptedTransport>) -> Downloader {
        Downloader::new(transport.clone(), RetryPolicy {
            max_attempts: 3,
            overload_backoff: Duration::from_millis(10),
            error_backoff: Duration::from_millis(1),
        })
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Step::body_modified(b"<p>1</p>", "Wed, 21 Oct 2015 07:28:00 GMT")]);

        let download = downloader(&transport).download("u").await.unwrap();

        assert_eq!(transport.attempts("u"), 1);
        assert_eq!(&download.body[..], b"<p>1</p>");
        assert_eq!(download.content_hash, hash::content_hash(b"<p>1</p>"));
        assert_eq!(codec::decompress(&download.compressed).unwrap(), b"<p>1</p>");
        assert_eq!(download.last_modified, Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()));
    }

    #[tokio::test]
    async fn test_overload_twice_then_success() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Step::Overloaded, Step::Overloaded, Step::body(b"third time")]);

        let download = downloader(&transport).download("u").await.unwrap();

        assert_eq!(transport.attempts("u"), 3);
        assert_eq!(&download.body[..], b"third time");
    }

    #[tokio::test]
    async fn test_overload_exhausts_attempts() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Step::Overloaded, Step::Overloaded, Step::Overloaded]);

        let result = downloader(&transport).download("u").await;

        assert!(matches!(result, Err(Error::Transient(_))));
        assert_eq!(transport.attempts("u"), 3);
    }

    #[tokio::test]
    async fn test_failures_exhaust_attempts() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Step::Fail, Step::Fail, Step::Fail, Step::body(b"never")]);

        let result = downloader(&transport).download("u").await;

        assert!(matches!(result, Err(Error::Permanent(_))));
        assert_eq!(transport.attempts("u"), 3);
    }

    #[tokio::test]
    async fn test_last_failure_decides_kind() {
        let transport = ScriptedTransport::new();
        transport.script("a", vec![Step::Overloaded, Step::Overloaded, Step::Fail]);
        transport.script("b", vec![Step::Fail, Step::Fail, Step::Overloaded]);
        let downloader = downloader(&transport);

        assert!(matches!(downloader.download("a").await, Err(Error::Permanent(_))));
        assert!(matches!(downloader.download("b").await, Err(Error::Transient(_))));
    }

    #[tokio::test]
    async fn test_overload_backoff_is_longer() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Step::Overloaded, Step::body(b"ok")]);
        let downloader = Downloader::new(transport.clone(), RetryPolicy {
            max_attempts: 2,
            overload_backoff: Duration::from_millis(150),
            error_backoff: Duration::from_millis(1),
        });

        let start = std::time::Instant::now();
        downloader.download("u").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let transport = ScriptedTransport::new();
        transport.script("u", vec![Step::Overloaded, Step::body(b"unreached")]);
        let downloader = Downloader::new(transport.clone(), RetryPolicy { max_attempts: 1, ..RetryPolicy::default() });

        assert!(matches!(downloader.download("u").await, Err(Error::Transient(_))));
        assert_eq!(transport.attempts("u"), 1);
    }

    #[test]
    fn test_encoding_failure_is_permanent() {
        let err = permanent("u", Error::Codec("deflate stream broken".into()));
        assert!(matches!(&err, Error::Permanent(msg) if msg.starts_with("u: CODEC_ERROR")));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_last_modified() {
        assert_eq!(
            parse_last_modified("Tue, 15 Nov 1994 08:12:31 GMT"),
            Some(Utc.with_ymd_and_hms(1994, 11, 15, 8, 12, 31).unwrap())
        );
        assert_eq!(parse_last_modified("yesterday"), None);
        assert_eq!(parse_last_modified("1994-11-15T08:12:31Z"), None);
    }

    #[test]
    fn test_into_write() {
        let fetched_at = Utc::now();
        let download = Download {
            body: Bytes::from_static(b"x"),
            compressed: codec::compress(b"x").unwrap(),
            content_hash: hash::content_hash(b"x"),
            last_modified: None,
            fetched_at,
        };
        let (body, write) = download.into_write("https://example.com/x");
        assert_eq!(&body[..], b"x");
        assert_eq!(write.url, "https://example.com/x");
        assert_eq!(write.refreshed_at, fetched_at);
        assert_eq!(write.content_hash, hash::content_hash(b"x"));
    }
}
