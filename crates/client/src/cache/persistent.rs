//! SQLite-backed document cache.
//!
//! Every request walks the same path: look the URL up in the index, serve
//! the stored payload if the entry is fresh, otherwise download, write the
//! result back and return the downloaded bytes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fetchcache_core::{AppConfig, CacheDb, Error};

use super::batch::{self, Miss};
use super::{DocumentCache, FreshnessHints};
use crate::fetch::{Download, Downloader, FetchConfig, ReqwestTransport, RetryPolicy};
use crate::pool::WorkerPool;

/// Default staleness window.
pub const DEFAULT_TTL_HOURS: i64 = 6;

/// Persistent, content-addressed HTTP cache.
///
/// Owns its store handle and worker pool; construct once and share by
/// reference.
pub struct PersistentCache {
    db: CacheDb,
    downloader: Downloader,
    pool: WorkerPool,
    ttl: chrono::Duration,
}

impl PersistentCache {
    /// Cache over an open store, with the default TTL and pool size.
    pub fn new(db: CacheDb, downloader: Downloader) -> Self {
        Self { db, downloader, pool: WorkerPool::default(), ttl: chrono::Duration::hours(DEFAULT_TTL_HOURS) }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_parallel_downloads(mut self, max: usize) -> Self {
        self.pool = WorkerPool::new(max);
        self
    }

    /// Open the store at `config.db_path` with an HTTP downloader.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        let transport = ReqwestTransport::new(FetchConfig::from(config))?;
        let downloader = Downloader::new(Arc::new(transport), RetryPolicy::from(config));

        Ok(Self::new(db, downloader)
            .with_ttl(config.ttl())
            .with_max_parallel_downloads(config.max_parallel_downloads))
    }

    /// The underlying store, for diagnostics.
    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Serve `url` from the store if a fresh entry exists.
    ///
    /// Read failures and dangling index entries count as misses.
    async fn lookup(&self, url: &str, freshness_hint: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Bytes> {
        let entry = match self.db.get_url_entry(url).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(url, "cache miss");
                return None;
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "cache index read failed, treating as miss");
                return None;
            }
        };

        if !entry.is_fresh(freshness_hint, self.ttl, now) {
            tracing::debug!(url, last_refreshed = %entry.last_refreshed, "cache entry stale");
            return None;
        }

        match self.db.get_content(&entry.content_hash).await {
            Ok(Some(payload)) => {
                tracing::debug!(url, hash = %entry.content_hash, "cache hit");
                Some(Bytes::from(payload))
            }
            Ok(None) => {
                tracing::warn!(url, hash = %entry.content_hash, "index entry points at missing content");
                None
            }
            Err(err) => {
                tracing::warn!(url, hash = %entry.content_hash, error = %err, "cached content unreadable");
                None
            }
        }
    }

    /// Serve what the store can and list the URLs that need a download.
    async fn classify(
        &self, urls: &[String], freshness_hints: Option<&FreshnessHints>,
    ) -> (Vec<Option<Bytes>>, Vec<Miss>) {
        let now = Utc::now();
        let mut hits = Vec::with_capacity(urls.len());
        let mut misses = Vec::new();

        for (index, url) in urls.iter().enumerate() {
            let hint = freshness_hints.and_then(|hints| hints.get(url)).copied();
            match self.lookup(url, hint, now).await {
                Some(body) => hits.push(Some(body)),
                None => {
                    hits.push(None);
                    misses.push(Miss { index, url: url.clone() });
                }
            }
        }

        (hits, misses)
    }
}

/// Write a download back to the store and hand its bytes to the caller.
///
/// A failed write is logged and otherwise ignored: the caller still gets
/// the bytes, the entry simply stays uncached.
pub(crate) async fn write_back(db: &CacheDb, url: &str, download: Download) -> Bytes {
    let (body, write) = download.into_write(url);
    match db.upsert(write).await {
        Ok(()) => tracing::debug!(url, bytes = body.len(), "cached download"),
        Err(err) => tracing::warn!(url, error = %err, "cache write-back failed, returning uncached bytes"),
    }
    body
}

#[async_trait]
impl DocumentCache for PersistentCache {
    async fn fetch(&self, url: &str, freshness_hint: Option<DateTime<Utc>>) -> Result<Bytes, Error> {
        if let Some(body) = self.lookup(url, freshness_hint, Utc::now()).await {
            return Ok(body);
        }

        let download = self.downloader.download(url).await?;
        Ok(write_back(&self.db, url, download).await)
    }

    async fn fetch_all(&self, urls: &[String], freshness_hints: Option<&FreshnessHints>) -> Result<Vec<Bytes>, Error> {
        let (hits, misses) = self.classify(urls, freshness_hints).await;
        batch::fail_fast(&self.pool, &self.downloader, Some(&self.db), hits, misses).await
    }

    async fn fetch_all_settled(
        &self, urls: &[String], freshness_hints: Option<&FreshnessHints>,
    ) -> Vec<Result<Bytes, Error>> {
        let (hits, misses) = self.classify(urls, freshness_hints).await;
        batch::settled(&self.pool, &self.downloader, Some(&self.db), hits, misses).await
    }
}
