//! Cache without storage.
//!
//! Every call is a direct, retrying download. Used for tests and
//! deployments that should not keep anything on disk.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fetchcache_core::{AppConfig, Error};

use super::batch::{self, Miss};
use super::{DocumentCache, FreshnessHints};
use crate::fetch::{Downloader, FetchConfig, ReqwestTransport, RetryPolicy};
use crate::pool::WorkerPool;

pub struct PassthroughCache {
    downloader: Downloader,
    pool: WorkerPool,
}

impl PassthroughCache {
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader, pool: WorkerPool::default() }
    }

    pub fn with_max_parallel_downloads(mut self, max: usize) -> Self {
        self.pool = WorkerPool::new(max);
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(FetchConfig::from(config))?;
        let downloader = Downloader::new(Arc::new(transport), RetryPolicy::from(config));
        Ok(Self::new(downloader).with_max_parallel_downloads(config.max_parallel_downloads))
    }
}

/// Every URL is a miss.
fn all_misses(urls: &[String]) -> (Vec<Option<Bytes>>, Vec<Miss>) {
    let hits = urls.iter().map(|_| None).collect();
    let misses = urls
        .iter()
        .enumerate()
        .map(|(index, url)| Miss { index, url: url.clone() })
        .collect();
    (hits, misses)
}

#[async_trait]
impl DocumentCache for PassthroughCache {
    /// Freshness hints are meaningless without storage and are ignored.
    async fn fetch(&self, url: &str, _freshness_hint: Option<DateTime<Utc>>) -> Result<Bytes, Error> {
        Ok(self.downloader.download(url).await?.body)
    }

    async fn fetch_all(&self, urls: &[String], _freshness_hints: Option<&FreshnessHints>) -> Result<Vec<Bytes>, Error> {
        let (hits, misses) = all_misses(urls);
        batch::fail_fast(&self.pool, &self.downloader, None, hits, misses).await
    }

    async fn fetch_all_settled(
        &self, urls: &[String], _freshness_hints: Option<&FreshnessHints>,
    ) -> Vec<Result<Bytes, Error>> {
        let (hits, misses) = all_misses(urls);
        batch::settled(&self.pool, &self.downloader, None, hits, misses).await
    }
}
