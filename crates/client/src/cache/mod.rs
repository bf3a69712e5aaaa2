//! Document caches consumed by the conversion pipeline.
//!
//! Collaborators only ever call [`DocumentCache::fetch`] and
//! [`DocumentCache::fetch_all`]; which implementation sits behind the trait
//! is a deployment choice made by [`open`].

mod batch;
pub mod passthrough;
pub mod persistent;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fetchcache_core::{AppConfig, Error};

pub use passthrough::PassthroughCache;
pub use persistent::PersistentCache;

/// Per-URL freshness hints for batch fetches.
///
/// A hint asserts that a version at least this recent is known to exist, so
/// a cached entry refreshed at or after it is served even past its TTL.
pub type FreshnessHints = HashMap<String, DateTime<Utc>>;

/// Fetch-one / fetch-many capability shared by every cache flavour.
#[async_trait]
pub trait DocumentCache: Send + Sync {
    /// Fetch one document.
    ///
    /// # Errors
    ///
    /// `Error::Transient` or `Error::Permanent` from the downloader.
    async fn fetch(&self, url: &str, freshness_hint: Option<DateTime<Utc>>) -> Result<Bytes, Error>;

    /// Fetch many documents, results aligned with `urls`.
    ///
    /// Fails as a whole with the first download error; downloads still
    /// running at that point are cancelled.
    async fn fetch_all(&self, urls: &[String], freshness_hints: Option<&FreshnessHints>) -> Result<Vec<Bytes>, Error>;

    /// Fetch many documents without failing the batch, one result per URL.
    async fn fetch_all_settled(
        &self, urls: &[String], freshness_hints: Option<&FreshnessHints>,
    ) -> Vec<Result<Bytes, Error>>;
}

/// Build the cache selected by `config`.
///
/// Persistent when `config.persist` is set, otherwise every call goes
/// straight to the network.
pub async fn open(config: &AppConfig) -> Result<Box<dyn DocumentCache>, Error> {
    if config.persist {
        Ok(Box::new(PersistentCache::open(config).await?))
    } else {
        Ok(Box::new(PassthroughCache::from_config(config)?))
    }
}
