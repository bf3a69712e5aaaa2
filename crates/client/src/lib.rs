//! Client side of fetchcache.
//!
//! This crate provides the HTTP download pipeline, the bounded worker pool,
//! and the document caches built on top of the store in `fetchcache-core`.

pub mod cache;
pub mod fetch;
pub mod pool;

#[cfg(test)]
mod testing;

pub use cache::{DocumentCache, FreshnessHints, PassthroughCache, PersistentCache, open};
pub use fetch::{
    Download, Downloader, FetchConfig, HttpTransport, RawResponse, ReqwestTransport, RetryPolicy, TransportError,
};
pub use pool::{Batch, TaskHandle, WorkerPool};

pub use fetchcache_core::{AppConfig, Error};
