//! Concurrent download of a batch's cache misses.
//!
//! `hits` holds the bodies already served from the store (`None` for
//! misses); `misses` is downloaded on the pool. Results come back in input
//! order.

use std::collections::HashMap;

use bytes::Bytes;
use fetchcache_core::{CacheDb, Error};

use super::persistent::write_back;
use crate::fetch::{Download, Downloader};
use crate::pool::{Batch, TaskHandle, WorkerPool};

/// A URL that has to go to the network, with its position in the input.
#[derive(Debug, Clone)]
pub(crate) struct Miss {
    pub index: usize,
    pub url: String,
}

type Downloads = Batch<Result<Download, Error>>;

fn submit_all(pool: &WorkerPool, downloader: &Downloader, misses: Vec<Miss>) -> (Downloads, HashMap<TaskHandle, Miss>) {
    let mut batch = pool.batch();
    let mut pending = HashMap::with_capacity(misses.len());

    for miss in misses {
        let downloader = downloader.clone();
        let url = miss.url.clone();
        let handle = batch.submit(async move { downloader.download(&url).await });
        pending.insert(handle, miss);
    }
    (batch, pending)
}

/// Resolve a batch that fails as a whole on the first failed download.
pub(crate) async fn fail_fast(
    pool: &WorkerPool, downloader: &Downloader, store: Option<&CacheDb>, mut hits: Vec<Option<Bytes>>,
    misses: Vec<Miss>,
) -> Result<Vec<Bytes>, Error> {
    tracing::debug!(total = hits.len(), misses = misses.len(), "resolving fail-fast batch");
    let (mut batch, mut pending) = submit_all(pool, downloader, misses);

    while let Some(joined) = batch.next().await {
        let (handle, result) = match joined {
            Ok(done) => done,
            Err(err) => return Err(abort(&mut batch, &mut pending, store, err).await),
        };
        let Some(miss) = pending.remove(&handle) else { continue };

        match result {
            Ok(download) => hits[miss.index] = Some(finish(store, &miss.url, download).await),
            Err(err) => {
                tracing::warn!(url = %miss.url, error = %err, "download failed");
                return Err(abort(&mut batch, &mut pending, store, err).await);
            }
        }
    }

    hits.into_iter()
        .map(|slot| slot.ok_or_else(|| Error::TaskFailed("download task did not report".into())))
        .collect()
}

/// Resolve a batch where every URL gets its own result.
pub(crate) async fn settled(
    pool: &WorkerPool, downloader: &Downloader, store: Option<&CacheDb>, hits: Vec<Option<Bytes>>,
    misses: Vec<Miss>,
) -> Vec<Result<Bytes, Error>> {
    tracing::debug!(total = hits.len(), misses = misses.len(), "resolving settled batch");
    let mut slots: Vec<Option<Result<Bytes, Error>>> = hits.into_iter().map(|hit| hit.map(Ok)).collect();
    let (mut batch, mut pending) = submit_all(pool, downloader, misses);

    while let Some(joined) = batch.next().await {
        let (handle, result) = match joined {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(error = %err, "download task failed");
                continue;
            }
        };
        let Some(miss) = pending.remove(&handle) else { continue };

        slots[miss.index] = Some(match result {
            Ok(download) => Ok(finish(store, &miss.url, download).await),
            Err(err) => Err(err),
        });
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(Error::TaskFailed("download task did not report".into()))))
        .collect()
}

/// Cancel what is still running and wait for the batch to drain.
///
/// Downloads that completed before the cancellation took effect are still
/// written back; their bytes are dropped.
async fn abort(
    batch: &mut Downloads, pending: &mut HashMap<TaskHandle, Miss>, store: Option<&CacheDb>, err: Error,
) -> Error {
    let cancelled = batch.cancel_all();
    tracing::warn!(
        cancelled,
        unreported = batch.len(),
        error = %err,
        "failing batch, cancelling remaining downloads"
    );

    while let Some(joined) = batch.next().await {
        if let Ok((handle, Ok(download))) = joined
            && let Some(miss) = pending.remove(&handle)
        {
            finish(store, &miss.url, download).await;
        }
    }

    err
}

async fn finish(store: Option<&CacheDb>, url: &str, download: Download) -> Bytes {
    match store {
        Some(db) => write_back(db, url, download).await,
        None => download.body,
    }
}
