//! Deduplicated content store and the atomic write-back path.
//!
//! Payloads are keyed by their content hash. Many URLs may point at one
//! record when their bytes are identical; the record keeps the URL that
//! first produced it.

use super::connection::{CacheDb, TxMode};
use super::url_index::put_url_entry;
use super::{codec, timestamp};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// A stored payload and its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub hash: String,
    /// URL of the fetch that first produced this hash.
    pub origin_url: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_refreshed: DateTime<Utc>,
    /// zlib-compressed payload.
    pub payload: Vec<u8>,
}

/// One successful download to be written back.
#[derive(Debug, Clone)]
pub struct CacheWrite {
    pub url: String,
    pub content_hash: String,
    /// zlib-compressed payload.
    pub compressed: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
    pub refreshed_at: DateTime<Utc>,
}

/// Row counts and stored size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub url_entries: u64,
    pub content_records: u64,
    /// Sum of compressed payload sizes.
    pub payload_bytes: u64,
}

impl CacheDb {
    /// Get the decompressed payload for a content hash.
    ///
    /// Returns None if no record exists for the hash.
    pub async fn get_content(&self, hash: &str) -> Result<Option<Vec<u8>>, Error> {
        let hash = hash.to_string();
        let stored = self
            .transact(TxMode::ReadShared, move |tx| -> Result<Option<Vec<u8>>, Error> {
                let payload = tx
                    .query_row("SELECT payload FROM content_records WHERE hash = ?1", params![hash], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(payload)
            })
            .await?;

        stored.map(|payload| codec::decompress(&payload)).transpose()
    }

    /// Get a full content record, payload still compressed.
    pub async fn get_content_record(&self, hash: &str) -> Result<Option<ContentRecord>, Error> {
        let hash = hash.to_string();
        self.transact(TxMode::ReadShared, move |tx| -> Result<Option<ContentRecord>, Error> {
            let record = tx
                .query_row(
                    "SELECT hash, origin_url, last_modified, last_refreshed, payload
                     FROM content_records WHERE hash = ?1",
                    params![hash],
                    |row| {
                        let modified: Option<String> = row.get(2)?;
                        let refreshed: String = row.get(3)?;
                        Ok(ContentRecord {
                            hash: row.get(0)?,
                            origin_url: row.get(1)?,
                            last_modified: modified.map(|m| timestamp::decode_column(2, &m)).transpose()?,
                            last_refreshed: timestamp::decode_column(3, &refreshed)?,
                            payload: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Write back one download atomically.
    ///
    /// The URL entry is inserted or repointed at the new hash. The content
    /// record is inserted when the hash is new; when it already exists only
    /// its `last_refreshed` moves and `origin_url` keeps the first writer.
    /// Both writes commit together or not at all.
    pub async fn upsert(&self, write: CacheWrite) -> Result<(), Error> {
        self.transact(TxMode::WriteExclusive, move |tx| -> Result<(), Error> {
            let refreshed = timestamp::encode(&write.refreshed_at);
            let modified = write.last_modified.as_ref().map(timestamp::encode);

            put_url_entry(tx, &write.url, &write.content_hash, &write.refreshed_at)?;
            tx.execute(
                "INSERT INTO content_records (hash, origin_url, last_modified, last_refreshed, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(hash) DO UPDATE SET last_refreshed = excluded.last_refreshed",
                params![&write.content_hash, &write.url, &modified, &refreshed, &write.compressed],
            )?;
            Ok(())
        })
        .await
    }

    /// Count index rows, content records and stored bytes.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        self.transact(TxMode::ReadShared, |tx| -> Result<CacheStats, Error> {
            let url_entries: i64 = tx.query_row("SELECT COUNT(*) FROM url_index", [], |row| row.get(0))?;
            let (content_records, payload_bytes): (i64, i64) = tx.query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(payload)), 0) FROM content_records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(CacheStats {
                url_entries: url_entries.max(0) as u64,
                content_records: content_records.max(0) as u64,
                payload_bytes: payload_bytes.max(0) as u64,
            })
        })
        .await
    }
}
