//! URL index: requested URL to its most recent download.
//!
//! Staleness is decided from this relation alone, without touching the
//! (much larger) content payloads.

use super::connection::{CacheDb, TxMode};
use super::timestamp;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Index row for one requested URL.
///
/// Exists iff the URL has been downloaded successfully at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub url: String,
    pub last_refreshed: DateTime<Utc>,
    pub content_hash: String,
}

impl UrlEntry {
    /// Whether this entry may be served without going to the network.
    ///
    /// Fresh when the entry is at least as recent as the caller's hint, or
    /// when it was refreshed within `ttl` of `now`.
    pub fn is_fresh(&self, freshness_hint: Option<DateTime<Utc>>, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        if freshness_hint.is_some_and(|hint| self.last_refreshed >= hint) {
            return true;
        }
        match self.last_refreshed.checked_add_signed(ttl) {
            Some(expires) => expires >= now,
            None => true,
        }
    }
}

impl CacheDb {
    /// Get the index entry for a URL.
    ///
    /// Returns None if the URL has never been downloaded.
    pub async fn get_url_entry(&self, url: &str) -> Result<Option<UrlEntry>, Error> {
        let url = url.to_string();
        self.transact(TxMode::ReadShared, move |tx| -> Result<Option<UrlEntry>, Error> {
            let entry = tx
                .query_row(
                    "SELECT url, last_refreshed, content_hash FROM url_index WHERE url = ?1",
                    params![url],
                    |row| {
                        let refreshed: String = row.get(1)?;
                        Ok(UrlEntry {
                            url: row.get(0)?,
                            last_refreshed: timestamp::decode_column(1, &refreshed)?,
                            content_hash: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }
}

/// Insert or overwrite the index row for `url` inside an open transaction.
pub(crate) fn put_url_entry(
    tx: &rusqlite::Transaction<'_>, url: &str, content_hash: &str, refreshed_at: &DateTime<Utc>,
) -> Result<(), Error> {
    tx.execute(
        "INSERT INTO url_index (url, last_refreshed, content_hash) VALUES (?1, ?2, ?3)
         ON CONFLICT(url) DO UPDATE SET
            last_refreshed = excluded.last_refreshed,
            content_hash = excluded.content_hash",
        params![url, timestamp::encode(refreshed_at), content_hash],
    )?;
    Ok(())
}
