//! Unified error types for fetchcache.
//!
//! Each variant's display string starts with a stable upper-case code so
//! callers and logs can match on the failure kind without downcasting.

use tokio_rusqlite::rusqlite;

/// Unified error types for the fetch cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The origin signalled temporary overload (HTTP 503/429) on the final attempt.
    #[error("TRANSIENT_FAILURE: {0}")]
    Transient(String),

    /// Any other network or protocol failure on the final attempt.
    #[error("PERMANENT_FAILURE: {0}")]
    Permanent(String),

    /// Database operation failed.
    #[error("STORAGE_FAILURE: {0}")]
    Storage(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_FAILURE: migration failed: {0}")]
    MigrationFailed(String),

    /// Payload compression, decompression or timestamp decoding failed.
    #[error("CODEC_ERROR: {0}")]
    Codec(String),

    /// A download task panicked or could not be joined.
    #[error("TASK_FAILED: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Whether the failure came from origin overload and may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Whether the failure came from the storage backend.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::MigrationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Storage(tokio_rusqlite::Error::Close(c)),
            _ => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Storage(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(tokio_rusqlite::Error::Error(err))
    }
}
