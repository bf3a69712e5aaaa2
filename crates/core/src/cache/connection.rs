//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), running migrations, and
//! routing transactions to the reader or writer connection.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

const WRITER_PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA busy_timeout=5000;";

const READER_PRAGMAS: &str = "PRAGMA temp_store=MEMORY;
     PRAGMA busy_timeout=5000;
     PRAGMA query_only=ON;";

/// Isolation used for a single store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Deferred transaction on the reader connection. Readers never block
    /// each other and do not keep a writer from starting.
    ReadShared,
    /// Immediate transaction on the writer connection. The write lock is
    /// taken on entry, so at most one write transaction runs at a time.
    WriteExclusive,
}

impl TxMode {
    fn behavior(self) -> TransactionBehavior {
        match self {
            TxMode::ReadShared => TransactionBehavior::Deferred,
            TxMode::WriteExclusive => TransactionBehavior::Immediate,
        }
    }
}

/// Cache database handle.
///
/// Wraps tokio-rusqlite connections that run database operations on
/// background threads. File-backed databases get a dedicated reader
/// connection next to the writer; in-memory databases share one.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) reader: Connection,
    pub(crate) writer: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file (and missing parent directories) if it doesn't exist,
    /// applies performance pragmas, and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::MigrationFailed(format!("cannot create {}: {e}", parent.display())))?;
        }

        let writer = Connection::open(path).await.map_err(|e| Error::Storage(e.into()))?;
        apply_pragmas(&writer, WRITER_PRAGMAS).await?;
        migrations::run(&writer).await?;

        let reader = Connection::open(path).await.map_err(|e| Error::Storage(e.into()))?;
        apply_pragmas(&reader, READER_PRAGMAS).await?;

        tracing::debug!(path = %path.display(), "opened cache database");

        Ok(Self { reader, writer })
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Storage(e.into()))?;

        apply_pragmas(&conn, WRITER_PRAGMAS).await?;
        migrations::run(&conn).await?;

        Ok(Self { reader: conn.clone(), writer: conn })
    }

    /// Run `f` inside one transaction of the given mode.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err` or the commit itself fails.
    pub async fn transact<T, F>(&self, mode: TxMode, f: F) -> Result<T, Error>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = match mode {
            TxMode::ReadShared => &self.reader,
            TxMode::WriteExclusive => &self.writer,
        };

        conn.call(move |conn| -> Result<T, Error> {
            let tx = conn.transaction_with_behavior(mode.behavior())?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .map_err(Error::from)
    }
}

async fn apply_pragmas(conn: &Connection, pragmas: &'static str) -> Result<(), Error> {
    conn.call(move |conn| {
        conn.execute_batch(pragmas)?;
        Ok(())
    })
    .await
    .map_err(Error::Storage)
}
