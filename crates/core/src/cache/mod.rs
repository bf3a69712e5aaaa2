//! SQLite-backed store for fetched documents.
//!
//! This module provides a persistent, content-addressed cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - A URL index recording when each URL was last refreshed and which
//!   content it resolved to
//! - Deduplicated, zlib-compressed payloads keyed by a SHA-512 content hash
//! - Atomic write-back of both relations in one immediate transaction
//! - Automatic schema migrations
//! - WAL mode with separate reader and writer connections

pub mod codec;
pub mod connection;
pub mod content;
pub mod hash;
pub mod migrations;
pub mod timestamp;
pub mod url_index;

pub use crate::Error;

pub use connection::{CacheDb, TxMode};
pub use content::{CacheStats, CacheWrite, ContentRecord};
pub use url_index::UrlEntry;
