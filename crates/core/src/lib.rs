//! Core types and shared functionality for fetchcache.
//!
//! This crate provides:
//! - URL index and deduplicated content store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStats, CacheWrite, ContentRecord, TxMode, UrlEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
