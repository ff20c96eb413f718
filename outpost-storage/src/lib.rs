//! The concurrent metric store and its durability backends.
//!
//! [`MetricsStore`] is the single in-memory source of truth on the server.
//! Snapshots taken from it flow into one of three [`StoreBackend`]s: plain
//! memory (no durability), an append-only newline-delimited JSON file, or a
//! Postgres table written transactionally under a monotonic load id. The
//! [`retry`] module provides the shared classification of transient errors
//! and the fixed backoff schedule used for database statements and agent
//! shipments alike.

#![warn(missing_docs)]

mod backend;
mod file;
mod postgres;
pub mod retry;
mod store;

pub use self::backend::*;
pub use self::file::*;
pub use self::postgres::*;
pub use self::store::*;

/// An error raised by a durability backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading the snapshot file failed.
    #[error("can't read metrics from file")]
    FileRead(#[source] std::io::Error),

    /// Appending to the snapshot file failed.
    #[error("can't write metrics to file")]
    FileWrite(#[source] std::io::Error),

    /// A snapshot line did not encode.
    #[error("can't encode snapshot")]
    Encode(#[source] serde_json::Error),

    /// A database operation failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// The database operation exceeded its deadline.
    #[error("database operation timed out")]
    DatabaseTimeout,
}
