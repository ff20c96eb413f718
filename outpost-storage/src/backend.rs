use outpost_config::StorePlace;
use outpost_protocol::Snapshot;

use crate::{FileBackend, MetricsStore, PostgresBackend, StorageError};

/// The selected durability backend.
///
/// Constructed once at startup from the configured [`StorePlace`] and owned
/// by the flusher. The memory variant makes every flush a no-op.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// No durability.
    Memory,
    /// Append-only snapshot file.
    File(FileBackend),
    /// Relational store.
    Postgres(PostgresBackend),
}

impl StoreBackend {
    /// Opens the backend for the given store place.
    ///
    /// For the database this connects and bootstraps the schema; for the
    /// file nothing is opened until the first flush.
    pub async fn open(place: StorePlace) -> Result<Self, StorageError> {
        match place {
            StorePlace::Memory => Ok(Self::Memory),
            StorePlace::File(path) => Ok(Self::File(FileBackend::new(path))),
            StorePlace::Database(dsn) => {
                Ok(Self::Postgres(PostgresBackend::connect(&dsn).await?))
            }
        }
    }

    /// Persists one snapshot.
    pub async fn flush(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        match self {
            Self::Memory => Ok(()),
            Self::File(file) => file.flush(snapshot),
            Self::Postgres(postgres) => postgres.flush(snapshot).await,
        }
    }

    /// Restores the latest snapshot into the store, if one exists.
    pub async fn restore(&self, store: &MetricsStore) -> Result<(), StorageError> {
        match self {
            Self::Memory => Ok(()),
            Self::File(file) => {
                if let Some(snapshot) = file.restore()? {
                    store.restore(snapshot);
                }
                Ok(())
            }
            Self::Postgres(postgres) => postgres.restore(store).await,
        }
    }

    /// Returns a human-readable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File(_) => "file",
            Self::Postgres(_) => "database",
        }
    }
}
