use std::sync::Arc;
use std::time::Duration;

use outpost_storage::{MetricsStore, StoreBackend};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Periodically persists store snapshots through the selected backend.
///
/// Flush failures are logged and the ticker keeps running; durability
/// problems must never take the ingestion path down. On shutdown one final
/// snapshot is written so a clean exit loses nothing.
#[derive(Debug)]
pub struct Flusher {
    store: Arc<MetricsStore>,
    backend: StoreBackend,
    interval: Duration,
}

impl Flusher {
    /// Creates a flusher writing every `interval`.
    pub fn new(store: Arc<MetricsStore>, backend: StoreBackend, interval: Duration) -> Self {
        Self {
            store,
            backend,
            interval,
        }
    }

    /// Runs until the shutdown channel fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if matches!(self.backend, StoreBackend::Memory) {
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush().await,
                _ = shutdown.changed() => {
                    self.flush().await;
                    outpost_log::info!("flusher stopped");
                    return;
                }
            }
        }
    }

    async fn flush(&self) {
        let snapshot = self.store.snapshot();
        match self.backend.flush(&snapshot).await {
            Ok(()) => {
                outpost_log::info!(
                    backend = self.backend.name(),
                    metrics = snapshot.len(),
                    "snapshot saved"
                );
            }
            Err(error) => {
                outpost_log::error!(error = %error, "can't save snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use outpost_storage::FileBackend;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn flushes_periodically_and_once_more_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let store = Arc::new(MetricsStore::new());
        store.update_counter("c", 1);

        let backend = StoreBackend::File(FileBackend::new(&path));
        let flusher = Flusher::new(Arc::clone(&store), backend, Duration::from_secs(10));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(flusher.run(shutdown_rx));

        // Past the first period: one flush with c = 1.
        tokio::time::sleep(Duration::from_secs(11)).await;
        let snapshot = FileBackend::new(&path).restore().unwrap().unwrap();
        assert_eq!(snapshot.counters.get("c"), Some(&1));

        // The shutdown flush captures the tail written after the last tick.
        store.update_counter("c", 1);
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        let snapshot = FileBackend::new(&path).restore().unwrap().unwrap();
        assert_eq!(snapshot.counters.get("c"), Some(&2));
    }

    #[tokio::test]
    async fn memory_backend_exits_immediately() {
        let flusher = Flusher::new(
            Arc::new(MetricsStore::new()),
            StoreBackend::Memory,
            Duration::from_secs(1),
        );

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        // Must return without waiting for a shutdown signal.
        flusher.run(shutdown_rx).await;
    }
}
