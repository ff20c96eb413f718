use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use outpost_protocol::{Metric, MetricValue, Snapshot};

/// The concurrent in-memory metric store.
///
/// Gauges are last-write-wins, counters accumulate. Each kind is guarded by
/// its own reader-writer lock, so reads of one kind never contend with
/// writes of the other. [`MetricsStore::snapshot`] acquires both locks in a
/// fixed order (gauges, then counters) to observe a consistent view.
#[derive(Debug, Default)]
pub struct MetricsStore {
    gauges: RwLock<BTreeMap<String, f64>>,
    counters: RwLock<BTreeMap<String, i64>>,
}

impl MetricsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gauge `name` to `value`, replacing any previous value.
    pub fn update_gauge(&self, name: &str, value: f64) {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        gauges.insert(name.to_owned(), value);
    }

    /// Adds `delta` to the counter `name`, starting from zero if absent.
    pub fn update_counter(&self, name: &str, delta: i64) {
        let mut counters = self
            .counters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *counters.entry(name.to_owned()).or_insert(0) += delta;
    }

    /// Returns the current value of the gauge `name`, if present.
    pub fn gauge(&self, name: &str) -> Option<f64> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        gauges.get(name).copied()
    }

    /// Returns the current sum of the counter `name`, if present.
    pub fn counter(&self, name: &str) -> Option<i64> {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters.get(name).copied()
    }

    /// Applies a metric and returns its post-update value.
    ///
    /// For counters this is the new cumulative sum, which the JSON update
    /// endpoint echoes back to the client.
    pub fn apply(&self, metric: &Metric) -> MetricValue {
        match metric.value {
            MetricValue::Gauge(value) => {
                self.update_gauge(&metric.id, value);
                MetricValue::Gauge(value)
            }
            MetricValue::Counter(delta) => {
                let mut counters = self
                    .counters
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                let sum = counters.entry(metric.id.clone()).or_insert(0);
                *sum += delta;
                MetricValue::Counter(*sum)
            }
        }
    }

    /// Returns a stable copy of all gauges.
    pub fn snapshot_gauges(&self) -> BTreeMap<String, f64> {
        self.gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns a stable copy of all counters.
    pub fn snapshot_counters(&self) -> BTreeMap<String, i64> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes a consistent snapshot of both kinds.
    pub fn snapshot(&self) -> Snapshot {
        // Lock order: gauges before counters, everywhere.
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);

        Snapshot {
            gauges: gauges.clone(),
            counters: counters.clone(),
        }
    }

    /// Replays a snapshot into the store.
    ///
    /// Gauges replace, counter values are added on top of whatever is
    /// already present, mirroring the regular update semantics.
    pub fn restore(&self, snapshot: Snapshot) {
        for (name, value) in snapshot.gauges {
            self.update_gauge(&name, value);
        }
        for (name, delta) in snapshot.counters {
            self.update_counter(&name, delta);
        }
    }

    /// Clears both maps.
    pub fn reset(&self) {
        self.gauges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn counter_accumulates() {
        let store = MetricsStore::new();
        store.update_counter("hits", 5);
        store.update_counter("hits", 7);
        assert_eq!(store.counter("hits"), Some(12));
    }

    #[test]
    fn gauge_replaces() {
        let store = MetricsStore::new();
        store.update_gauge("temp", 1.5);
        store.update_gauge("temp", 2.25);
        assert_eq!(store.gauge("temp"), Some(2.25));
    }

    #[test]
    fn missing_metrics_absent() {
        let store = MetricsStore::new();
        assert_eq!(store.gauge("nope"), None);
        assert_eq!(store.counter("nope"), None);
    }

    #[test]
    fn apply_echoes_post_update_value() {
        let store = MetricsStore::new();
        store.apply(&Metric::counter("req", 3));
        let value = store.apply(&Metric::counter("req", 3));
        assert_eq!(value, MetricValue::Counter(6));

        let value = store.apply(&Metric::gauge("temp", 36.6));
        assert_eq!(value, MetricValue::Gauge(36.6));
    }

    #[test]
    fn snapshot_round_trip() {
        let store = MetricsStore::new();
        store.update_gauge("g", 3.14);
        store.update_counter("c", 2);

        let snapshot = store.snapshot();

        let restored = MetricsStore::new();
        restored.restore(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn empty_store_empty_snapshot() {
        assert!(MetricsStore::new().snapshot().is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let store = MetricsStore::new();
        store.update_gauge("g", 1.0);
        store.update_counter("c", 1);
        store.reset();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn concurrent_counter_writes_sum_up() {
        let store = Arc::new(MetricsStore::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    store.update_counter("hits", 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.counter("hits"), Some(8000));
    }
}
