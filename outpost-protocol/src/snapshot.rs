use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A consistent copy of the metric store.
///
/// Snapshots are taken atomically with respect to writers and are the unit
/// of persistence: the file backend appends one JSON-encoded snapshot per
/// line, the database backend writes one load per snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All gauges by name.
    pub gauges: BTreeMap<String, f64>,
    /// All counters by name.
    pub counters: BTreeMap<String, i64>,
}

impl Snapshot {
    /// Returns `true` if the snapshot holds no metrics at all.
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    /// Returns the total number of metrics in the snapshot.
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }
}
