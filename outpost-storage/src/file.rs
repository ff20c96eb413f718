//! The append-only file backend.
//!
//! Every flush appends one JSON-encoded snapshot as a single line. Restore
//! scans the whole file and replays the last line that decodes; partial
//! trailing lines (from an interrupted write) are skipped. A missing file
//! restores nothing and is not an error.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;

use outpost_protocol::Snapshot;

use crate::StorageError;

/// Persists snapshots to a newline-delimited JSON file.
///
/// The configured path is the file itself; its parent directory must exist.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Creates a backend writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends one snapshot line.
    ///
    /// The line is written with a single `write_all` call, so a crash leaves
    /// at most one partial trailing line, which restore ignores.
    pub fn flush(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(snapshot).map_err(StorageError::Encode)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(StorageError::FileWrite)?;
        file.write_all(&line).map_err(StorageError::FileWrite)?;

        Ok(())
    }

    /// Reads back the most recent snapshot, if any.
    pub fn restore(&self) -> Result<Option<Snapshot>, StorageError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(StorageError::FileRead(error)),
        };

        let mut last = None;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(StorageError::FileRead)?;
            if line.is_empty() {
                continue;
            }
            // Lines that do not decode are either garbage or a truncated
            // tail; keep the previous good snapshot in both cases.
            if let Ok(snapshot) = serde_json::from_str::<Snapshot>(&line) {
                last = Some(snapshot);
            }
        }

        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use crate::MetricsStore;

    use super::*;

    #[test]
    fn missing_file_restores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("metrics.json"));
        assert_eq!(backend.restore().unwrap(), None);
    }

    #[test]
    fn flush_then_restore_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("metrics.json"));

        let store = MetricsStore::new();
        store.update_gauge("g", 3.14);
        store.update_counter("c", 2);
        backend.flush(&store.snapshot()).unwrap();

        let restored = MetricsStore::new();
        restored.restore(backend.restore().unwrap().unwrap());
        assert_eq!(restored.gauge("g"), Some(3.14));
        assert_eq!(restored.counter("c"), Some(2));
    }

    #[test]
    fn last_line_wins() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("metrics.json"));

        let store = MetricsStore::new();
        store.update_counter("c", 1);
        backend.flush(&store.snapshot()).unwrap();
        store.update_counter("c", 1);
        backend.flush(&store.snapshot()).unwrap();

        let snapshot = backend.restore().unwrap().unwrap();
        assert_eq!(snapshot.counters.get("c"), Some(&2));
    }

    #[test]
    fn partial_trailing_line_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let backend = FileBackend::new(&path);

        let store = MetricsStore::new();
        store.update_counter("c", 5);
        backend.flush(&store.snapshot()).unwrap();

        // Simulate a write cut short mid-line.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"gauges\":{\"x\":1.0},\"coun").unwrap();

        let snapshot = backend.restore().unwrap().unwrap();
        assert_eq!(snapshot.counters.get("c"), Some(&5));
        assert!(snapshot.gauges.is_empty());
    }

    #[test]
    fn empty_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        let store = MetricsStore::new();
        store.update_counter("c", 3);
        let backend = FileBackend::new(&path);
        backend.flush(&store.snapshot()).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"\n\n").unwrap();

        assert!(backend.restore().unwrap().is_some());
    }
}
