//! Samplers for the agent's poll tick.
//!
//! Two collectors run concurrently on every tick: [`RuntimeCollector`]
//! reports the allocator and process-memory gauges under a fixed set of
//! names, [`HostCollector`] reports machine-wide memory and CPU load. The
//! gauge names are part of the wire contract and must not change.

use std::collections::HashMap;

use rand::Rng;
use sysinfo::{Pid, ProcessRefreshKind, System};

use crate::alloc::AllocStats;

/// Samples process-level runtime gauges.
///
/// The fixed enumeration covers allocator traffic (from the counting
/// allocator), process memory (from the OS), and a set of collector
/// internals that have no analogue in this runtime and always report zero.
/// `RandomValue` is sampled uniformly on every poll.
#[derive(Debug)]
pub struct RuntimeCollector {
    system: System,
    pid: Option<Pid>,
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeCollector {
    /// Creates the collector; resolving the own pid can fail on exotic
    /// platforms, in which case the process gauges read zero.
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Takes one sample.
    pub fn sample(&mut self) -> HashMap<String, f64> {
        let stats = AllocStats::read();

        let (resident, virtual_mem) = match self.pid {
            Some(pid) => {
                self.system
                    .refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory());
                self.system
                    .process(pid)
                    .map(|process| (process.memory(), process.virtual_memory()))
                    .unwrap_or_default()
            }
            None => (0, 0),
        };

        let heap_alloc = stats.live_bytes() as f64;
        let heap_sys = virtual_mem as f64;
        let heap_inuse = resident as f64;

        let mut metrics = HashMap::new();
        metrics.insert("Alloc".to_owned(), heap_alloc);
        metrics.insert("TotalAlloc".to_owned(), stats.total_allocated as f64);
        metrics.insert("Mallocs".to_owned(), stats.allocations as f64);
        metrics.insert("Frees".to_owned(), stats.frees as f64);
        metrics.insert("HeapAlloc".to_owned(), heap_alloc);
        metrics.insert("HeapObjects".to_owned(), stats.live_objects() as f64);
        metrics.insert("HeapSys".to_owned(), heap_sys);
        metrics.insert("HeapInuse".to_owned(), heap_inuse);
        metrics.insert(
            "HeapIdle".to_owned(),
            (virtual_mem.saturating_sub(resident)) as f64,
        );
        metrics.insert("Sys".to_owned(), heap_sys);

        // Collector- and arena-specific gauges with no analogue here; they
        // stay in the enumeration so dashboards keep their shape.
        for name in [
            "HeapReleased",
            "StackInuse",
            "StackSys",
            "NumGC",
            "NumForcedGC",
            "PauseTotalNs",
            "LastGC",
            "GCCPUFraction",
            "Lookups",
            "MCacheInuse",
            "MCacheSys",
            "MSpanInuse",
            "MSpanSys",
            "BuckHashSys",
            "NextGC",
            "OtherSys",
        ] {
            metrics.insert(name.to_owned(), 0.0);
        }

        metrics.insert("RandomValue".to_owned(), rand::thread_rng().gen::<f64>());

        metrics
    }
}

/// Samples machine-wide memory and CPU gauges.
#[derive(Debug)]
pub struct HostCollector {
    system: System,
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCollector {
    /// Creates the collector.
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Takes one sample.
    ///
    /// CPU utilization is computed against the previous refresh, so the
    /// first tick reports zero and the values settle from the second tick
    /// on.
    pub fn sample(&mut self) -> HashMap<String, f64> {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let mut metrics = HashMap::new();
        metrics.insert("TotalMemory".to_owned(), self.system.total_memory() as f64);
        metrics.insert("FreeMemory".to_owned(), self.system.free_memory() as f64);
        metrics.insert(
            "CPUutilization1".to_owned(),
            self.system.global_cpu_info().cpu_usage() as f64,
        );

        metrics
    }
}
