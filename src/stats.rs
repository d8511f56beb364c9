//! Stats sink consumed by the bounded execer.
//!
//! The engine only reports into this interface; collection, aggregation
//! and export belong to the embedding service. Reporting failures have
//! nowhere to go by construction: the methods return nothing.

use std::sync::Mutex;

/// Gauge name for aggregate resident memory of a process tree.
pub const TREE_MEM_GAUGE: &str = "process_tree_mem_bytes";

/// Counter name bumped when a process tree crosses its memory ceiling.
pub const CEILING_EXCEEDED_COUNTER: &str = "mem_ceiling_exceeded";

/// Counter name bumped when a spawn attempt fails.
pub const SPAWN_FAILURE_COUNTER: &str = "spawn_failure";

/// Receives named gauge samples and counter increments.
pub trait StatsReceiver: Send + Sync {
    fn gauge(&self, name: &str, value: u64);
    fn counter(&self, name: &str, delta: u64);
}

/// Discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NilStatsReceiver;

impl StatsReceiver for NilStatsReceiver {
    fn gauge(&self, _name: &str, _value: u64) {}
    fn counter(&self, _name: &str, _delta: u64) {}
}

/// In-memory receiver for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemoryStatsReceiver {
    gauges: Mutex<Vec<(String, u64)>>,
    counters: Mutex<Vec<(String, u64)>>,
}

impl MemoryStatsReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All gauge samples recorded for `name`, in order.
    pub fn gauge_samples(&self, name: &str) -> Vec<u64> {
        lock_unpoisoned(&self.gauges)
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Sum of all increments recorded for `name`.
    pub fn counter_total(&self, name: &str) -> u64 {
        lock_unpoisoned(&self.counters)
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .sum()
    }
}

impl StatsReceiver for MemoryStatsReceiver {
    fn gauge(&self, name: &str, value: u64) {
        lock_unpoisoned(&self.gauges).push((name.to_string(), value));
    }

    fn counter(&self, name: &str, delta: u64) {
        lock_unpoisoned(&self.counters).push((name.to_string(), delta));
    }
}

fn lock_unpoisoned<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
