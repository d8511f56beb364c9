use std::time::Duration;

const DEFAULT_MEM_CEILING_BYTES: u64 = 512 * 1024 * 1024;
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// Configuration for memory-bounded execution.
///
/// A process tree whose aggregate resident memory exceeds
/// `mem_ceiling_bytes` is terminated within one `sample_interval`
/// of first crossing the ceiling.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Maximum aggregate resident memory for the process tree, in bytes.
    pub mem_ceiling_bytes: u64,
    /// How often the process tree is measured.
    pub sample_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mem_ceiling_bytes: DEFAULT_MEM_CEILING_BYTES,
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
        }
    }
}

impl MonitorConfig {
    pub fn new(mem_ceiling_bytes: u64) -> Self {
        Self {
            mem_ceiling_bytes,
            ..Default::default()
        }
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }
}
