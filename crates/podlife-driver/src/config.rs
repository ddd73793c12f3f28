//! Driver configuration.

/// Default number of merge workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default per-worker queue depth.
pub const DEFAULT_WORKER_QUEUE: usize = 256;

/// Parallelism settings for [`ReconciliationDriver`](crate::ReconciliationDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Number of merge workers (shards). At least 1.
    pub workers: usize,
    /// Events buffered per worker before the driver stops pulling.
    pub queue: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue: DEFAULT_WORKER_QUEUE,
        }
    }
}

impl DriverConfig {
    pub fn new(workers: usize, queue: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue: queue.max(1),
        }
    }

    /// Load from `PODLIFE_WORKERS` (default 4) and `PODLIFE_WORKER_QUEUE`
    /// (default 256). Unparseable or zero values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let positive = |var: &str, default: usize| {
            lookup(var)
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(default)
        };
        Self::new(
            positive("PODLIFE_WORKERS", DEFAULT_WORKERS),
            positive("PODLIFE_WORKER_QUEUE", DEFAULT_WORKER_QUEUE),
        )
    }

    /// Override the worker count (e.g. from a command-line flag).
    pub fn with_workers(self, workers: usize) -> Self {
        Self::new(workers, self.queue)
    }
}
