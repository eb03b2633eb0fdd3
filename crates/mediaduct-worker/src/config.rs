use std::time::Duration;

use mediaduct_core::config::Config;

const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_POLL_WAIT_MS: u64 = 1000;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Tuning knobs for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of deliveries handled concurrently.
    pub max_workers: usize,
    /// How long a single receive call waits for a message before returning
    /// empty-handed.
    pub poll_wait: Duration,
    /// Processing attempts allowed per item before it is marked FAILED.
    /// Kept equal to the queue's max receive count so the metadata record
    /// and the dead-letter queue agree on when an item is given up on.
    pub max_attempts: i32,
    /// How long shutdown waits for in-flight handlers to finish.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            poll_wait: Duration::from_millis(DEFAULT_POLL_WAIT_MS),
            max_attempts: mediaduct_core::constants::DEFAULT_MAX_RECEIVE_COUNT as i32,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.worker_max_workers(),
            poll_wait: Duration::from_millis(config.worker_poll_interval_ms()),
            max_attempts: config.queue_max_receive_count() as i32,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_queue_budget() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.poll_wait, Duration::from_millis(1000));
        assert_eq!(
            config.max_attempts,
            mediaduct_core::constants::DEFAULT_MAX_RECEIVE_COUNT as i32
        );
    }
}
