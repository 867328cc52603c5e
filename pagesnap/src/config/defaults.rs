//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the CPU helper,
//! and the `ConfigFile::default()` implementation.

use std::path::PathBuf;

use super::settings::*;

// =============================================================================
// CPU helpers
// =============================================================================

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// =============================================================================
// Scheduler
// =============================================================================

/// Default seconds to wait for a render session lease.
pub const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 30;

/// Default seconds shutdown waits for workers to drain.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Longest `timeout` or `wait_time` a request may ask for (one day).
pub const MAX_JOB_DURATION_SECS: u64 = 86_400;

// =============================================================================
// Pool
// =============================================================================

/// Default pool capacity (`0` follows `max_concurrency`).
pub const DEFAULT_POOL_CAPACITY: usize = 0;

/// Default number of sessions created at start-up.
pub const DEFAULT_POOL_PREWARM: usize = 0;

/// Default navigation attempts per job.
pub const DEFAULT_NAVIGATION_RETRIES: u32 = 3;

/// Default seconds to wait for a selector match.
pub const DEFAULT_ELEMENT_WAIT_SECS: u64 = 30;

// =============================================================================
// Sweeper
// =============================================================================

/// Default seconds between sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default seconds terminal jobs are retained.
pub const DEFAULT_RETENTION_SECS: u64 = 600;

/// Default seconds before an unused lease is reclaimed.
pub const DEFAULT_LEASE_IDLE_SECS: u64 = 300;

// =============================================================================
// Logging
// =============================================================================

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "pagesnap.log";

/// Default log file path (~/.pagesnap/pagesnap.log).
pub fn default_log_file() -> PathBuf {
    super::file::config_directory().join(DEFAULT_LOG_FILE_NAME)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSettings {
                max_concurrency: num_cpus(),
                lease_timeout_secs: DEFAULT_LEASE_TIMEOUT_SECS,
                shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            },
            pool: PoolSettings {
                capacity: DEFAULT_POOL_CAPACITY,
                prewarm: DEFAULT_POOL_PREWARM,
                navigation_retries: DEFAULT_NAVIGATION_RETRIES,
                element_wait_secs: DEFAULT_ELEMENT_WAIT_SECS,
            },
            sweeper: SweeperSettings {
                interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
                retention_secs: DEFAULT_RETENTION_SECS,
                lease_idle_secs: DEFAULT_LEASE_IDLE_SECS,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
        }
    }
}
