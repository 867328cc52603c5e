//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Worker and job lifecycle settings
    pub scheduler: SchedulerSettings,
    /// Render session pool settings
    pub pool: PoolSettings,
    /// Cleanup sweeper settings
    pub sweeper: SweeperSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    /// Number of workers, and so the maximum number of running jobs.
    pub max_concurrency: usize,
    /// Seconds to wait for a render session before failing a job.
    pub lease_timeout_secs: u64,
    /// Seconds shutdown waits for running jobs to drain.
    pub shutdown_grace_secs: u64,
}

/// Render session pool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Maximum live sessions. `0` means "same as max_concurrency".
    pub capacity: usize,
    /// Sessions created at start-up.
    pub prewarm: usize,
    /// Navigation attempts per job.
    pub navigation_retries: u32,
    /// Seconds to wait for a selector to match.
    pub element_wait_secs: u64,
}

impl PoolSettings {
    /// Capacity after applying the "follow max_concurrency" rule.
    pub fn effective_capacity(&self, max_concurrency: usize) -> usize {
        if self.capacity == 0 {
            max_concurrency.max(1)
        } else {
            self.capacity
        }
    }
}

/// Cleanup sweeper configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SweeperSettings {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Seconds a terminal job stays readable.
    pub retention_secs: u64,
    /// Seconds a lease may sit unused before it is considered abandoned.
    pub lease_idle_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
