//! Scheduler configuration.

use std::time::Duration;

use crate::config::{DEFAULT_LEASE_TIMEOUT_SECS, DEFAULT_SHUTDOWN_GRACE_SECS};
use crate::pool::{PoolConfig, DEFAULT_ELEMENT_WAIT, DEFAULT_NAVIGATION_RETRIES};
use crate::sweeper::SweeperConfig;

/// Default maximum wait for a free render session.
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(DEFAULT_LEASE_TIMEOUT_SECS);

/// Default pause between navigation attempts.
pub const DEFAULT_NAVIGATION_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default time workers get to drain on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS);

/// Configuration for [`super::Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of workers, and therefore the ceiling on running jobs.
    pub max_concurrency: usize,
    /// Longest a worker waits for a lease before failing the job.
    pub lease_timeout: Duration,
    /// Navigation attempts per job.
    pub navigation_retries: u32,
    pub navigation_retry_delay: Duration,
    /// Upper bound on waiting for a selector to match.
    pub element_wait: Duration,
    pub shutdown_grace: Duration,
    pub pool: PoolConfig,
    pub sweeper: SweeperConfig,
}

impl SchedulerConfig {
    /// Config with `max_concurrency` workers and a pool of the same size.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            max_concurrency,
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            navigation_retries: DEFAULT_NAVIGATION_RETRIES,
            navigation_retry_delay: DEFAULT_NAVIGATION_RETRY_DELAY,
            element_wait: DEFAULT_ELEMENT_WAIT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            pool: PoolConfig::new(max_concurrency),
            sweeper: SweeperConfig::default(),
        }
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_navigation_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.navigation_retries = retries.max(1);
        self.navigation_retry_delay = delay;
        self
    }

    pub fn with_element_wait(mut self, wait: Duration) -> Self {
        self.element_wait = wait;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_sweeper(mut self, sweeper: SweeperConfig) -> Self {
        self.sweeper = sweeper;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(crate::config::num_cpus())
    }
}

impl From<&crate::config::ConfigFile> for SchedulerConfig {
    fn from(config: &crate::config::ConfigFile) -> Self {
        let scheduler = &config.scheduler;
        Self::new(scheduler.max_concurrency)
            .with_lease_timeout(Duration::from_secs(scheduler.lease_timeout_secs))
            .with_navigation_retries(config.pool.navigation_retries, DEFAULT_NAVIGATION_RETRY_DELAY)
            .with_element_wait(Duration::from_secs(config.pool.element_wait_secs))
            .with_shutdown_grace(Duration::from_secs(scheduler.shutdown_grace_secs))
            .with_pool(PoolConfig::from(config))
            .with_sweeper(SweeperConfig::from(config))
    }
}
