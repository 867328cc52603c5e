//! Render session pool configuration.

use std::time::Duration;

use crate::config::DEFAULT_ELEMENT_WAIT_SECS;
use crate::engine::SessionConfig;

pub use crate::config::DEFAULT_NAVIGATION_RETRIES;

/// Default upper bound on waiting for a selector match.
pub const DEFAULT_ELEMENT_WAIT: Duration = Duration::from_secs(DEFAULT_ELEMENT_WAIT_SECS);

/// Pool sizing and baseline session settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of sessions leased at once.
    pub capacity: usize,
    /// Sessions created eagerly at startup.
    pub prewarm: usize,
    /// Baseline configuration for every new session.
    pub session: SessionConfig,
}

impl PoolConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            prewarm: 0,
            session: SessionConfig::default(),
        }
    }

    pub fn with_prewarm(mut self, prewarm: usize) -> Self {
        self.prewarm = prewarm;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(crate::config::num_cpus())
    }
}

impl From<&crate::config::ConfigFile> for PoolConfig {
    fn from(config: &crate::config::ConfigFile) -> Self {
        Self::new(config.pool.effective_capacity(config.scheduler.max_concurrency))
            .with_prewarm(config.pool.prewarm)
    }
}
