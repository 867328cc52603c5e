//! Periodic cleanup of stale scheduler state.
//!
//! Each sweep:
//! 1. Removes terminal jobs that finished longer ago than the retention
//!    threshold
//! 2. Closes pooled sessions that sat idle past the idle threshold
//! 3. Reclaims leases unused past the idle threshold whose owning job is no
//!    longer running
//!
//! Lease ownership is re-checked under the scheduler state lock immediately
//! before a lease is reclaimed, so a running job never loses its session.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{DEFAULT_LEASE_IDLE_SECS, DEFAULT_RETENTION_SECS, DEFAULT_SWEEP_INTERVAL_SECS};
use crate::engine::RenderEngine;
use crate::pool::RenderSessionPool;
use crate::scheduler::SharedState;

/// Sweep timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub retention: Duration,
    pub lease_idle: Duration,
}

impl SweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_lease_idle(mut self, idle: Duration) -> Self {
        self.lease_idle = idle;
        self
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            lease_idle: Duration::from_secs(DEFAULT_LEASE_IDLE_SECS),
        }
    }
}

impl From<&crate::config::ConfigFile> for SweeperConfig {
    fn from(config: &crate::config::ConfigFile) -> Self {
        Self {
            interval: Duration::from_secs(config.sweeper.interval_secs.max(1)),
            retention: Duration::from_secs(config.sweeper.retention_secs),
            lease_idle: Duration::from_secs(config.sweeper.lease_idle_secs),
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub jobs_removed: usize,
    pub idle_sessions_closed: usize,
    pub leases_reclaimed: usize,
    /// Stale-looking leases left alone because their job is still running.
    pub leases_skipped: usize,
}

impl SweepReport {
    pub fn did_work(&self) -> bool {
        self.jobs_removed + self.idle_sessions_closed + self.leases_reclaimed > 0
    }
}

/// Background reclamation of stale jobs and sessions.
pub struct CleanupSweeper<E: RenderEngine> {
    state: SharedState,
    pool: RenderSessionPool<E>,
    config: SweeperConfig,
}

impl<E: RenderEngine> CleanupSweeper<E> {
    pub(crate) fn new(
        state: SharedState,
        pool: RenderSessionPool<E>,
        config: SweeperConfig,
    ) -> Self {
        Self { state, pool, config }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Runs one sweep.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport {
            jobs_removed: self.state.lock().remove_expired(self.config.retention).len(),
            ..SweepReport::default()
        };

        report.idle_sessions_closed = self.pool.sweep_idle(self.config.lease_idle).await;

        let stale = self
            .pool
            .leases()
            .into_iter()
            .filter(|lease| lease.idle_for > self.config.lease_idle);
        for lease in stale {
            let state = self.state.lock();
            if state.is_running(&lease.job_id) {
                report.leases_skipped += 1;
                continue;
            }
            if self.pool.revoke(lease.lease_id) {
                report.leases_reclaimed += 1;
            }
        }

        if report.did_work() {
            info!(
                jobs_removed = report.jobs_removed,
                idle_sessions_closed = report.idle_sessions_closed,
                leases_reclaimed = report.leases_reclaimed,
                "Sweep complete"
            );
        } else {
            debug!(leases_skipped = report.leases_skipped, "Sweep found nothing to reclaim");
        }
        report
    }

    /// Sweeps on a fixed interval until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            lease_idle_secs = self.config.lease_idle.as_secs(),
            "Cleanup sweeper starting"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Cleanup sweeper shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }
}
