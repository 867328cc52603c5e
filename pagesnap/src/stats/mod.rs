//! Scheduler occupancy snapshots.
//!
//! [`SchedulerStats`] is a read-only, serializable view of how busy the
//! scheduler is. It is assembled from one brief read of the scheduler state,
//! the pool counters, and an optional host metrics collaborator.

use serde::Serialize;

use crate::pool::PoolStats;
use crate::scheduler::SchedulerState;

pub use crate::scheduler::StateCounts;

/// Host resource usage, as reported by a [`HostMetrics`] collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
}

/// Source of host CPU and memory usage.
///
/// Collection is outside this crate; embedders plug in their own sampler.
pub trait HostMetrics: Send + Sync {
    fn sample(&self) -> HostSnapshot;
}

/// Reports no host metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHostMetrics;

impl HostMetrics for NullHostMetrics {
    fn sample(&self) -> HostSnapshot {
        HostSnapshot::default()
    }
}

impl<F> HostMetrics for F
where
    F: Fn() -> HostSnapshot + Send + Sync,
{
    fn sample(&self) -> HostSnapshot {
        self()
    }
}

/// Point-in-time scheduler statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub max_concurrency: usize,
    pub running_count: usize,
    pub queued_count: usize,
    pub counts: StateCounts,
    pub tracked_total: usize,
    pub pool: PoolStats,
    pub host: HostSnapshot,
}

impl SchedulerStats {
    pub(crate) fn collect(
        state: &SchedulerState,
        max_concurrency: usize,
        pool: PoolStats,
        host: HostSnapshot,
    ) -> Self {
        let counts = state.counts();
        Self {
            max_concurrency,
            running_count: state.running(),
            queued_count: state.queued(),
            tracked_total: counts.total(),
            counts,
            pool,
            host,
        }
    }

    /// Fraction of worker slots in use (0.0 - 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_concurrency == 0 {
            return 0.0;
        }
        self.running_count as f64 / self.max_concurrency as f64
    }

    /// Whether every worker is busy and jobs are waiting.
    pub fn is_saturated(&self) -> bool {
        self.running_count >= self.max_concurrency && self.queued_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(running: usize, queued: usize) -> SchedulerStats {
        SchedulerStats {
            max_concurrency: 4,
            running_count: running,
            queued_count: queued,
            counts: StateCounts::default(),
            tracked_total: 0,
            pool: PoolStats::default(),
            host: HostSnapshot::default(),
        }
    }

    #[test]
    fn test_utilization() {
        assert_eq!(stats(0, 0).utilization(), 0.0);
        assert_eq!(stats(2, 0).utilization(), 0.5);
        assert!(!stats(4, 0).is_saturated());
        assert!(stats(4, 1).is_saturated());
    }

    #[test]
    fn test_null_metrics() {
        assert_eq!(NullHostMetrics.sample(), HostSnapshot::default());
    }

    #[test]
    fn test_closure_metrics() {
        let metrics = || HostSnapshot {
            cpu_percent: Some(12.5),
            memory_percent: Some(40.0),
        };
        assert_eq!(metrics.sample().cpu_percent, Some(12.5));
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_value(stats(1, 2)).unwrap();
        assert_eq!(json["running_count"], 1);
        assert_eq!(json["queued_count"], 2);
        assert!(json["host"]["cpu_percent"].is_null());
        assert_eq!(json["counts"]["pending"], 0);
    }
}
