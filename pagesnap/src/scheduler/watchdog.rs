//! Per-job timeout watchdog.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use super::record::{AbortReason, AbortSignal};
use crate::job::JobId;

/// Raises a job's abort signal with [`AbortReason::TimedOut`] once its
/// deadline passes.
///
/// The watchdog runs as its own task so it fires even while the pipeline is
/// suspended inside an engine call. Dropping it disarms it.
pub(crate) struct TimeoutWatchdog {
    handle: JoinHandle<()>,
}

impl TimeoutWatchdog {
    pub(crate) fn spawn(
        job_id: JobId,
        timeout: Duration,
        deadline: Instant,
        abort: AbortSignal,
    ) -> Self {
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = abort.raised() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if abort.trigger(AbortReason::TimedOut) {
                        warn!(
                            job_id = %job_id,
                            timeout_ms = timeout.as_millis() as u64,
                            "Job exceeded its timeout, aborting"
                        );
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for TimeoutWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_deadline() {
        let abort = AbortSignal::new();
        let timeout = Duration::from_secs(5);
        let _watchdog = TimeoutWatchdog::spawn(
            JobId::new("w"),
            timeout,
            Instant::now() + timeout,
            abort.clone(),
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(abort.reason().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(abort.reason(), Some(AbortReason::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disarms() {
        let abort = AbortSignal::new();
        let watchdog = TimeoutWatchdog::spawn(
            JobId::new("w"),
            Duration::from_secs(1),
            Instant::now() + Duration::from_secs(1),
            abort.clone(),
        );
        drop(watchdog);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(abort.reason().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_cancel_keeps_its_reason() {
        let abort = AbortSignal::new();
        let _watchdog = TimeoutWatchdog::spawn(
            JobId::new("w"),
            Duration::from_secs(1),
            Instant::now() + Duration::from_secs(1),
            abort.clone(),
        );
        abort.trigger(AbortReason::Cancelled);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(abort.reason(), Some(AbortReason::Cancelled));
    }
}
