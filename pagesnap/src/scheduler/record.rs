//! Per-job mutable records held in the registry.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{RenderError, ResultError};
use super::status::{FailureKind, JobSnapshot, JobStatus};
use crate::job::{JobId, JobSpec};

/// Why a job's abort signal was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbortReason {
    /// Explicit cancel request.
    Cancelled,
    /// The scheduler is shutting down.
    Shutdown,
    /// The job's timeout elapsed.
    TimedOut,
}

/// Cooperative stop signal threaded through a job's pipeline.
///
/// The first reason recorded wins; later triggers only re-cancel the token.
#[derive(Debug, Clone, Default)]
pub(crate) struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<AbortReason>>,
}

impl AbortSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns true if `reason` is the recorded reason.
    pub(crate) fn trigger(&self, reason: AbortReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub(crate) fn reason(&self) -> Option<AbortReason> {
        self.reason.get().copied()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) async fn raised(&self) {
        self.token.cancelled().await
    }
}

/// Terminal failure stored on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    pub(crate) kind: FailureKind,
    pub(crate) detail: String,
}

/// Mutable lifecycle state of one job.
///
/// Only the scheduler mutates records, always under the state lock.
#[derive(Debug)]
pub(crate) struct JobRecord {
    pub(crate) id: JobId,
    pub(crate) spec: Arc<JobSpec>,
    status: JobStatus,
    progress: u8,
    result: Option<Bytes>,
    failure: Option<Failure>,
    pub(crate) abort: AbortSignal,
    status_tx: watch::Sender<JobStatus>,
    /// Removed as soon as it turns terminal if its waiter has gone away.
    pub(crate) discard_when_done: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    pub(crate) started: Option<Instant>,
    pub(crate) finished: Option<Instant>,
}

impl JobRecord {
    pub(crate) fn new(id: JobId, spec: JobSpec) -> Self {
        let now = Utc::now();
        let (status_tx, _) = watch::channel(JobStatus::Pending);
        Self {
            id,
            spec: Arc::new(spec),
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            failure: None,
            abort: AbortSignal::new(),
            status_tx,
            discard_when_done: false,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            started: None,
            finished: None,
        }
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.status
    }

    pub(crate) fn progress(&self) -> u8 {
        self.progress
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    /// Raises progress; never lowers it.
    pub(crate) fn advance(&mut self, progress: u8) {
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.updated_at = Utc::now();
        }
    }

    /// Applies a lifecycle transition. Returns false if the edge is invalid.
    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        match next {
            JobStatus::Running => {
                self.started_at = Some(self.updated_at);
                self.started = Some(Instant::now());
            }
            s if s.is_terminal() => {
                self.finished_at = Some(self.updated_at);
                self.finished = Some(Instant::now());
            }
            _ => {}
        }
        self.status_tx.send_replace(next);
        true
    }

    pub(crate) fn start(&mut self) -> bool {
        self.transition(JobStatus::Running)
    }

    pub(crate) fn complete(&mut self, image: Bytes) -> bool {
        if !self.transition(JobStatus::Completed) {
            return false;
        }
        self.progress = 100;
        self.result = Some(image);
        true
    }

    pub(crate) fn fail(&mut self, error: &RenderError) -> bool {
        if !self.transition(error.status()) {
            return false;
        }
        self.failure = Some(Failure {
            kind: error.kind(),
            detail: error.to_string(),
        });
        true
    }

    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress(),
            url: self.spec.url.to_string(),
            device: self.spec.device,
            failure: self.failure.as_ref().map(|f| f.kind),
            detail: self.failure.as_ref().map(|f| f.detail.clone()),
            has_result: self.result.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    /// The image if completed, otherwise why there is none.
    pub(crate) fn result(&self) -> Result<Bytes, ResultError> {
        match (self.status, &self.result, &self.failure) {
            (JobStatus::Completed, Some(image), _) => Ok(image.clone()),
            (JobStatus::Cancelled, _, failure) => Err(ResultError::Cancelled {
                detail: failure.as_ref().map(|f| f.detail.clone()).unwrap_or_default(),
            }),
            (JobStatus::Failed, _, failure) => Err(ResultError::Failed {
                kind: failure.as_ref().map(|f| f.kind).unwrap_or(FailureKind::Engine),
                detail: failure.as_ref().map(|f| f.detail.clone()).unwrap_or_default(),
            }),
            (status, _, _) => Err(ResultError::NotReady {
                status,
                progress: self.progress(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record() -> JobRecord {
        let url = url::Url::parse("https://example.com").unwrap();
        JobRecord::new(JobId::new("r1"), JobSpec::for_url(url))
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut record = record();
        record.advance(30);
        record.advance(10);
        assert_eq!(record.progress(), 30);
        record.advance(250);
        assert_eq!(record.progress(), 100);
    }

    #[test]
    fn test_lifecycle_timestamps() {
        let mut record = record();
        assert!(record.snapshot().started_at.is_none());
        assert!(record.start());
        assert!(record.snapshot().started_at.is_some());
        assert!(record.complete(Bytes::from_static(b"img")));
        assert!(record.finished.is_some());
        assert_eq!(record.progress(), 100);
        assert_eq!(record.result().unwrap(), Bytes::from_static(b"img"));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut record = record();
        assert!(!record.complete(Bytes::new()));
        assert_eq!(record.status(), JobStatus::Pending);

        assert!(record.fail(&RenderError::Cancelled("stop".into())));
        assert!(!record.start());
        assert_eq!(record.status(), JobStatus::Cancelled);
    }

    #[test]
    fn test_result_reports_failure() {
        let mut record = record();
        record.start();
        record.fail(&RenderError::Timeout(Duration::from_secs(3)));
        assert_eq!(
            record.result(),
            Err(ResultError::Failed {
                kind: FailureKind::Timeout,
                detail: "job timed out after 3s".into(),
            })
        );
    }

    #[test]
    fn test_result_not_ready() {
        let record = record();
        assert_eq!(
            record.result(),
            Err(ResultError::NotReady {
                status: JobStatus::Pending,
                progress: 0
            })
        );
    }

    #[test]
    fn test_reads_report_current_progress() {
        let mut record = record();
        record.start();
        record.advance(60);

        assert_eq!(record.snapshot().progress, 60);
        assert_eq!(
            record.result(),
            Err(ResultError::NotReady {
                status: JobStatus::Running,
                progress: 60
            })
        );
    }

    #[test]
    fn test_abort_first_reason_wins() {
        let signal = AbortSignal::new();
        assert!(signal.reason().is_none());
        assert!(signal.trigger(AbortReason::TimedOut));
        assert!(!signal.trigger(AbortReason::Cancelled));
        assert_eq!(signal.reason(), Some(AbortReason::TimedOut));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let mut record = record();
        let mut rx = record.subscribe();
        record.start();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), JobStatus::Running);
    }
}
