//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;

use super::status::{FailureKind, JobStatus};
use crate::job::JobId;

/// Why a pipeline run did not produce an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no render session available within {0:?}")]
    PoolTimeout(Duration),

    #[error("navigation to {url} failed after {attempts} attempt(s): {reason}")]
    Navigation {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Cancelled(String),

    #[error("custom script failed: {0}")]
    Script(String),

    #[error("render engine error: {0}")]
    Engine(String),
}

impl RenderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PoolTimeout(_) => FailureKind::PoolTimeout,
            Self::Navigation { .. } => FailureKind::Navigation,
            Self::ElementNotFound(_) => FailureKind::ElementNotFound,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Cancelled(_) => FailureKind::Cancelled,
            Self::Script(_) => FailureKind::Script,
            Self::Engine(_) => FailureKind::Engine,
        }
    }

    /// Terminal status this error puts a job in.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Cancelled(_) => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    /// Whether the session that produced this error may be reused.
    pub(crate) fn session_reusable(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Submission refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("scheduler is shutting down")]
    ShuttingDown,
}

/// Why [`super::Scheduler::get_result`] has no image to return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job is {status} ({progress}%)")]
    NotReady { status: JobStatus, progress: u8 },

    #[error("job failed ({kind}): {detail}")]
    Failed { kind: FailureKind, detail: String },

    #[error("job cancelled: {detail}")]
    Cancelled { detail: String },
}

/// Outcome of the synchronous capture path when no image is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Rejected(#[from] SubmitError),

    #[error("capture failed ({kind}): {detail}")]
    Failed { kind: FailureKind, detail: String },

    #[error("capture cancelled: {0}")]
    Cancelled(String),

    #[error("job record disappeared before completion")]
    Lost,
}

impl CaptureError {
    /// Whether the capture exceeded its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                kind: FailureKind::Timeout,
                ..
            }
        )
    }
}
