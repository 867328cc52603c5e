//! Job scheduler.
//!
//! The [`Scheduler`] owns the job registry, the FIFO pending queue, a fixed
//! pool of workers, the render session pool, and the cleanup sweeper. It is
//! constructed with [`Scheduler::start`] and torn down with
//! [`Scheduler::shutdown`].
//!
//! # Concurrency
//!
//! Registry, queue, and running set live behind a single lock that is only
//! held for short, non-async sections. Workers hold it to dequeue and to
//! record outcomes; `cancel`, the sweeper, and the read APIs use the same
//! lock. Exactly `max_concurrency` workers exist, so at most that many jobs
//! are ever `Running`.
//!
//! # Example
//!
//! ```ignore
//! use pagesnap::job::{validate, RawRequest};
//! use pagesnap::scheduler::{Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::start(engine, SchedulerConfig::new(4)).await;
//! let spec = validate(&RawRequest::new("https://example.com"))?;
//! let id = scheduler.submit(spec)?;
//!
//! // later
//! let image = scheduler.get_result(&id)?;
//! ```

mod config;
mod error;
mod pipeline;
mod record;
mod state;
mod status;
mod watchdog;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::RenderEngine;
use crate::job::{JobId, JobSpec};
use crate::pool::RenderSessionPool;
use crate::stats::{HostMetrics, NullHostMetrics, SchedulerStats};
use crate::sweeper::{CleanupSweeper, SweepReport};

pub use config::{
    SchedulerConfig, DEFAULT_LEASE_TIMEOUT, DEFAULT_NAVIGATION_RETRY_DELAY, DEFAULT_SHUTDOWN_GRACE,
};
pub use error::{CaptureError, RenderError, ResultError, SubmitError};
pub use state::{CancelOutcome, StateCounts};
pub use status::{FailureKind, JobSnapshot, JobStatus};

pub(crate) use record::JobRecord;
pub(crate) use state::{SchedulerState, SharedState};

use pipeline::{CANCELLED_DETAIL, SHUTDOWN_DETAIL};
use record::AbortReason;
use worker::Worker;

/// State shared by the scheduler handle and its workers.
pub(crate) struct Core<E: RenderEngine> {
    pub(crate) config: SchedulerConfig,
    pub(crate) state: SharedState,
    pub(crate) pool: RenderSessionPool<E>,
    pub(crate) work: Notify,
    pub(crate) shutdown: CancellationToken,
}

/// Bounded-concurrency screenshot job scheduler.
pub struct Scheduler<E: RenderEngine> {
    core: Arc<Core<E>>,
    sweeper: CleanupSweeper<E>,
    host: Arc<dyn HostMetrics>,
    accepting: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sweeper_task: Mutex<Option<JoinHandle<()>>>,
    sweeper_stop: CancellationToken,
}

impl<E: RenderEngine> Scheduler<E> {
    /// Starts a scheduler with no host metrics.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(engine: Arc<E>, config: SchedulerConfig) -> Self {
        Self::start_with_metrics(engine, config, Arc::new(NullHostMetrics)).await
    }

    /// Starts a scheduler: pre-warms the pool, spawns the workers and the
    /// cleanup sweeper.
    pub async fn start_with_metrics(
        engine: Arc<E>,
        config: SchedulerConfig,
        host: Arc<dyn HostMetrics>,
    ) -> Self {
        let pool = RenderSessionPool::new(engine, config.pool.clone());
        if config.pool.prewarm > 0 {
            if let Err(e) = pool.warm(config.pool.prewarm).await {
                warn!(error = %e, "Failed to pre-warm render sessions");
            }
        }

        let state: SharedState = Arc::new(Mutex::new(SchedulerState::new()));
        let core = Arc::new(Core {
            state: Arc::clone(&state),
            pool: pool.clone(),
            work: Notify::new(),
            shutdown: CancellationToken::new(),
            config,
        });

        let workers = (0..core.config.max_concurrency)
            .map(|index| tokio::spawn(Worker::new(index, Arc::clone(&core)).run()))
            .collect();

        let sweeper_stop = CancellationToken::new();
        let sweeper_task = tokio::spawn(
            CleanupSweeper::new(Arc::clone(&state), pool.clone(), core.config.sweeper.clone())
                .run(sweeper_stop.clone()),
        );

        info!(
            max_concurrency = core.config.max_concurrency,
            pool_capacity = pool.capacity(),
            "Scheduler started"
        );

        Self {
            sweeper: CleanupSweeper::new(state, pool, core.config.sweeper.clone()),
            core,
            host,
            accepting: AtomicBool::new(true),
            workers: Mutex::new(workers),
            sweeper_task: Mutex::new(Some(sweeper_task)),
            sweeper_stop,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    pub fn pool(&self) -> &RenderSessionPool<E> {
        &self.core.pool
    }

    fn enqueue(
        &self,
        spec: JobSpec,
        ephemeral: bool,
    ) -> Result<(JobId, watch::Receiver<JobStatus>), SubmitError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SubmitError::ShuttingDown);
        }
        let id = JobId::generate();
        let record = JobRecord::new(id.clone(), spec);
        let url = record.spec.url.to_string();
        let rx = self.core.state.lock().insert(record);
        self.core.work.notify_one();
        debug!(job_id = %id, url = %url, ephemeral, "Job submitted");
        Ok((id, rx))
    }

    /// Queues a job and returns its id without waiting for it to run.
    pub fn submit(&self, spec: JobSpec) -> Result<JobId, SubmitError> {
        self.enqueue(spec, false).map(|(id, _)| id)
    }

    /// Current snapshot of a job, or `None` if the id is unknown.
    pub fn get_status(&self, id: &JobId) -> Option<JobSnapshot> {
        self.core.state.lock().get(id).map(JobRecord::snapshot)
    }

    /// The captured image of a completed job.
    pub fn get_result(&self, id: &JobId) -> Result<Bytes, ResultError> {
        self.core
            .state
            .lock()
            .get(id)
            .ok_or_else(|| ResultError::NotFound(id.clone()))?
            .result()
    }

    /// Cancels a job.
    ///
    /// Pending jobs become `Cancelled` immediately. Running jobs are signalled
    /// and stop at their next stage boundary. Terminal jobs are untouched.
    pub fn cancel(&self, id: &JobId) -> CancelOutcome {
        let outcome = self
            .core
            .state
            .lock()
            .cancel(id, AbortReason::Cancelled, CANCELLED_DETAIL);
        debug!(job_id = %id, outcome = ?outcome, "Cancel requested");
        outcome
    }

    /// Cancels a job and forgets it.
    ///
    /// Terminal jobs are removed right away. Active jobs are cancelled as by
    /// [`Self::cancel`] and left for the sweeper.
    pub fn delete(&self, id: &JobId) -> CancelOutcome {
        let mut state = self.core.state.lock();
        match state.cancel(id, AbortReason::Cancelled, CANCELLED_DETAIL) {
            CancelOutcome::AlreadyTerminal(status) => {
                state.remove(id);
                CancelOutcome::AlreadyTerminal(status)
            }
            outcome => outcome,
        }
    }

    /// Runs a job through the normal queue and waits for its outcome.
    ///
    /// The job occupies a worker slot like any submitted job and is visible
    /// to status reads while in flight. Its record is removed once the
    /// outcome has been read. Dropping the returned future cancels the job.
    pub async fn capture(&self, spec: JobSpec) -> Result<Bytes, CaptureError> {
        let (id, mut rx) = self.enqueue(spec, true)?;
        let mut guard = AbandonGuard {
            state: &self.core.state,
            id: &id,
            armed: true,
        };

        while !rx.borrow_and_update().is_terminal() {
            if rx.changed().await.is_err() {
                break;
            }
        }

        guard.armed = false;
        let record = self.core.state.lock().remove(&id).ok_or(CaptureError::Lost)?;
        match record.result() {
            Ok(image) => Ok(image),
            Err(ResultError::Failed { kind, detail }) => Err(CaptureError::Failed { kind, detail }),
            Err(ResultError::Cancelled { detail }) => Err(CaptureError::Cancelled(detail)),
            Err(_) => Err(CaptureError::Lost),
        }
    }

    /// Point-in-time occupancy.
    pub fn stats(&self) -> SchedulerStats {
        let pool = self.core.pool.stats();
        let host = self.host.sample();
        let state = self.core.state.lock();
        SchedulerStats::collect(&state, self.core.config.max_concurrency, pool, host)
    }

    /// Runs one cleanup sweep immediately.
    pub async fn sweep_now(&self) -> SweepReport {
        self.sweeper.sweep_once().await
    }

    /// Stops accepting work, cancels pending and running jobs, waits for the
    /// workers to drain, stops the sweeper, and closes the pool.
    pub async fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }

        let (pending, running) = self
            .core
            .state
            .lock()
            .cancel_all(AbortReason::Shutdown, SHUTDOWN_DETAIL);
        info!(pending, running, "Scheduler shutting down");
        self.core.shutdown.cancel();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let grace = self.core.config.shutdown_grace;
        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(grace, futures::future::join_all(workers))
            .await
            .is_err()
        {
            warn!(grace_ms = grace.as_millis() as u64, "Workers did not drain in time, aborting");
            for handle in aborts {
                handle.abort();
            }
            let abandoned = self.core.state.lock().abandon_running(SHUTDOWN_DETAIL);
            if abandoned > 0 {
                warn!(abandoned, "Running jobs cancelled without draining");
            }
        }

        self.sweeper_stop.cancel();
        let sweeper = self.sweeper_task.lock().take();
        if let Some(task) = sweeper {
            let _ = task.await;
        }

        let closed = self.core.pool.close().await;
        info!(sessions_closed = closed, "Scheduler stopped");
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    /// Waits until a job reaches a terminal state, up to `timeout`.
    ///
    /// Returns the final snapshot, or `None` if the job is unknown or still
    /// active when the timeout elapses.
    pub async fn wait_for(&self, id: &JobId, timeout: Duration) -> Option<JobSnapshot> {
        let mut rx = self.core.state.lock().get(id)?.subscribe();
        let terminal = async {
            while !rx.borrow_and_update().is_terminal() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(timeout, terminal).await;
        self.get_status(id).filter(|s| s.status.is_terminal())
    }
}

impl<E: RenderEngine> Drop for Scheduler<E> {
    fn drop(&mut self) {
        self.core.shutdown.cancel();
        self.sweeper_stop.cancel();
    }
}

/// Cancels and discards a synchronous job whose caller stopped waiting.
struct AbandonGuard<'a> {
    state: &'a SharedState,
    id: &'a JobId,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        match state.cancel(self.id, AbortReason::Cancelled, CANCELLED_DETAIL) {
            CancelOutcome::CancellationRequested => {
                if let Some(record) = state.get_mut(self.id) {
                    record.discard_when_done = true;
                }
            }
            _ => {
                state.remove(self.id);
            }
        }
        debug!(job_id = %self.id, "Synchronous capture abandoned");
    }
}
