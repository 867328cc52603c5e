//! Worker loop.
//!
//! A fixed number of workers drain the pending queue. Each worker owns one
//! job end to end, so the number of running jobs never exceeds the number
//! of workers.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::RenderError;
use super::pipeline::{JobRun, Progress};
use super::state::Dispatch;
use super::watchdog::TimeoutWatchdog;
use super::Core;
use crate::engine::RenderEngine;

pub(crate) struct Worker<E: RenderEngine> {
    index: usize,
    core: Arc<Core<E>>,
}

impl<E: RenderEngine> Worker<E> {
    pub(crate) fn new(index: usize, core: Arc<Core<E>>) -> Self {
        Self { index, core }
    }

    /// Takes jobs until shutdown is signalled.
    pub(crate) async fn run(self) {
        debug!(worker = self.index, "Worker started");

        loop {
            let notified = self.core.work.notified();
            tokio::pin!(notified);
            // Register interest before looking at the queue so a submission
            // landing in between still wakes us.
            notified.as_mut().enable();

            if self.core.shutdown.is_cancelled() {
                break;
            }

            let next = self.core.state.lock().start_next();
            match next {
                Some(dispatch) => self.run_job(dispatch).await,
                None => {
                    tokio::select! {
                        biased;
                        _ = self.core.shutdown.cancelled() => break,
                        _ = &mut notified => {}
                    }
                }
            }
        }

        debug!(worker = self.index, "Worker stopped");
    }

    async fn run_job(&self, dispatch: Dispatch) {
        let Dispatch { id, spec, abort } = dispatch;
        let started = Instant::now();

        info!(job_id = %id, worker = self.index, url = %spec.url, "Job started");

        let Some(deadline) = started.checked_add(spec.timeout) else {
            let outcome: Result<Bytes, _> = Err(RenderError::Engine(format!(
                "timeout {:?} is out of range",
                spec.timeout
            )));
            self.core.state.lock().finish(&id, &outcome);
            warn!(job_id = %id, timeout = ?spec.timeout, "Job timeout out of range, failing");
            return;
        };

        let watchdog = TimeoutWatchdog::spawn(id.clone(), spec.timeout, deadline, abort.clone());
        let progress = Progress::new(Arc::clone(&self.core.state), id.clone());
        let run = JobRun {
            pool: &self.core.pool,
            config: &self.core.config,
            id: &id,
            spec: &spec,
            abort: &abort,
            deadline,
            progress: &progress,
        };

        let outcome = match AssertUnwindSafe(run.execute()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => Err(RenderError::Engine("render pipeline panicked".to_string())),
        };
        drop(watchdog);

        self.core.state.lock().finish(&id, &outcome);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(image) => {
                info!(job_id = %id, elapsed_ms, bytes = image.len(), "Job completed");
            }
            Err(RenderError::Cancelled(detail)) => {
                info!(job_id = %id, elapsed_ms, detail = %detail, "Job cancelled");
            }
            Err(e) => {
                warn!(job_id = %id, elapsed_ms, kind = %e.kind(), error = %e, "Job failed");
            }
        }
    }
}
