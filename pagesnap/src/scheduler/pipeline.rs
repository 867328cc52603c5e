//! The render pipeline for one job.
//!
//! ```text
//! lease ─► navigate ─► [network idle] ─► wait_time ─► [script] ─► capture ─► release
//!   10        30             45              60           75          90
//! ```
//!
//! Each arrow is a stage boundary where cancellation and the deadline are
//! checked. Engine calls are additionally bounded by the time left before
//! the job's deadline.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::config::SchedulerConfig;
use super::error::RenderError;
use super::record::{AbortReason, AbortSignal};
use super::state::SharedState;
use crate::engine::{
    CaptureTarget, EngineError, RenderEngine, WaitStrategy, DIALOG_SUPPRESSION_SCRIPT,
};
use crate::job::{JobId, JobSpec};
use crate::pool::{PoolError, RenderLease, RenderSessionPool};
use crate::selector::{self, CaptureMode, FrameScope, LocatePlan, Locator, Target};

/// Progress reported at each stage.
pub(crate) mod stage {
    pub const LEASED: u8 = 10;
    pub const NAVIGATED: u8 = 30;
    pub const RESOURCES_SETTLED: u8 = 45;
    pub const WAITED: u8 = 60;
    pub const SCRIPTED: u8 = 75;
    pub const CAPTURING: u8 = 90;
}

pub(crate) const CANCELLED_DETAIL: &str = "cancelled by request";
pub(crate) const SHUTDOWN_DETAIL: &str = "scheduler shutting down";

/// Writes progress for one job into the registry.
pub(crate) struct Progress {
    state: SharedState,
    id: JobId,
}

impl Progress {
    pub(crate) fn new(state: SharedState, id: JobId) -> Self {
        Self { state, id }
    }

    pub(crate) fn report(&self, value: u8) {
        self.state.lock().advance(&self.id, value);
    }
}

/// Everything one pipeline run needs.
pub(crate) struct JobRun<'a, E: RenderEngine> {
    pub(crate) pool: &'a RenderSessionPool<E>,
    pub(crate) config: &'a SchedulerConfig,
    pub(crate) id: &'a JobId,
    pub(crate) spec: &'a JobSpec,
    pub(crate) abort: &'a AbortSignal,
    pub(crate) deadline: Instant,
    pub(crate) progress: &'a Progress,
}

impl<E: RenderEngine> JobRun<'_, E> {
    /// Runs the pipeline and always ends the lease it took.
    pub(crate) async fn execute(&self) -> Result<Bytes, RenderError> {
        let plan = selector::resolve(self.spec.selector.as_ref())
            .map_err(|e| RenderError::Engine(format!("unresolvable selector: {}", e)))?;

        self.checkpoint()?;
        let lease = self.lease().await?;
        self.progress.report(stage::LEASED);

        let outcome = self.drive(&lease, &plan).await;
        let healthy = match &outcome {
            Ok(_) => true,
            Err(e) => e.session_reusable(),
        };
        self.pool.release(lease, healthy).await;
        outcome
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn timed_out(&self) -> RenderError {
        RenderError::Timeout(self.spec.timeout)
    }

    fn aborted(&self, reason: AbortReason) -> RenderError {
        match reason {
            AbortReason::Cancelled => RenderError::Cancelled(CANCELLED_DETAIL.to_string()),
            AbortReason::Shutdown => RenderError::Cancelled(SHUTDOWN_DETAIL.to_string()),
            AbortReason::TimedOut => self.timed_out(),
        }
    }

    /// Stage boundary check.
    fn checkpoint(&self) -> Result<(), RenderError> {
        if let Some(reason) = self.abort.reason() {
            return Err(self.aborted(reason));
        }
        if self.remaining().is_zero() {
            return Err(self.timed_out());
        }
        Ok(())
    }

    fn session<'l>(&self, lease: &'l RenderLease<E>) -> Result<&'l E::Session, RenderError> {
        self.checkpoint()?;
        lease.touch();
        lease.session().map_err(|e| self.engine_error(e))
    }

    fn engine_error(&self, error: EngineError) -> RenderError {
        match error {
            EngineError::Timeout(_) if self.remaining().is_zero() => self.timed_out(),
            EngineError::Script(message) => RenderError::Script(message),
            other => RenderError::Engine(other.to_string()),
        }
    }

    /// Bounds an engine call by the time left before the deadline.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<Result<T, EngineError>, RenderError> {
        tokio::time::timeout(self.remaining(), call)
            .await
            .map_err(|_| self.timed_out())
    }

    /// Sleeps for `duration`, waking early if the job is aborted.
    async fn pause(&self, duration: Duration) -> Result<(), RenderError> {
        let sleep = tokio::time::sleep(duration.min(self.remaining()));
        tokio::select! {
            biased;
            _ = self.abort.raised() => {}
            _ = sleep => {}
        }
        self.checkpoint()
    }

    async fn lease(&self) -> Result<RenderLease<E>, RenderError> {
        let wait = self.config.lease_timeout.min(self.remaining());
        let acquired = self
            .pool
            .acquire_cancellable(self.id, &self.spec.profile, wait, self.abort.token())
            .await;
        match acquired {
            Ok(lease) => Ok(lease),
            Err(PoolError::Cancelled) => {
                self.checkpoint()?;
                Err(RenderError::Cancelled(CANCELLED_DETAIL.to_string()))
            }
            Err(PoolError::Timeout(waited)) => {
                self.checkpoint()?;
                Err(RenderError::PoolTimeout(waited))
            }
            Err(PoolError::Closed) => Err(RenderError::Cancelled(SHUTDOWN_DETAIL.to_string())),
            Err(PoolError::Engine(e)) => Err(self.engine_error(e)),
        }
    }

    async fn drive(&self, lease: &RenderLease<E>, plan: &LocatePlan) -> Result<Bytes, RenderError> {
        let engine = self.pool.engine();

        self.navigate(lease).await?;
        self.progress.report(stage::NAVIGATED);

        if self.spec.wait_for_resources {
            let session = self.session(lease)?;
            let idle = self
                .bounded(engine.wait_for(session, WaitStrategy::NetworkIdle, self.remaining()))
                .await?;
            match idle {
                Ok(()) => {}
                Err(EngineError::Timeout(reason)) => {
                    self.checkpoint()?;
                    debug!(
                        job_id = %self.id,
                        reason = %reason,
                        "Network never went idle, continuing"
                    );
                }
                Err(e) => return Err(self.engine_error(e)),
            }
        }
        self.progress.report(stage::RESOURCES_SETTLED);

        if !self.spec.wait_time.is_zero() {
            self.pause(self.spec.wait_time).await?;
        }
        self.progress.report(stage::WAITED);

        if let Some(script) = &self.spec.script {
            let session = self.session(lease)?;
            self.bounded(engine.evaluate(session, script))
                .await?
                .map_err(|e| self.engine_error(e))?;
            trace!(job_id = %self.id, "Custom script evaluated");
        }
        self.progress.report(stage::SCRIPTED);

        self.checkpoint()?;
        self.progress.report(stage::CAPTURING);
        self.capture(lease, plan).await
    }

    async fn navigate(&self, lease: &RenderLease<E>) -> Result<(), RenderError> {
        let engine = self.pool.engine();
        let attempts = self.config.navigation_retries.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            let session = self.session(lease)?;
            let navigated = self
                .bounded(engine.navigate(
                    session,
                    &self.spec.url,
                    WaitStrategy::DomContentLoaded,
                    self.remaining(),
                ))
                .await?;

            match navigated {
                Ok(()) => {
                    let suppressed = self
                        .bounded(engine.evaluate(session, DIALOG_SUPPRESSION_SCRIPT))
                        .await?;
                    if let Err(e) = suppressed {
                        debug!(job_id = %self.id, error = %e, "Dialog suppression failed");
                    }
                    trace!(job_id = %self.id, attempt, "Navigation complete");
                    return Ok(());
                }
                Err(EngineError::Navigation(reason)) | Err(EngineError::Timeout(reason)) => {
                    warn!(
                        job_id = %self.id,
                        attempt,
                        attempts,
                        reason = %reason,
                        "Navigation attempt failed"
                    );
                    last_reason = reason;
                    if attempt < attempts {
                        self.pause(self.config.navigation_retry_delay).await?;
                    }
                }
                Err(e) => return Err(self.engine_error(e)),
            }
        }

        self.checkpoint()?;
        Err(RenderError::Navigation {
            url: self.spec.url.to_string(),
            attempts,
            reason: last_reason,
        })
    }

    async fn locate(
        &self,
        session: &E::Session,
        locator: &Locator,
    ) -> Result<E::Element, RenderError> {
        let wait = self.config.element_wait.min(self.remaining());
        let engine = self.pool.engine();
        match self.bounded(engine.query(session, locator, wait)).await? {
            Ok(Some(element)) => Ok(element),
            Ok(None) => {
                self.checkpoint()?;
                Err(RenderError::ElementNotFound(format!("no element matches {}", locator)))
            }
            Err(e) => Err(self.engine_error(e)),
        }
    }

    async fn capture(
        &self,
        lease: &RenderLease<E>,
        plan: &LocatePlan,
    ) -> Result<Bytes, RenderError> {
        let engine = self.pool.engine();
        let session = self.session(lease)?;

        let frame = match &plan.scope {
            FrameScope::TopLevel => None,
            FrameScope::Frame(locator) => Some(self.locate(session, locator).await?),
        };

        let full_page = self.spec.full_page;
        let captured = match (&plan.target, &frame) {
            (Target::Document, None) => {
                self.bounded(engine.capture(session, CaptureTarget::Page, full_page))
                    .await?
            }
            (Target::Document, Some(frame)) => {
                self.bounded(engine.capture(session, CaptureTarget::Frame(frame), full_page))
                    .await?
            }
            (Target::Element(locator), _) => {
                let element = self.locate(session, locator).await?;
                self.bounded(engine.scroll_into_view(session, &element))
                    .await?
                    .map_err(|e| self.engine_error(e))?;

                match plan.capture {
                    CaptureMode::CanvasPixels => self.capture_canvas(session, &element).await?,
                    CaptureMode::Screenshot => {
                        let target = CaptureTarget::Element(&element);
                        self.bounded(engine.capture(session, target, false)).await?
                    }
                }
            }
        };

        captured.map_err(|e| self.engine_error(e))
    }

    /// Exports canvas pixels, falling back to an element screenshot when the
    /// engine cannot read the canvas.
    async fn capture_canvas(
        &self,
        session: &E::Session,
        canvas: &E::Element,
    ) -> Result<Result<Bytes, EngineError>, RenderError> {
        let engine = self.pool.engine();
        match self.bounded(engine.capture_canvas(session, canvas)).await? {
            Err(EngineError::Unsupported(reason)) | Err(EngineError::Script(reason)) => {
                warn!(
                    job_id = %self.id,
                    reason = %reason,
                    "Canvas pixel export unavailable, falling back to element screenshot"
                );
                let target = CaptureTarget::Element(canvas);
                self.bounded(engine.capture(session, target, false)).await
            }
            exported => Ok(exported),
        }
    }
}
