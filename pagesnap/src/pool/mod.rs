//! Render session pool.
//!
//! Rendering sessions are expensive to create, so the pool keeps a bounded
//! set of them and hands them out as [`RenderLease`]s.
//!
//! # Lifecycle
//!
//! ```text
//!   new_session ──► idle ──acquire──► leased ──release(healthy)──► idle
//!                    │                  │
//!                    │ sweep_idle       │ release(unhealthy) / drop / revoke
//!                    ▼                  ▼
//!                 closed ◄──────────── closed
//! ```
//!
//! A semaphore bounds the number of outstanding leases. Every checkout
//! reconfigures the session to the job's device profile before it is handed
//! out, whether the session is new or reused.

mod config;
mod lease;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{EngineError, RenderEngine};
use crate::job::{DeviceProfile, JobId};

pub use config::{PoolConfig, DEFAULT_ELEMENT_WAIT, DEFAULT_NAVIGATION_RETRIES};
pub use lease::RenderLease;

use lease::LeaseState;

/// Errors returned by [`RenderSessionPool::acquire`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no render session available within {0:?}")]
    Timeout(Duration),

    #[error("render session pool is closed")]
    Closed,

    #[error("lease acquisition cancelled")]
    Cancelled,

    #[error("failed to prepare render session: {0}")]
    Engine(#[from] EngineError),
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub leased: usize,
    pub created_total: u64,
    pub destroyed_total: u64,
    pub reclaimed_total: u64,
}

/// Lease held by a job, as seen by the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseInfo {
    pub lease_id: u64,
    pub job_id: JobId,
    pub held_for: Duration,
    pub idle_for: Duration,
}

struct IdleSession<S> {
    session: S,
    idle_since: Instant,
}

pub(crate) struct PoolInner<E: RenderEngine> {
    engine: Arc<E>,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleSession<E::Session>>>,
    pub(crate) ledger: DashMap<u64, Arc<LeaseState>>,
    next_lease_id: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
    reclaimed: AtomicU64,
    closed: AtomicBool,
}

impl<E: RenderEngine> PoolInner<E> {
    async fn create(&self) -> Result<E::Session, EngineError> {
        let session = self.engine.new_session(&self.config.session).await?;
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!("Render session created");
        Ok(session)
    }

    pub(crate) async fn destroy(&self, session: E::Session) {
        if let Err(e) = self.engine.close(session).await {
            warn!(error = %e, "Failed to close render session");
        }
        self.count_destroyed();
    }

    pub(crate) fn count_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes an idle session or creates one, then matches it to `profile`.
    async fn checkout(&self, profile: &DeviceProfile) -> Result<E::Session, EngineError> {
        let reused = self.idle.lock().pop_front().map(|idle| idle.session);
        let session = match reused {
            Some(session) => session,
            None => self.create().await?,
        };

        match self.engine.configure(&session, profile).await {
            Ok(()) => Ok(session),
            Err(e) => {
                warn!(error = %e, "Session reconfiguration failed, recreating");
                self.destroy(session).await;
                let fresh = self.create().await?;
                if let Err(e) = self.engine.configure(&fresh, profile).await {
                    self.destroy(fresh).await;
                    return Err(e);
                }
                Ok(fresh)
            }
        }
    }
}

/// Bounded pool of reusable render sessions.
pub struct RenderSessionPool<E: RenderEngine> {
    inner: Arc<PoolInner<E>>,
}

impl<E: RenderEngine> Clone for RenderSessionPool<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: RenderEngine> RenderSessionPool<E> {
    pub fn new(engine: Arc<E>, config: PoolConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                engine,
                permits: Arc::new(Semaphore::new(capacity)),
                config,
                idle: Mutex::new(VecDeque::new()),
                ledger: DashMap::new(),
                next_lease_id: AtomicU64::new(1),
                created: AtomicU64::new(0),
                destroyed: AtomicU64::new(0),
                reclaimed: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.capacity.max(1)
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.inner.engine
    }

    /// Creates idle sessions until `count` (bounded by capacity) are idle.
    ///
    /// Returns how many sessions were created.
    pub async fn warm(&self, count: usize) -> Result<usize, PoolError> {
        let target = count.min(self.capacity());
        let mut created = 0;
        while self.inner.idle.lock().len() < target {
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(PoolError::Closed);
            }
            let session = self.inner.create().await?;
            self.inner.idle.lock().push_back(IdleSession {
                session,
                idle_since: Instant::now(),
            });
            created += 1;
        }
        if created > 0 {
            info!(created, "Render session pool warmed");
        }
        Ok(created)
    }

    /// Leases a session configured for `profile`.
    ///
    /// Waits up to `timeout` for a free slot without holding any lock.
    pub async fn acquire(
        &self,
        job_id: &JobId,
        profile: &DeviceProfile,
        timeout: Duration,
    ) -> Result<RenderLease<E>, PoolError> {
        self.acquire_inner(job_id, profile, timeout, None).await
    }

    /// Like [`Self::acquire`], but gives up with [`PoolError::Cancelled`]
    /// if `cancel` fires while waiting for a free slot.
    ///
    /// Once a slot is obtained, session preparation runs to completion.
    pub async fn acquire_cancellable(
        &self,
        job_id: &JobId,
        profile: &DeviceProfile,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RenderLease<E>, PoolError> {
        self.acquire_inner(job_id, profile, timeout, Some(cancel)).await
    }

    async fn acquire_inner(
        &self,
        job_id: &JobId,
        profile: &DeviceProfile,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<RenderLease<E>, PoolError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let wait = tokio::time::timeout(timeout, Arc::clone(&self.inner.permits).acquire_owned());
        let acquired = match cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PoolError::Cancelled),
                acquired = wait => acquired,
            },
            None => wait.await,
        };

        let permit = match acquired {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                debug!(
                    job_id = %job_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Lease acquisition timed out"
                );
                return Err(PoolError::Timeout(timeout));
            }
        };

        let session = self.inner.checkout(profile).await?;

        let lease_id = self.inner.next_lease_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(LeaseState::new(lease_id, job_id.clone()));
        self.inner.ledger.insert(lease_id, Arc::clone(&state));
        debug!(job_id = %job_id, lease_id, "Render session leased");

        Ok(RenderLease {
            state,
            session: Some(session),
            permit: Some(permit),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Ends a lease, returning its session to the idle set if `healthy`,
    /// destroying it otherwise.
    ///
    /// Revoked leases and leases released after [`Self::close`] are always
    /// destroyed.
    pub async fn release(&self, mut lease: RenderLease<E>, healthy: bool) {
        let Some(session) = lease.session.take() else {
            return;
        };
        let lease_id = lease.state.lease_id;

        // Whoever removes the ledger entry owns the lease's slot.
        let revoked = self.inner.ledger.remove(&lease_id).is_none();
        if revoked {
            if let Some(permit) = lease.permit.take() {
                permit.forget();
            }
        }

        let reusable = healthy && !revoked && !self.inner.closed.load(Ordering::SeqCst);
        let leftover = if reusable {
            self.return_idle(session)
        } else {
            Some(session)
        };

        match leftover {
            None => {
                debug!(job_id = %lease.state.job_id, lease_id, "Render session returned to pool");
            }
            Some(session) => {
                self.inner.destroy(session).await;
                debug!(
                    job_id = %lease.state.job_id,
                    lease_id,
                    healthy,
                    revoked,
                    "Render session destroyed"
                );
            }
        }
        // The permit is released here, after the session is idle or gone.
        drop(lease);
    }

    fn return_idle(&self, session: E::Session) -> Option<E::Session> {
        let mut idle = self.inner.idle.lock();
        if idle.len() >= self.capacity() {
            return Some(session);
        }
        idle.push_back(IdleSession {
            session,
            idle_since: Instant::now(),
        });
        None
    }

    /// Leases currently held, oldest first.
    pub fn leases(&self) -> Vec<LeaseInfo> {
        let mut leases: Vec<LeaseInfo> = self
            .inner
            .ledger
            .iter()
            .map(|entry| LeaseInfo {
                lease_id: entry.lease_id,
                job_id: entry.job_id.clone(),
                held_for: entry.acquired_at.elapsed(),
                idle_for: entry.idle_for(),
            })
            .collect();
        leases.sort_by_key(|l| l.lease_id);
        leases
    }

    /// Reclaims a lease from its holder.
    ///
    /// The lease's slot becomes available immediately. The holder sees
    /// [`RenderLease::is_revoked`] and its session is destroyed, never
    /// reused, when the holder releases or drops it. Returns false if the
    /// lease was already released or revoked.
    pub fn revoke(&self, lease_id: u64) -> bool {
        let Some((_, state)) = self.inner.ledger.remove(&lease_id) else {
            return false;
        };
        state.revoke();
        self.inner.permits.add_permits(1);
        self.inner.reclaimed.fetch_add(1, Ordering::Relaxed);
        warn!(
            job_id = %state.job_id,
            lease_id,
            idle_ms = state.idle_for().as_millis() as u64,
            "Render lease reclaimed"
        );
        true
    }

    /// Destroys idle sessions unused for longer than `threshold`.
    ///
    /// Returns the number of sessions destroyed.
    pub async fn sweep_idle(&self, threshold: Duration) -> usize {
        let expired: Vec<E::Session> = {
            let mut idle = self.inner.idle.lock();
            let (stale, fresh): (VecDeque<_>, VecDeque<_>) = idle
                .drain(..)
                .partition(|s| s.idle_since.elapsed() > threshold);
            *idle = fresh;
            stale.into_iter().map(|s| s.session).collect()
        };

        let count = expired.len();
        for session in expired {
            self.inner.destroy(session).await;
        }
        if count > 0 {
            debug!(count, threshold_secs = threshold.as_secs(), "Idle render sessions closed");
        }
        count
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity(),
            idle: self.inner.idle.lock().len(),
            leased: self.inner.ledger.len(),
            created_total: self.inner.created.load(Ordering::Relaxed),
            destroyed_total: self.inner.destroyed.load(Ordering::Relaxed),
            reclaimed_total: self.inner.reclaimed.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Stops leasing and destroys every idle session.
    ///
    /// Outstanding leases stay valid; their sessions are destroyed when
    /// released. Returns the number of idle sessions destroyed.
    pub async fn close(&self) -> usize {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        self.inner.permits.close();

        let idle: Vec<E::Session> = self.inner.idle.lock().drain(..).map(|s| s.session).collect();
        let count = idle.len();
        for session in idle {
            self.inner.destroy(session).await;
        }
        info!(destroyed = count, leased = self.inner.ledger.len(), "Render session pool closed");
        count
    }
}
