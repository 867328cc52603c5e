//! Leased render sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::PoolInner;
use crate::engine::{EngineError, RenderEngine};
use crate::job::JobId;

/// Bookkeeping shared between a lease and the pool's ledger.
#[derive(Debug)]
pub(crate) struct LeaseState {
    pub(crate) lease_id: u64,
    pub(crate) job_id: JobId,
    pub(crate) acquired_at: Instant,
    last_used: Mutex<Instant>,
    revoked: AtomicBool,
}

impl LeaseState {
    pub(crate) fn new(lease_id: u64, job_id: JobId) -> Self {
        let now = Instant::now();
        Self {
            lease_id,
            job_id,
            acquired_at: now,
            last_used: Mutex::new(now),
            revoked: AtomicBool::new(false),
        }
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    pub(crate) fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    /// Marks the lease revoked. Returns false if it already was.
    pub(crate) fn revoke(&self) -> bool {
        !self.revoked.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }
}

/// Exclusive handle to one pooled render session.
///
/// A lease ends exactly once: through [`super::RenderSessionPool::release`],
/// or, if dropped without release, by destroying its session in the
/// background. A session is never shared between two leases.
pub struct RenderLease<E: RenderEngine> {
    pub(crate) state: Arc<LeaseState>,
    pub(crate) session: Option<E::Session>,
    pub(crate) permit: Option<OwnedSemaphorePermit>,
    pub(crate) pool: Arc<PoolInner<E>>,
}

impl<E: RenderEngine> RenderLease<E> {
    /// Job that holds this lease.
    pub fn job_id(&self) -> &JobId {
        &self.state.job_id
    }

    pub fn lease_id(&self) -> u64 {
        self.state.lease_id
    }

    pub fn acquired_at(&self) -> Instant {
        self.state.acquired_at
    }

    /// Time since the session was last used through this lease.
    pub fn idle_for(&self) -> Duration {
        self.state.idle_for()
    }

    /// Records use of the session.
    pub fn touch(&self) {
        self.state.touch();
    }

    /// Whether the pool has reclaimed this lease out from under its holder.
    pub fn is_revoked(&self) -> bool {
        self.state.is_revoked()
    }

    /// Borrows the engine session.
    pub fn session(&self) -> Result<&E::Session, EngineError> {
        if self.is_revoked() {
            return Err(EngineError::SessionClosed(format!(
                "lease {} was reclaimed",
                self.state.lease_id
            )));
        }
        self.session
            .as_ref()
            .ok_or_else(|| EngineError::SessionClosed("lease already released".to_string()))
    }
}

impl<E: RenderEngine> Drop for RenderLease<E> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if self.pool.ledger.remove(&self.state.lease_id).is_none() {
            if let Some(permit) = self.permit.take() {
                permit.forget();
            }
        }

        warn!(
            job_id = %self.state.job_id,
            lease_id = self.state.lease_id,
            "Lease dropped without release, destroying session"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(&self.pool);
                handle.spawn(async move {
                    pool.destroy(session).await;
                });
            }
            Err(_) => {
                debug!(lease_id = self.state.lease_id, "No runtime available, session abandoned");
                self.pool.count_destroyed();
            }
        }
    }
}
