//! Shared scheduler state: the registry, the pending queue, and the
//! running set, all guarded by one lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use super::error::RenderError;
use super::record::{AbortReason, AbortSignal, JobRecord};
use super::status::JobStatus;
use crate::job::{JobId, JobSpec};

pub(crate) type SharedState = Arc<Mutex<SchedulerState>>;

/// Number of registry entries in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StateCounts {
    fn slot(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Cancelled => &mut self.cancelled,
        }
    }

    fn moved(&mut self, from: JobStatus, to: JobStatus) {
        let slot = self.slot(from);
        *slot = slot.saturating_sub(1);
        *self.slot(to) += 1;
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }
}

/// A job handed to a worker.
#[derive(Debug)]
pub(crate) struct Dispatch {
    pub(crate) id: JobId,
    pub(crate) spec: Arc<JobSpec>,
    pub(crate) abort: AbortSignal,
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was pending and is now `Cancelled`.
    Cancelled,
    /// The job is running; it stops at its next stage boundary.
    CancellationRequested,
    /// The job had already finished; its status is unchanged.
    AlreadyTerminal(JobStatus),
    /// No such job.
    NotFound,
}

#[derive(Debug, Default)]
pub(crate) struct SchedulerState {
    queue: VecDeque<JobId>,
    running: HashSet<JobId>,
    registry: HashMap<JobId, JobRecord>,
    counts: StateCounts,
}

impl SchedulerState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, record: JobRecord) -> watch::Receiver<JobStatus> {
        let rx = record.subscribe();
        self.queue.push_back(record.id.clone());
        self.counts.pending += 1;
        self.registry.insert(record.id.clone(), record);
        rx
    }

    pub(crate) fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.registry.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &JobId) -> Option<&mut JobRecord> {
        self.registry.get_mut(id)
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn running(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn counts(&self) -> StateCounts {
        self.counts
    }

    pub(crate) fn is_running(&self, id: &JobId) -> bool {
        self.running.contains(id)
    }

    /// Moves the oldest pending job to `Running`.
    pub(crate) fn start_next(&mut self) -> Option<Dispatch> {
        while let Some(id) = self.queue.pop_front() {
            let Some(record) = self.registry.get_mut(&id) else {
                continue;
            };
            if !record.start() {
                continue;
            }
            self.counts.moved(JobStatus::Pending, JobStatus::Running);
            self.running.insert(id.clone());
            return Some(Dispatch {
                id,
                spec: Arc::clone(&record.spec),
                abort: record.abort.clone(),
            });
        }
        None
    }

    pub(crate) fn advance(&mut self, id: &JobId, progress: u8) {
        if let Some(record) = self.registry.get_mut(id) {
            record.advance(progress);
        }
    }

    /// Records a running job's outcome. Returns the terminal status.
    pub(crate) fn finish(
        &mut self,
        id: &JobId,
        outcome: &Result<Bytes, RenderError>,
    ) -> Option<JobStatus> {
        self.running.remove(id);
        let record = self.registry.get_mut(id)?;
        let applied = match outcome {
            Ok(image) => record.complete(image.clone()),
            Err(error) => record.fail(error),
        };
        if !applied {
            return None;
        }
        let status = record.status();
        self.counts.moved(JobStatus::Running, status);
        if record.discard_when_done {
            self.remove(id);
        }
        Some(status)
    }

    /// Cancels a job according to its current state.
    pub(crate) fn cancel(
        &mut self,
        id: &JobId,
        reason: AbortReason,
        detail: &str,
    ) -> CancelOutcome {
        let Some(record) = self.registry.get_mut(id) else {
            return CancelOutcome::NotFound;
        };
        match record.status() {
            JobStatus::Pending => {
                record.fail(&RenderError::Cancelled(detail.to_string()));
                self.counts.moved(JobStatus::Pending, JobStatus::Cancelled);
                self.queue.retain(|queued| queued != id);
                if record.discard_when_done {
                    self.remove(id);
                }
                CancelOutcome::Cancelled
            }
            JobStatus::Running => {
                record.abort.trigger(reason);
                CancelOutcome::CancellationRequested
            }
            status => CancelOutcome::AlreadyTerminal(status),
        }
    }

    /// Cancels every pending job and signals every running one.
    pub(crate) fn cancel_all(&mut self, reason: AbortReason, detail: &str) -> (usize, usize) {
        let pending: Vec<JobId> = self.queue.iter().cloned().collect();
        let running: Vec<JobId> = self.running.iter().cloned().collect();
        for id in pending.iter().chain(running.iter()) {
            self.cancel(id, reason, detail);
        }
        (pending.len(), running.len())
    }

    /// Finishes every still-running job as cancelled. Used once their
    /// workers are gone and can no longer report an outcome.
    pub(crate) fn abandon_running(&mut self, detail: &str) -> usize {
        let running: Vec<JobId> = self.running.iter().cloned().collect();
        let outcome = Err(RenderError::Cancelled(detail.to_string()));
        running
            .iter()
            .filter(|id| self.finish(id, &outcome).is_some())
            .count()
    }

    pub(crate) fn remove(&mut self, id: &JobId) -> Option<JobRecord> {
        let record = self.registry.remove(id)?;
        let slot = self.counts.slot(record.status());
        *slot = slot.saturating_sub(1);
        Some(record)
    }

    /// Removes terminal records that finished more than `retention` ago.
    pub(crate) fn remove_expired(&mut self, retention: Duration) -> Vec<JobId> {
        let expired: Vec<JobId> = self
            .registry
            .values()
            .filter(|r| r.status().is_terminal())
            .filter(|r| r.finished.is_some_and(|at| at.elapsed() > retention))
            .map(|r| r.id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec::for_url(url::Url::parse("https://example.com").unwrap())
    }

    fn submit(state: &mut SchedulerState, id: &str) -> JobId {
        let id = JobId::new(id);
        state.insert(JobRecord::new(id.clone(), spec()));
        id
    }

    fn recount(state: &SchedulerState) -> StateCounts {
        let mut counts = StateCounts::default();
        for record in state.registry.values() {
            *counts.slot(record.status()) += 1;
        }
        counts
    }

    #[test]
    fn test_fifo_dispatch() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        let b = submit(&mut state, "b");
        assert_eq!(state.start_next().unwrap().id, a);
        assert_eq!(state.start_next().unwrap().id, b);
        assert!(state.start_next().is_none());
        assert_eq!(state.running(), 2);
    }

    #[test]
    fn test_cancel_pending_removes_from_queue() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        let b = submit(&mut state, "b");

        assert_eq!(state.cancel(&a, AbortReason::Cancelled, "x"), CancelOutcome::Cancelled);
        assert_eq!(state.get(&a).unwrap().status(), JobStatus::Cancelled);
        assert_eq!(state.queued(), 1);
        assert_eq!(state.start_next().unwrap().id, b);
        assert_eq!(state.counts(), recount(&state));
    }

    #[test]
    fn test_cancel_running_raises_signal() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        let dispatch = state.start_next().unwrap();

        assert_eq!(
            state.cancel(&a, AbortReason::Cancelled, "x"),
            CancelOutcome::CancellationRequested
        );
        assert_eq!(dispatch.abort.reason(), Some(AbortReason::Cancelled));
        assert_eq!(state.get(&a).unwrap().status(), JobStatus::Running);
    }

    #[test]
    fn test_cancel_terminal_is_noop() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        state.start_next();
        state.finish(&a, &Ok(Bytes::from_static(b"png")));

        assert_eq!(
            state.cancel(&a, AbortReason::Cancelled, "x"),
            CancelOutcome::AlreadyTerminal(JobStatus::Completed)
        );
        assert_eq!(
            state.cancel(&JobId::new("nope"), AbortReason::Cancelled, "x"),
            CancelOutcome::NotFound
        );
    }

    #[test]
    fn test_finish_updates_counts() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        let b = submit(&mut state, "b");
        state.start_next();
        state.start_next();

        assert_eq!(state.finish(&a, &Ok(Bytes::new())), Some(JobStatus::Completed));
        assert_eq!(
            state.finish(&b, &Err(RenderError::Engine("boom".into()))),
            Some(JobStatus::Failed)
        );
        assert_eq!(state.running(), 0);
        assert_eq!(state.counts(), recount(&state));
        assert_eq!(state.counts().completed, 1);
        assert_eq!(state.counts().failed, 1);
    }

    #[test]
    fn test_discarded_records_leave_on_finish() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        state.get_mut(&a).unwrap().discard_when_done = true;
        state.start_next();
        state.finish(&a, &Ok(Bytes::new()));
        assert!(state.get(&a).is_none());
        assert_eq!(state.counts().total(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let mut state = SchedulerState::new();
        submit(&mut state, "a");
        submit(&mut state, "b");
        submit(&mut state, "c");
        let running = state.start_next().unwrap();

        assert_eq!(state.cancel_all(AbortReason::Shutdown, "stop"), (2, 1));
        assert_eq!(state.queued(), 0);
        assert_eq!(running.abort.reason(), Some(AbortReason::Shutdown));
        assert_eq!(state.counts().cancelled, 2);
    }

    #[test]
    fn test_abandon_running() {
        let mut state = SchedulerState::new();
        let a = submit(&mut state, "a");
        let b = submit(&mut state, "b");
        state.start_next();

        assert_eq!(state.abandon_running("gone"), 1);
        assert_eq!(state.get(&a).unwrap().status(), JobStatus::Cancelled);
        assert_eq!(state.get(&b).unwrap().status(), JobStatus::Pending);
        assert_eq!(state.running(), 0);
        assert_eq!(state.counts(), recount(&state));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired_only_terminal() {
        let mut state = SchedulerState::new();
        let done = submit(&mut state, "done");
        let busy = submit(&mut state, "busy");
        state.start_next();
        state.start_next();
        state.finish(&done, &Ok(Bytes::new()));

        assert!(state.remove_expired(Duration::from_secs(10)).is_empty());
        tokio::time::advance(Duration::from_secs(11)).await;
        let removed = state.remove_expired(Duration::from_secs(10));
        assert_eq!(removed, vec![done.clone()]);
        assert!(state.get(&done).is_none());
        assert!(state.get(&busy).is_some());
        assert_eq!(state.counts(), recount(&state));
    }
}
