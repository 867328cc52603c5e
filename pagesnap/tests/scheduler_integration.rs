//! Integration tests for the screenshot scheduler.
//!
//! These tests drive the public API end to end against the in-memory
//! `FixtureEngine`:
//! - Submission, status, and result reads
//! - Concurrency bound and FIFO dispatch
//! - Cancellation, timeouts, and failure classification
//! - Cleanup sweeps, synchronous capture, and shutdown
//!
//! Run with: `cargo test --test scheduler_integration`

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use pagesnap::engine::{FixtureEngine, FixturePage, DIALOG_SUPPRESSION_SCRIPT};
use pagesnap::job::{validate, JobId, JobSpec, RawRequest, ValidationError};
use pagesnap::pool::PoolConfig;
use pagesnap::scheduler::{
    CancelOutcome, CaptureError, FailureKind, JobSnapshot, JobStatus, ResultError, Scheduler,
    SchedulerConfig, SubmitError,
};
use pagesnap::selector::{Locator, ResolveError, SelectorDescriptor, SelectorKind};
use pagesnap::stats::HostSnapshot;
use pagesnap::sweeper::SweeperConfig;

// ============================================================================
// Test Helpers
// ============================================================================

const SETTLE: Duration = Duration::from_secs(5);

/// A page-level spec with no fixed wait, so tests run quickly.
fn spec(url: &str) -> JobSpec {
    JobSpec::for_url(Url::parse(url).unwrap()).with_wait_time(Duration::ZERO)
}

fn css(query: &str) -> Locator {
    Locator::Css(query.to_string())
}

fn config(max_concurrency: usize) -> SchedulerConfig {
    SchedulerConfig::new(max_concurrency)
        .with_navigation_retries(3, Duration::from_millis(10))
        .with_element_wait(Duration::from_millis(50))
        .with_shutdown_grace(Duration::from_millis(200))
}

async fn start(engine: &FixtureEngine, config: SchedulerConfig) -> Scheduler<FixtureEngine> {
    Scheduler::start(Arc::new(engine.clone()), config).await
}

/// Polls until the job reaches `status`.
async fn wait_status(scheduler: &Scheduler<FixtureEngine>, id: &JobId, status: JobStatus) {
    let reached = tokio::time::timeout(SETTLE, async {
        loop {
            if scheduler.get_status(id).map(|s| s.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "job {} never reached {}", id, status);
}

/// Waits for a terminal state and returns the final snapshot.
async fn finished(scheduler: &Scheduler<FixtureEngine>, id: &JobId) -> JobSnapshot {
    scheduler
        .wait_for(id, SETTLE)
        .await
        .unwrap_or_else(|| panic!("job {} did not finish", id))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ============================================================================
// Submission and results
// ============================================================================

#[tokio::test]
async fn test_submit_and_read_result() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(2)).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    let snapshot = finished(&scheduler, &id).await;

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.progress, 100);
    assert!(snapshot.has_result);
    assert!(snapshot.started_at.is_some() && snapshot.finished_at.is_some());

    let image = scheduler.get_result(&id).unwrap();
    assert!(text(&image).contains("https://example.com/"));
    assert!(text(&image).contains("page full=false"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_result_reads_are_idempotent() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    finished(&scheduler, &id).await;

    let first = scheduler.get_result(&id).unwrap();
    let second = scheduler.get_result(&id).unwrap();
    assert_eq!(first, second);
    assert_eq!(scheduler.get_status(&id).unwrap().status, JobStatus::Completed);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;
    let unknown = JobId::new("does-not-exist");

    assert!(scheduler.get_status(&unknown).is_none());
    assert_eq!(
        scheduler.get_result(&unknown),
        Err(ResultError::NotFound(unknown.clone()))
    );
    assert_eq!(scheduler.cancel(&unknown), CancelOutcome::NotFound);
    assert_eq!(scheduler.delete(&unknown), CancelOutcome::NotFound);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_result_not_ready_while_running() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://slow.test");
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler.submit(spec("https://slow.test")).unwrap();
    wait_status(&scheduler, &id, JobStatus::Running).await;

    assert!(matches!(
        scheduler.get_result(&id),
        Err(ResultError::NotReady {
            status: JobStatus::Running,
            ..
        })
    ));

    gate.open();
    finished(&scheduler, &id).await;
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_device_profile_reaches_engine() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let mut raw = RawRequest::new("https://example.com");
    raw.device = Some("phone".into());
    raw.wait_time = Some(0.0);
    raw.full_page = Some(true);
    let id = scheduler.submit(validate(&raw).unwrap()).unwrap();
    finished(&scheduler, &id).await;

    let image = text(&scheduler.get_result(&id).unwrap());
    assert!(image.contains("390x844@3"));
    assert!(image.contains("iPhone"));
    assert!(image.contains("full=true"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_invalid_request_creates_no_job() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let mut raw = RawRequest::new("https://example.com");
    raw.element_type = Some("attr".into());
    raw.element_value = Some("submit".into());

    assert_eq!(
        validate(&raw),
        Err(ValidationError::Selector(ResolveError::MissingAttributeName(
            SelectorKind::Attr
        )))
    );
    assert_eq!(scheduler.stats().tracked_total, 0);

    scheduler.shutdown().await;
}

// ============================================================================
// Concurrency and ordering
// ============================================================================

#[tokio::test]
async fn test_running_jobs_never_exceed_concurrency() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://busy.test");
    let scheduler = start(&engine, config(2)).await;

    let ids: Vec<JobId> = (0..6)
        .map(|_| scheduler.submit(spec("https://busy.test")).unwrap())
        .collect();

    wait_status(&scheduler, &ids[0], JobStatus::Running).await;
    wait_status(&scheduler, &ids[1], JobStatus::Running).await;
    let stats = scheduler.stats();
    assert_eq!(stats.running_count, 2);
    assert_eq!(stats.queued_count, 4);
    assert!(stats.is_saturated());
    assert_eq!(stats.counts.pending, 4);

    gate.open();
    for id in &ids {
        assert_eq!(finished(&scheduler, id).await.status, JobStatus::Completed);
    }

    let usage = engine.stats();
    assert!(usage.peak_concurrent_navigations <= 2);
    assert!(usage.sessions_created <= 2);
    assert_eq!(usage.double_closes, 0);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_single_worker_runs_jobs_in_submission_order() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://a.test");
    let scheduler = start(&engine, config(1)).await;

    let a = scheduler.submit(spec("https://a.test")).unwrap();
    let b = scheduler.submit(spec("https://b.test")).unwrap();
    let c = scheduler.submit(spec("https://c.test")).unwrap();

    wait_status(&scheduler, &a, JobStatus::Running).await;
    assert_eq!(scheduler.get_status(&b).unwrap().status, JobStatus::Pending);

    gate.open();
    for id in [&a, &b, &c] {
        finished(&scheduler, id).await;
    }

    assert_eq!(
        engine.navigation_order(),
        vec!["https://a.test/", "https://b.test/", "https://c.test/"]
    );

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_sessions_are_reused_between_jobs() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    for _ in 0..3 {
        let id = scheduler.submit(spec("https://example.com")).unwrap();
        finished(&scheduler, &id).await;
    }

    let usage = engine.stats();
    assert_eq!(usage.sessions_created, 1);
    assert_eq!(usage.configure_calls, 3);
    assert_eq!(scheduler.stats().pool.idle, 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_pool_exhaustion_fails_with_pool_timeout() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://held.test");
    let config = config(2)
        .with_pool(PoolConfig::new(1))
        .with_lease_timeout(Duration::from_millis(100));
    let scheduler = start(&engine, config).await;

    let holder = scheduler.submit(spec("https://held.test")).unwrap();
    wait_status(&scheduler, &holder, JobStatus::Running).await;
    let starved = scheduler.submit(spec("https://other.test")).unwrap();

    let snapshot = finished(&scheduler, &starved).await;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.failure, Some(FailureKind::PoolTimeout));

    gate.open();
    assert_eq!(finished(&scheduler, &holder).await.status, JobStatus::Completed);
    scheduler.shutdown().await;
}

// ============================================================================
// Cancellation and timeouts
// ============================================================================

#[tokio::test]
async fn test_cancelled_pending_job_never_runs() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://first.test");
    let scheduler = start(&engine, config(1)).await;

    let first = scheduler.submit(spec("https://first.test")).unwrap();
    let second = scheduler.submit(spec("https://second.test")).unwrap();
    wait_status(&scheduler, &first, JobStatus::Running).await;

    assert_eq!(scheduler.cancel(&second), CancelOutcome::Cancelled);
    assert_eq!(scheduler.get_status(&second).unwrap().status, JobStatus::Cancelled);

    gate.open();
    finished(&scheduler, &first).await;

    let snapshot = scheduler.get_status(&second).unwrap();
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert!(snapshot.started_at.is_none());
    assert!(!engine
        .navigation_order()
        .contains(&"https://second.test/".to_string()));
    assert!(matches!(
        scheduler.get_result(&second),
        Err(ResultError::Cancelled { .. })
    ));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_cancel_running_job_stops_at_next_stage() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://example.com");
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler
        .submit(spec("https://example.com").with_wait_time(Duration::from_secs(30)))
        .unwrap();
    wait_status(&scheduler, &id, JobStatus::Running).await;

    assert_eq!(scheduler.cancel(&id), CancelOutcome::CancellationRequested);
    gate.open();

    let snapshot = finished(&scheduler, &id).await;
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.detail.as_deref(), Some("cancelled by request"));
    assert!(!snapshot.has_result);

    // A cancelled job's session is healthy and goes back to the pool.
    assert_eq!(engine.stats().sessions_closed, 0);
    assert_eq!(scheduler.stats().pool.idle, 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    finished(&scheduler, &id).await;

    assert_eq!(
        scheduler.cancel(&id),
        CancelOutcome::AlreadyTerminal(JobStatus::Completed)
    );
    assert!(scheduler.get_result(&id).is_ok());

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_timeout_fails_job_and_destroys_session() {
    let engine = FixtureEngine::new().with_page(
        "https://slow.test",
        FixturePage::new().with_load_delay(Duration::from_secs(10)),
    );
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler
        .submit(spec("https://slow.test").with_timeout(Duration::from_millis(200)))
        .unwrap();

    let snapshot = finished(&scheduler, &id).await;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.failure, Some(FailureKind::Timeout));

    let pool = scheduler.stats().pool;
    assert_eq!(pool.idle, 0);
    assert_eq!(pool.leased, 0);
    assert_eq!(engine.stats().sessions_closed, 1);
    assert_eq!(engine.stats().live_sessions, 0);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_out_of_range_timeout_fails_without_stalling_worker() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let unbounded = scheduler
        .submit(spec("https://example.com").with_timeout(Duration::from_secs(u64::MAX)))
        .unwrap();
    let next = scheduler.submit(spec("https://example.com")).unwrap();

    let snapshot = finished(&scheduler, &unbounded).await;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.failure, Some(FailureKind::Engine));
    assert!(snapshot.detail.unwrap().contains("out of range"));

    assert_eq!(finished(&scheduler, &next).await.status, JobStatus::Completed);
    assert_eq!(engine.stats().sessions_created, 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_oversized_request_timeout_is_rejected() {
    let mut raw = RawRequest::new("https://example.com");
    raw.timeout = Some(1e30);
    assert_eq!(validate(&raw), Err(ValidationError::InvalidTimeout(1e30)));

    raw.timeout = Some(1.5e19);
    assert_eq!(validate(&raw), Err(ValidationError::InvalidTimeout(1.5e19)));
}

// ============================================================================
// Pipeline behaviour
// ============================================================================

#[tokio::test]
async fn test_missing_element_fails_with_element_not_found() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let job = spec("https://example.com")
        .with_selector(SelectorDescriptor::new(SelectorKind::Css, "#missing"));
    let id = scheduler.submit(job).unwrap();

    let snapshot = finished(&scheduler, &id).await;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.failure, Some(FailureKind::ElementNotFound));
    assert!(snapshot.detail.unwrap().contains("#missing"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_element_capture() {
    let engine = FixtureEngine::new().with_page(
        "https://example.com",
        FixturePage::new().with_element(css("[id=\"main\"]")),
    );
    let scheduler = start(&engine, config(1)).await;

    let job = spec("https://example.com")
        .with_selector(SelectorDescriptor::new(SelectorKind::Id, "main"));
    let id = scheduler.submit(job).unwrap();
    finished(&scheduler, &id).await;

    let image = text(&scheduler.get_result(&id).unwrap());
    assert!(image.starts_with("png|"));
    assert!(image.contains("element"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_canvas_export_and_fallback() {
    let page = FixturePage::new().with_canvas(css("#chart"));
    let job = || {
        spec("https://chart.test")
            .with_selector(SelectorDescriptor::new(SelectorKind::Canvas, "#chart"))
    };

    let exporting = FixtureEngine::new().with_page("https://chart.test", page.clone());
    let scheduler = start(&exporting, config(1)).await;
    let id = scheduler.submit(job()).unwrap();
    finished(&scheduler, &id).await;
    assert!(text(&scheduler.get_result(&id).unwrap()).starts_with("canvas|"));
    scheduler.shutdown().await;

    let fallback = FixtureEngine::new()
        .without_canvas_export()
        .with_page("https://chart.test", page);
    let scheduler = start(&fallback, config(1)).await;
    let id = scheduler.submit(job()).unwrap();
    assert_eq!(finished(&scheduler, &id).await.status, JobStatus::Completed);
    assert!(text(&scheduler.get_result(&id).unwrap()).starts_with("png|"));
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_iframe_capture() {
    let engine = FixtureEngine::new().with_page(
        "https://embed.test",
        FixturePage::new().with_frame(css("iframe.player")),
    );
    let scheduler = start(&engine, config(1)).await;

    let job = spec("https://embed.test")
        .with_selector(SelectorDescriptor::new(SelectorKind::Iframe, "iframe.player"));
    let id = scheduler.submit(job).unwrap();
    finished(&scheduler, &id).await;

    assert!(text(&scheduler.get_result(&id).unwrap()).contains("frame"));
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_navigation_is_retried() {
    let engine = FixtureEngine::new()
        .with_page("https://flaky.test", FixturePage::new().with_navigation_failures(2))
        .with_page("https://down.test", FixturePage::new().unreachable());
    let scheduler = start(&engine, config(1)).await;

    let flaky = scheduler.submit(spec("https://flaky.test")).unwrap();
    assert_eq!(finished(&scheduler, &flaky).await.status, JobStatus::Completed);
    assert_eq!(engine.sessions_for("https://flaky.test").len(), 3);

    let down = scheduler.submit(spec("https://down.test")).unwrap();
    let snapshot = finished(&scheduler, &down).await;
    assert_eq!(snapshot.failure, Some(FailureKind::Navigation));
    assert!(snapshot.detail.unwrap().contains("3 attempt"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_custom_script_runs_after_dialog_suppression() {
    let engine = FixtureEngine::new()
        .with_page("https://broken.test", FixturePage::new().with_script_error("boom"));
    let scheduler = start(&engine, config(1)).await;

    let ok = scheduler
        .submit(spec("https://example.com").with_script("document.title"))
        .unwrap();
    finished(&scheduler, &ok).await;
    assert_eq!(
        engine.evaluated_scripts(),
        vec![DIALOG_SUPPRESSION_SCRIPT.to_string(), "document.title".to_string()]
    );

    let broken = scheduler
        .submit(spec("https://broken.test").with_script("explode()"))
        .unwrap();
    let snapshot = finished(&scheduler, &broken).await;
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.failure, Some(FailureKind::Script));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_session_creation_failure_fails_job() {
    let engine = FixtureEngine::new();
    engine.refuse_sessions(true);
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    let snapshot = finished(&scheduler, &id).await;
    assert_eq!(snapshot.failure, Some(FailureKind::Engine));

    engine.refuse_sessions(false);
    let id = scheduler.submit(spec("https://example.com")).unwrap();
    assert_eq!(finished(&scheduler, &id).await.status, JobStatus::Completed);

    scheduler.shutdown().await;
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_sweep_removes_expired_jobs() {
    let engine = FixtureEngine::new();
    let config = config(1).with_sweeper(
        SweeperConfig::default().with_retention(Duration::from_millis(50)),
    );
    let scheduler = start(&engine, config).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    finished(&scheduler, &id).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = scheduler.sweep_now().await;
    assert_eq!(report.jobs_removed, 1);
    assert!(scheduler.get_status(&id).is_none());
    assert_eq!(scheduler.get_result(&id), Err(ResultError::NotFound(id.clone())));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_sweep_never_reclaims_running_job_lease() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://example.com");
    let config = config(1).with_sweeper(
        SweeperConfig::default().with_lease_idle(Duration::from_millis(10)),
    );
    let scheduler = start(&engine, config).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    wait_status(&scheduler, &id, JobStatus::Running).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let report = scheduler.sweep_now().await;
    assert_eq!(report.leases_reclaimed, 0);
    assert_eq!(report.leases_skipped, 1);
    assert_eq!(scheduler.stats().pool.leased, 1);

    gate.open();
    assert_eq!(finished(&scheduler, &id).await.status, JobStatus::Completed);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_delete_removes_terminal_job() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let id = scheduler.submit(spec("https://example.com")).unwrap();
    finished(&scheduler, &id).await;

    assert_eq!(
        scheduler.delete(&id),
        CancelOutcome::AlreadyTerminal(JobStatus::Completed)
    );
    assert!(scheduler.get_status(&id).is_none());
    assert_eq!(scheduler.stats().tracked_total, 0);

    scheduler.shutdown().await;
}

// ============================================================================
// Synchronous capture
// ============================================================================

#[tokio::test]
async fn test_synchronous_capture() {
    let engine = FixtureEngine::new();
    let scheduler = start(&engine, config(1)).await;

    let image = scheduler.capture(spec("https://example.com")).await.unwrap();
    assert!(text(&image).contains("https://example.com/"));
    assert_eq!(scheduler.stats().tracked_total, 0);

    let missing = spec("https://example.com")
        .with_selector(SelectorDescriptor::new(SelectorKind::Css, "#missing"));
    match scheduler.capture(missing).await {
        Err(CaptureError::Failed { kind, .. }) => assert_eq!(kind, FailureKind::ElementNotFound),
        other => panic!("expected element-not-found failure, got {:?}", other),
    }

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_synchronous_capture_timeout() {
    let engine = FixtureEngine::new().with_page(
        "https://slow.test",
        FixturePage::new().with_load_delay(Duration::from_secs(10)),
    );
    let scheduler = start(&engine, config(1)).await;

    let err = scheduler
        .capture(spec("https://slow.test").with_timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_abandoned_capture_is_cancelled() {
    let engine = FixtureEngine::new();
    let gate = engine.gate("https://first.test");
    let scheduler = start(&engine, config(1)).await;

    let first = scheduler.submit(spec("https://first.test")).unwrap();
    wait_status(&scheduler, &first, JobStatus::Running).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        scheduler.capture(spec("https://second.test")),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(scheduler.stats().queued_count, 0);

    gate.open();
    finished(&scheduler, &first).await;
    assert!(!engine
        .navigation_order()
        .contains(&"https://second.test/".to_string()));

    scheduler.shutdown().await;
}

// ============================================================================
// Stats and shutdown
// ============================================================================

#[tokio::test]
async fn test_stats_include_host_metrics() {
    let engine = FixtureEngine::new();
    let host = Arc::new(|| HostSnapshot {
        cpu_percent: Some(12.5),
        memory_percent: Some(40.0),
    });
    let scheduler = Scheduler::start_with_metrics(Arc::new(engine), config(3), host).await;

    let stats = scheduler.stats();
    assert_eq!(stats.max_concurrency, 3);
    assert_eq!(stats.running_count, 0);
    assert_eq!(stats.host.cpu_percent, Some(12.5));
    assert_eq!(stats.pool.capacity, 3);

    let json = serde_json::to_value(&stats).unwrap();
    assert!(json.get("counts").is_some());

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_prewarm_creates_idle_sessions() {
    let engine = FixtureEngine::new();
    let config = config(2).with_pool(PoolConfig::new(2).with_prewarm(2));
    let scheduler = start(&engine, config).await;

    assert_eq!(engine.stats().sessions_created, 2);
    assert_eq!(scheduler.stats().pool.idle, 2);

    scheduler.shutdown().await;
    assert_eq!(engine.stats().live_sessions, 0);
}

#[tokio::test]
async fn test_shutdown_cancels_outstanding_work() {
    let engine = FixtureEngine::new();
    let _gate = engine.gate("https://stuck.test");
    let scheduler = start(&engine, config(1)).await;

    let running = scheduler.submit(spec("https://stuck.test")).unwrap();
    wait_status(&scheduler, &running, JobStatus::Running).await;
    let pending = scheduler.submit(spec("https://example.com")).unwrap();

    scheduler.shutdown().await;

    let snapshot = scheduler.get_status(&pending).unwrap();
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.detail.as_deref(), Some("scheduler shutting down"));
    assert_eq!(scheduler.get_status(&running).unwrap().status, JobStatus::Cancelled);

    assert_eq!(
        scheduler.submit(spec("https://example.com")),
        Err(SubmitError::ShuttingDown)
    );
    assert!(scheduler.pool().is_closed());
    assert!(scheduler.is_shut_down());
}
