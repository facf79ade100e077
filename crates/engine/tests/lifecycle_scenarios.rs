// crates/engine/tests/lifecycle_scenarios.rs
//! End-to-end scenarios across the lifecycle controller, correlation
//! table, webhook applier and progress feeds.

use std::sync::Arc;
use std::time::Duration;

use docstream_engine::{
    CallbackDisposition, CallbackStatus, EngineError, JobEngine, JobKind, JobStatus, UnitOutcome,
    WebhookPayload,
};
use pretty_assertions::assert_eq;

fn success() -> UnitOutcome {
    UnitOutcome::Succeeded { detail: None }
}

fn failure(msg: &str) -> UnitOutcome {
    UnitOutcome::Failed { error: msg.into() }
}

fn completed_callback(external_id: &str) -> WebhookPayload {
    WebhookPayload {
        external_id: external_id.into(),
        status: CallbackStatus::Completed,
        result: Some(serde_json::json!({ "verdict": "approved" })),
        error: None,
    }
}

#[test]
fn bulk_job_completes_with_partial_success() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::BulkImport, "users_batch_oct15.xlsx", 3);
    engine.start(job.id).unwrap();

    engine.record_unit_result(job.id, 0, success()).unwrap();
    engine
        .record_unit_result(job.id, 1, failure("duplicate username"))
        .unwrap();
    let snap = engine.record_unit_result(job.id, 2, success()).unwrap();

    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.processed_units, 3);
    assert_eq!(snap.success_count, 2);
    assert_eq!(snap.failure_count, 1);
    assert_eq!(snap.percent, 100);

    let results = engine.list_unit_results(job.id).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[1].error.as_deref(), Some("duplicate username"));
}

#[tokio::test]
async fn duplicate_terminal_webhook_is_a_noop() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::AiModeration, "handbook.pdf", 0);
    engine.start(job.id).unwrap();
    engine.register_external(job.id, "ext-1").unwrap();

    let first = engine
        .apply_callback(completed_callback("ext-1"))
        .await
        .unwrap();
    assert!(matches!(first, CallbackDisposition::Applied(_)));
    let completed_at = engine.get_job(job.id).unwrap().completed_at;

    // Identical redelivery: no error, no side effects.
    let second = engine
        .apply_callback(completed_callback("ext-1"))
        .await
        .unwrap();
    assert!(matches!(second, CallbackDisposition::Duplicate(_)));
    assert_eq!(second.snapshot().status, JobStatus::Completed);

    let job = engine.get_job(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_at, completed_at);
    assert_eq!(job.result, Some(serde_json::json!({ "verdict": "approved" })));
}

#[tokio::test]
async fn conflicting_webhook_after_terminal_is_discarded() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::AiModeration, "handbook.pdf", 0);
    engine.start(job.id).unwrap();
    engine.register_external(job.id, "ext-1").unwrap();
    engine
        .apply_callback(completed_callback("ext-1"))
        .await
        .unwrap();

    // A late "failed" signal loses against the already-terminal state.
    let late = engine
        .apply_callback(WebhookPayload {
            external_id: "ext-1".into(),
            status: CallbackStatus::Failed,
            result: None,
            error: Some("timeout".into()),
        })
        .await
        .unwrap();
    assert!(matches!(late, CallbackDisposition::Duplicate(_)));

    let job = engine.get_job(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn unregistered_external_id_surfaces_unresolved_then_retry_succeeds() {
    let engine = JobEngine::new();

    let err = engine
        .apply_callback(completed_callback("ext-9"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unresolved { .. }));

    // The external system redelivers after registration completed.
    let job = engine.create_job(JobKind::AiModeration, "late.pdf", 0);
    engine.start(job.id).unwrap();
    engine.register_external(job.id, "ext-9").unwrap();

    let retried = engine
        .apply_callback(completed_callback("ext-9"))
        .await
        .unwrap();
    assert!(matches!(retried, CallbackDisposition::Applied(_)));
    assert_eq!(engine.get_job(job.id).unwrap().status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn callback_waits_out_the_registration_race() {
    let engine = Arc::new(JobEngine::new());
    let job = engine.create_job(JobKind::AiModeration, "racy.pdf", 0);
    engine.start(job.id).unwrap();

    // Registration lands while the applier is already backing off.
    let registrar = Arc::clone(&engine);
    let job_id = job.id;
    let register = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        registrar.register_external(job_id, "ext-race").unwrap();
    });

    let disposition = engine
        .apply_callback(completed_callback("ext-race"))
        .await
        .unwrap();
    assert!(matches!(disposition, CallbackDisposition::Applied(_)));
    register.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn bulk_jobs_cannot_be_completed_by_callbacks() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::BulkImport, "rows.xlsx", 3);
    engine.start(job.id).unwrap();
    engine.record_unit_result(job.id, 0, success()).unwrap();

    // A row-driven job cannot be correlated, so no webhook path exists
    // that could mark it terminal with rows outstanding.
    let err = engine.register_external(job.id, "ext-bulk").unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let err = engine
        .apply_callback(completed_callback("ext-bulk"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unresolved { .. }));

    let job = engine.get_job(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.processed_units, 1);
}

#[test]
fn double_start_is_an_invalid_transition() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::BulkImport, "batch.xlsx", 1);
    engine.start(job.id).unwrap();

    let err = engine.start(job.id).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            current: JobStatus::Processing,
            attempted: "start",
            ..
        }
    ));
    assert_eq!(engine.get_job(job.id).unwrap().status, JobStatus::Processing);
}

#[test]
fn concurrent_workers_record_all_units_exactly_once() {
    let engine = JobEngine::new();
    let n: u32 = 24;
    let job = engine.create_job(JobKind::BulkImport, "big_batch.xlsx", n);
    engine.start(job.id).unwrap();

    std::thread::scope(|scope| {
        for index in 0..n {
            let engine = &engine;
            let job_id = job.id;
            scope.spawn(move || {
                engine
                    .record_unit_result(job_id, index, success())
                    .unwrap();
                // At-least-once redelivery from another worker; may also
                // arrive after the job completed, which is rejected.
                let _ = engine.record_unit_result(job_id, index, success());
            });
        }
    });

    let job = engine.get_job(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.processed_units, n);
    assert_eq!(job.success_count, n);
    assert_eq!(job.failure_count, 0);

    let results = engine.list_unit_results(job.id).unwrap();
    assert_eq!(results.len(), n as usize);
    let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..n).collect::<Vec<u32>>());
}

#[test]
fn readers_observe_monotonic_state() {
    let engine = Arc::new(JobEngine::new());
    let n: u32 = 64;
    let job = engine.create_job(JobKind::BulkImport, "watch.xlsx", n);
    engine.start(job.id).unwrap();
    let job_id = job.id;

    let reader_engine = Arc::clone(&engine);
    let reader = std::thread::spawn(move || {
        let mut last_processed = 0u32;
        let mut last_rank = 0u8;
        loop {
            let job = reader_engine.get_job(job_id).unwrap();
            assert!(job.processed_units >= last_processed, "processed went backwards");
            assert!(job.status.rank() >= last_rank, "status regressed");
            assert_eq!(job.success_count + job.failure_count, job.processed_units);
            last_processed = job.processed_units;
            last_rank = job.status.rank();
            if job.status.is_terminal() {
                break;
            }
        }
    });

    for index in 0..n {
        engine.record_unit_result(job_id, index, success()).unwrap();
    }
    reader.join().unwrap();
}

#[tokio::test]
async fn subscriber_gets_baseline_before_live_updates() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::BulkImport, "live.xlsx", 2);
    engine.start(job.id).unwrap();
    engine.record_unit_result(job.id, 0, success()).unwrap();

    // Join mid-job: the current state arrives first.
    let mut feed = engine.subscribe(job.id).unwrap();
    let baseline = feed.recv().await.unwrap();
    assert_eq!(baseline.processed_units, 1);
    assert_eq!(baseline.status, JobStatus::Processing);

    engine.record_unit_result(job.id, 1, success()).unwrap();
    let live = feed.recv().await.unwrap();
    assert_eq!(live.processed_units, 2);
    assert_eq!(live.status, JobStatus::Completed);
    assert_eq!(live.percent, 100);
}

#[tokio::test]
async fn global_feed_carries_every_job() {
    let engine = JobEngine::new();
    let mut feed = engine.subscribe_all();

    let a = engine.create_job(JobKind::BulkImport, "a.xlsx", 1);
    let b = engine.create_job(JobKind::AiModeration, "b.pdf", 0);
    engine.start(a.id).unwrap();
    engine.start(b.id).unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..2 {
        seen.insert(feed.recv().await.unwrap().job_id);
    }
    assert!(seen.contains(&a.id));
    assert!(seen.contains(&b.id));
}

#[test]
fn supervisory_timeout_can_fail_a_stuck_job() {
    let engine = JobEngine::new();
    let job = engine.create_job(JobKind::AiModeration, "stuck.pdf", 0);
    engine.start(job.id).unwrap();

    // The SLA checker is a collaborator; the engine just accepts the fail.
    engine.fail(job.id, "moderation SLA exceeded").unwrap();

    let job = engine.get_job(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("moderation SLA exceeded"));

    // And the terminal state is frozen afterwards.
    assert!(engine.fail(job.id, "again").is_err());
    assert!(engine.complete(job.id, None).is_err());
}
