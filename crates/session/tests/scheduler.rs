//! Integration tests for the poll scheduler.
//!
//! Intervals are kept in the tens of milliseconds so the tests observe
//! several ticks quickly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use common::{session_with, FakeBackend};
use pokegen_client::TaskStatus;
use pokegen_core::job::JobStatus;
use pokegen_core::types::JobId;
use pokegen_session::{PollOutcome, PollScheduler};

const FAST: Duration = Duration::from_millis(20);
const TEST_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn polls_until_completed_then_stops() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_task_ids(&["abc123"])
            .with_statuses(vec![
                TaskStatus::Processing,
                TaskStatus::Processing,
                TaskStatus::Processing,
                TaskStatus::Completed,
            ]),
    );
    let session = session_with(Arc::clone(&backend));
    session.submit("X").await.unwrap();

    let handle = PollScheduler::new(FAST).start(Arc::clone(&session));
    let outcome = tokio::time::timeout(TEST_DEADLINE, handle.finished())
        .await
        .expect("scheduler should finish");

    assert_eq!(
        outcome,
        PollOutcome::Finished {
            job_id: JobId::new("abc123"),
            status: JobStatus::Completed,
        }
    );
    assert_eq!(backend.poll_count(), 4);

    // No further polls after the terminal transition.
    tokio::time::sleep(FAST * 5).await;
    assert_eq!(backend.poll_count(), 4);

    assert_eq!(session.result().await.unwrap().prompt_used, "X");
    assert_eq!(backend.fetch_count(), 1);
}

#[tokio::test]
async fn stops_on_failure() {
    let backend = Arc::new(FakeBackend::new().with_statuses(vec![TaskStatus::Failed {
        error: Some("OOM".into()),
    }]));
    let session = session_with(Arc::clone(&backend));
    session.submit("X").await.unwrap();

    let outcome = tokio::time::timeout(
        TEST_DEADLINE,
        PollScheduler::new(FAST).start(Arc::clone(&session)).finished(),
    )
    .await
    .unwrap();

    assert_matches!(outcome, PollOutcome::Finished { status: JobStatus::Failed, .. });
    assert_eq!(backend.fetch_count(), 0);
}

#[tokio::test]
async fn transient_poll_errors_are_retried() {
    let backend = Arc::new(FakeBackend::new().with_poll_answers(vec![
        Err(503),
        Err(500),
        Ok(TaskStatus::Processing),
        Ok(TaskStatus::Completed),
    ]));
    let session = session_with(Arc::clone(&backend));
    session.submit("X").await.unwrap();

    let outcome = tokio::time::timeout(
        TEST_DEADLINE,
        PollScheduler::new(FAST).start(Arc::clone(&session)).finished(),
    )
    .await
    .unwrap();

    assert_matches!(outcome, PollOutcome::Finished { status: JobStatus::Completed, .. });
    assert_eq!(backend.poll_count(), 4);
}

#[tokio::test]
async fn manual_check_polls_immediately() {
    let backend = Arc::new(FakeBackend::new().with_statuses(vec![TaskStatus::Completed]));
    let session = session_with(Arc::clone(&backend));
    session.submit("X").await.unwrap();

    // The timer alone would not fire during this test.
    let handle = PollScheduler::new(Duration::from_secs(3600)).start(Arc::clone(&session));
    handle.check_now();

    let outcome = tokio::time::timeout(TEST_DEADLINE, handle.finished())
        .await
        .expect("manual check should finish the job");
    assert_matches!(outcome, PollOutcome::Finished { status: JobStatus::Completed, .. });
    assert_eq!(backend.poll_count(), 1);
}

#[tokio::test]
async fn reset_stops_polling() {
    let backend = Arc::new(FakeBackend::new().with_task_ids(&["abc123"]));
    let session = session_with(Arc::clone(&backend));
    session.submit("X").await.unwrap();

    let handle = PollScheduler::new(FAST).start(Arc::clone(&session));
    tokio::time::sleep(FAST * 3).await;
    session.reset().await;

    let outcome = tokio::time::timeout(TEST_DEADLINE, handle.finished())
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::Superseded);

    let polls = backend.poll_count();
    tokio::time::sleep(FAST * 5).await;
    assert_eq!(backend.poll_count(), polls);
    assert_eq!(backend.cleaned_ids(), vec![JobId::new("abc123")]);
}

#[tokio::test]
async fn stop_cancels_a_running_scheduler() {
    let backend = Arc::new(FakeBackend::new());
    let session = session_with(Arc::clone(&backend));
    session.submit("X").await.unwrap();

    let handle = PollScheduler::new(FAST).start(Arc::clone(&session));
    tokio::time::sleep(FAST * 2).await;
    assert!(!handle.is_finished());

    assert_eq!(handle.stop().await, PollOutcome::Cancelled);
    assert_eq!(session.status().await, JobStatus::Processing);
}

#[tokio::test]
async fn nothing_to_poll_without_a_job() {
    let backend = Arc::new(FakeBackend::new());
    let session = session_with(Arc::clone(&backend));

    let outcome = tokio::time::timeout(
        TEST_DEADLINE,
        PollScheduler::new(FAST).start(session).finished(),
    )
    .await
    .unwrap();
    assert_eq!(outcome, PollOutcome::Superseded);
    assert_eq!(backend.poll_count(), 0);
}
