//! Integration tests for JobStateManager and the status event stream
//!
//! These tests verify that the JobStateManager correctly:
//! - Emits lifecycle events on state transitions
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple tasks
//! - Never blocks on slow or absent subscribers

use camino::Utf8Path;
use docgate::models::FileOutcome;
use docgate::{JobMode, JobState, JobStateManager, StatusEvent, StatusKind};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn test_lifecycle_events_emitted() {
    let state = Arc::new(JobStateManager::default());
    let mut rx = state.subscribe();

    state.begin_validation(JobMode::Monitor);
    state.start_running();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert_eq!(event.kind, StatusKind::Started);
    assert_eq!(event.message, "Monitoring started...");
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(JobStateManager::default());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.file_started(Utf8Path::new("/in/PID-100.pdf"));

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout")
            .expect("Channel closed");
        assert_eq!(event.kind, StatusKind::Found);
        assert_eq!(event.message, "Found: PID-100.pdf");
    }
}

#[tokio::test]
async fn test_job_event_sequence() {
    let state = Arc::new(JobStateManager::default());
    let mut rx = state.subscribe();

    state.begin_validation(JobMode::Batch);
    state.start_running();
    let path = Utf8Path::new("/in/a.pdf");
    state.file_started(path);
    state.file_finished(path, &FileOutcome::Succeeded, 1);
    state.finish(JobState::Completed, None);

    let mut kinds = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        kinds.push(event.kind);
    }

    assert_eq!(
        kinds,
        vec![
            StatusKind::Started,
            StatusKind::Found,
            StatusKind::Success,
            StatusKind::Stopped
        ]
    );

    let status = state.snapshot();
    assert_eq!(status.state, JobState::Completed);
    assert!(status.started_at.is_some());
    assert!(status.finished_at.is_some());
}

#[tokio::test]
async fn test_concurrent_state_access() {
    let state = Arc::new(JobStateManager::default());

    let mut handles = vec![];
    for i in 0..10 {
        let state_clone = state.clone();
        let handle = tokio::spawn(async move {
            let path = format!("/in/{}.pdf", i);
            state_clone.file_finished(Utf8Path::new(&path), &FileOutcome::Succeeded, i + 1);
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    // Every increment lands; `seen` is last write wins
    let status = state.snapshot();
    assert_eq!(status.processed, 10);
    assert!(status.seen >= 1 && status.seen <= 10);
}

#[tokio::test]
async fn test_slow_subscriber_never_blocks_sender() {
    let state = Arc::new(JobStateManager::new(docgate::StatusSink::new(
        4,
        Arc::new(docgate::metrics::Metrics::new()),
    )));
    let _idle_rx = state.subscribe();

    // Far more events than the channel holds; none of these may block
    let result = timeout(Duration::from_millis(500), async {
        for i in 0..1_000 {
            state.report_error(format!("error {}", i));
        }
    })
    .await;

    assert!(result.is_ok(), "Sending must not wait for subscribers");
}

#[test]
fn test_rendered_lines() {
    let started = StatusEvent::started(JobMode::Monitor).render();
    assert!(started.ends_with("] Monitoring started..."));

    let error = StatusEvent::error("Discovery failed").render();
    assert!(error.starts_with('['));
    assert!(error.ends_with("] Discovery failed"));
}
