// State management module
//
// The worker of a job publishes its progress through a JobStateManager: a shared
// JobStatus snapshot plus an append-only stream of timestamped StatusEvents.

use crate::metrics::Metrics;
use crate::models::{FileOutcome, JobMode, JobState, JobStatus};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Kind of a status event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Started,
    Found,
    Success,
    Failure,
    Error,
    Stopped,
}

/// One entry of the status stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusEvent {
    pub timestamp: DateTime<Local>,
    pub kind: StatusKind,
    pub message: String,
    pub path: Option<Utf8PathBuf>,
}

impl StatusEvent {
    fn new(kind: StatusKind, message: String, path: Option<Utf8PathBuf>) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
            message,
            path,
        }
    }

    pub fn started(mode: JobMode) -> Self {
        let message = match mode {
            JobMode::Batch => "Processing started...".to_string(),
            JobMode::Monitor => "Monitoring started...".to_string(),
        };
        Self::new(StatusKind::Started, message, None)
    }

    pub fn found(path: &Utf8Path) -> Self {
        Self::new(
            StatusKind::Found,
            format!("Found: {}", display_name(path)),
            Some(path.to_path_buf()),
        )
    }

    pub fn finished(path: &Utf8Path, outcome: &FileOutcome) -> Self {
        let (kind, message) = match outcome {
            FileOutcome::Succeeded => (StatusKind::Success, "  ✓ Success".to_string()),
            FileOutcome::Failed(None) => (StatusKind::Failure, "  ✗ Failed".to_string()),
            FileOutcome::Failed(Some(reason)) => {
                (StatusKind::Failure, format!("  ✗ Error: {}", reason))
            }
        };
        Self::new(kind, message, Some(path.to_path_buf()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Error, message.into(), None)
    }

    pub fn stopped(status: &JobStatus) -> Self {
        let message = match (status.mode, status.state) {
            (Some(JobMode::Monitor), _) => format!(
                "Monitoring stopped. {} processed, {} failed.",
                status.processed, status.failed
            ),
            _ => status.status_line(),
        };
        Self::new(StatusKind::Stopped, message, None)
    }

    /// Render as a console line.
    ///
    /// Per-file results continue the preceding `Found` line and carry no
    /// timestamp; everything else is `[HH:MM:SS] message`.
    pub fn render(&self) -> String {
        match self.kind {
            StatusKind::Success | StatusKind::Failure => self.message.clone(),
            _ => format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message),
        }
    }
}

fn display_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Append-only event stream with best-effort delivery.
///
/// Sending never blocks: a subscriber that falls behind loses the oldest
/// events, and having no subscriber at all is fine.
#[derive(Clone, Debug)]
pub struct StatusSink {
    tx: broadcast::Sender<StatusEvent>,
    metrics: Arc<Metrics>,
}

impl StatusSink {
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, metrics }
    }

    pub fn emit(&self, event: StatusEvent) {
        tracing::debug!("status: {}", event.message);
        match self.tx.send(event) {
            Ok(_) => self.metrics.record_event_sent(),
            Err(_) => self.metrics.record_event_dropped(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for StatusSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY, Arc::new(Metrics::new()))
    }
}

/// Thread-safe job status with event emission
///
/// This is the single place job progress is recorded:
/// - Holds the live [`JobStatus`] behind `Arc<RwLock<T>>`
/// - Detects lifecycle transitions in [`update()`](Self::update) and emits
///   `Started`/`Stopped`/`Error` events for them
/// - Emits per-file `Found`/`Success`/`Failure` events from the file helpers
///
/// Observers use [`snapshot()`](Self::snapshot) or [`read()`](Self::read) and
/// never mutate.
#[derive(Clone, Debug)]
pub struct JobStateManager {
    status: Arc<RwLock<JobStatus>>,
    sink: StatusSink,
}

impl JobStateManager {
    pub fn new(sink: StatusSink) -> Self {
        Self {
            status: Arc::new(RwLock::new(JobStatus::default())),
            sink,
        }
    }

    pub fn sink(&self) -> &StatusSink {
        &self.sink
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sink.subscribe()
    }

    /// Cloned view of the current status.
    pub fn snapshot(&self) -> JobStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&JobStatus) -> R,
    {
        let status = self.status.read().unwrap_or_else(PoisonError::into_inner);
        f(&status)
    }

    /// Mutate the status and emit events for any lifecycle transition.
    ///
    /// # Returns
    /// The events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StatusEvent>
    where
        F: FnOnce(&mut JobStatus),
    {
        let changes = {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            let old_status = status.clone();
            update_fn(&mut status);
            Self::detect_changes(&old_status, &status)
        };

        for change in &changes {
            self.sink.emit(change.clone());
        }

        changes
    }

    fn detect_changes(old: &JobStatus, new: &JobStatus) -> Vec<StatusEvent> {
        let mut changes = Vec::new();

        if old.state != new.state {
            if new.state == JobState::Running {
                if let Some(mode) = new.mode {
                    changes.push(StatusEvent::started(mode));
                }
            } else if new.state.is_terminal() {
                if new.state == JobState::Failed {
                    changes.push(StatusEvent::error(format!(
                        "Processing failed: {}",
                        new.last_error.as_deref().unwrap_or("unknown error")
                    )));
                }
                changes.push(StatusEvent::stopped(new));
            }
        }

        changes
    }

    // Convenience methods used by the job worker

    /// Reset counters and enter `Validating` for a new job.
    pub fn begin_validation(&self, mode: JobMode) -> Vec<StatusEvent> {
        self.update(|status| {
            *status = JobStatus {
                state: JobState::Validating,
                mode: Some(mode),
                ..JobStatus::default()
            };
        })
    }

    /// Validation failed: back to `Idle` with the reason recorded.
    pub fn reject(&self, reason: &str) -> Vec<StatusEvent> {
        self.update(|status| {
            status.state = JobState::Idle;
            status.last_error = Some(reason.to_string());
        })
    }

    pub fn start_running(&self) -> Vec<StatusEvent> {
        self.update(|status| {
            status.state = JobState::Running;
            status.started_at = Some(Local::now());
        })
    }

    pub fn file_started(&self, path: &Utf8Path) {
        self.update(|status| status.current_file = Some(path.to_path_buf()));
        self.sink.emit(StatusEvent::found(path));
    }

    pub fn file_finished(&self, path: &Utf8Path, outcome: &FileOutcome, seen: usize) {
        self.update(|status| {
            if outcome.is_success() {
                status.processed += 1;
            } else {
                status.failed += 1;
            }
            status.seen = seen;
            status.current_file = None;
        });
        self.sink.emit(StatusEvent::finished(path, outcome));
    }

    /// Report a non-fatal error (e.g. a failed poll) without changing state.
    pub fn report_error(&self, message: String) {
        self.sink.emit(StatusEvent::error(message));
    }

    /// Enter a terminal state.
    pub fn finish(&self, state: JobState, error: Option<String>) -> Vec<StatusEvent> {
        self.update(|status| {
            status.state = state;
            status.current_file = None;
            if error.is_some() {
                status.last_error = error;
            }
            status.finished_at = Some(Local::now());
        })
    }
}

impl Default for JobStateManager {
    fn default() -> Self {
        Self::new(StatusSink::default())
    }
}
