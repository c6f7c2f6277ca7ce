use crate::metrics::Metrics;
use crate::models::FileOutcome;
use crate::services::BatchProgress;
use crate::state::JobStateManager;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Paths already handled by the current job, in processing order.
///
/// Grows for the whole life of a monitor session; there is no eviction.
#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    paths: IndexSet<Utf8PathBuf>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.paths.contains(path)
    }

    /// Returns false when `path` was already present.
    pub fn insert(&mut self, path: Utf8PathBuf) -> bool {
        self.paths.insert(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.paths.iter()
    }

    pub fn into_paths(self) -> Vec<Utf8PathBuf> {
        self.paths.into_iter().collect()
    }
}

/// The job worker's view of its own progress.
///
/// Owned by the worker alone: it holds the seen-set, observes the
/// cancellation flag and records every per-file result into the shared
/// status, the event stream and the metrics.
pub struct JobProgress {
    state: JobStateManager,
    metrics: Arc<Metrics>,
    cancel_rx: watch::Receiver<bool>,
    seen: SeenSet,
    file_started_at: Option<Instant>,
    stop_observed: Cell<bool>,
}

impl JobProgress {
    pub fn new(
        state: JobStateManager,
        metrics: Arc<Metrics>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            metrics,
            cancel_rx,
            seen: SeenSet::new(),
            file_started_at: None,
            stop_observed: Cell::new(false),
        }
    }

    /// A receiver for waiting on cancellation between checkpoints.
    pub fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    pub fn has_seen(&self, path: &Utf8Path) -> bool {
        self.seen.contains(path)
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// True once a cancellation checkpoint has actually stopped the job.
    pub fn stop_observed(&self) -> bool {
        self.stop_observed.get()
    }

    pub fn into_seen(self) -> SeenSet {
        self.seen
    }
}

impl BatchProgress for JobProgress {
    fn should_stop(&self) -> bool {
        let cancelled = *self.cancel_rx.borrow();
        if cancelled {
            self.stop_observed.set(true);
        }
        cancelled
    }

    fn file_started(&mut self, path: &Utf8Path) {
        self.file_started_at = Some(Instant::now());
        self.state.file_started(path);
    }

    fn file_finished(&mut self, path: &Utf8Path, outcome: FileOutcome) {
        if let Some(started) = self.file_started_at.take() {
            self.metrics.record_processing_time(started.elapsed());
        }
        if outcome.is_success() {
            self.metrics.record_file_processed();
        } else {
            self.metrics.record_file_failed();
        }

        // Failed files are marked seen too; they are not retried this session
        self.seen.insert(path.to_path_buf());
        self.state.file_finished(path, &outcome, self.seen.len());
    }
}
