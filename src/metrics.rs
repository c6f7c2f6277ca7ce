// Performance metrics module
//
// Lightweight counters for the job worker and the status stream

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide job metrics
///
/// Uses atomic operations so the worker task, the status sink and the CLI can
/// share one instance without locks. Counters accumulate over every job of a
/// controller; job-end summaries are scoped with [`Metrics::snapshot`].
#[derive(Debug)]
pub struct Metrics {
    /// Files the gateway reported as processed
    pub files_processed: AtomicUsize,

    /// Files the gateway failed or errored on
    pub files_failed: AtomicUsize,

    /// Total time spent inside the gateway in milliseconds
    pub total_processing_time_ms: AtomicU64,

    /// Completed monitor polls
    pub poll_ticks: AtomicU64,

    /// Polls whose discovery failed
    pub discovery_errors: AtomicU64,

    /// Status events delivered to at least one subscriber
    pub events_sent: AtomicU64,

    /// Status events emitted while nobody was subscribed
    pub events_dropped: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            files_processed: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            total_processing_time_ms: AtomicU64::new(0),
            poll_ticks: AtomicU64::new(0),
            discovery_errors: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent on one file, whatever its outcome
    pub fn record_processing_time(&self, duration: Duration) {
        self.total_processing_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_poll_tick(&self) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovery_error(&self) {
        self.discovery_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average gateway time per handled file in milliseconds
    pub fn avg_processing_time_ms(&self) -> f64 {
        let total = self.total_processing_time_ms.load(Ordering::Relaxed);
        let count = self.files_processed.load(Ordering::Relaxed)
            + self.files_failed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Current file and poll counters, for scoping a summary to one job
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            total_processing_time_ms: self.total_processing_time_ms.load(Ordering::Relaxed),
            poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
            discovery_errors: self.discovery_errors.load(Ordering::Relaxed),
        }
    }

    /// Log what happened since `baseline` was taken, plus the controller's
    /// lifetime event counters.
    pub fn log_job_summary(&self, baseline: &MetricsSnapshot, elapsed: Duration) {
        let job = self.snapshot().since(baseline);
        tracing::info!("=== Job Metrics Summary ===");
        tracing::info!("Duration: {:.2}s", elapsed.as_secs_f64());
        tracing::info!(
            "Files: {} processed, {} failed",
            job.files_processed,
            job.files_failed
        );
        tracing::info!(
            "Total processing time: {:.2}s (avg: {:.2}ms per file)",
            job.total_processing_time_ms as f64 / 1000.0,
            job.avg_processing_time_ms()
        );
        tracing::info!(
            "Polls: {}, discovery errors: {}",
            job.poll_ticks,
            job.discovery_errors
        );
        tracing::info!(
            "Status events since startup ({:.0}s): {} sent, {} without subscribers",
            self.uptime().as_secs_f64(),
            self.events_sent(),
            self.events_dropped()
        );
    }

    /// Short progress line for long-running monitor jobs
    pub fn log_periodic(&self) {
        tracing::info!(
            "Metrics: {} files handled, {} polls, uptime {:.0}s",
            self.files_processed.load(Ordering::Relaxed)
                + self.files_failed.load(Ordering::Relaxed),
            self.poll_ticks.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
    }
}

/// Point-in-time copy of the per-job counters in [`Metrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_processing_time_ms: u64,
    pub poll_ticks: u64,
    pub discovery_errors: u64,
}

impl MetricsSnapshot {
    /// Counters accumulated between `earlier` and `self`
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            files_processed: self.files_processed.saturating_sub(earlier.files_processed),
            files_failed: self.files_failed.saturating_sub(earlier.files_failed),
            total_processing_time_ms: self
                .total_processing_time_ms
                .saturating_sub(earlier.total_processing_time_ms),
            poll_ticks: self.poll_ticks.saturating_sub(earlier.poll_ticks),
            discovery_errors: self.discovery_errors.saturating_sub(earlier.discovery_errors),
        }
    }

    pub fn avg_processing_time_ms(&self) -> f64 {
        let count = self.files_processed + self.files_failed;
        if count > 0 {
            self.total_processing_time_ms as f64 / count as f64
        } else {
            0.0
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
