use super::progress::SeenSet;
use super::worker::JobWorker;
use crate::config::RuntimeSettings;
use crate::metrics::Metrics;
use crate::models::{Configuration, JobMode, JobReport, JobState, JobStatus, ValidationError};
use crate::services::GatewayClient;
use crate::state::{DEFAULT_EVENT_CAPACITY, JobStateManager, StatusEvent, StatusSink};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Errors surfaced to whoever invoked a controller action
#[derive(Error, Debug)]
pub enum JobError {
    #[error("A job is already running")]
    AlreadyRunning,

    #[error("Configuration invalid: {0}")]
    ConfigInvalid(#[from] ValidationError),

    #[error("No job has been started")]
    NotStarted,

    #[error("Job worker stopped unexpectedly: {0}")]
    Worker(String),
}

/// Tunables for a [`JobController`].
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Wait between monitor polls.
    pub poll_interval: Duration,
    /// Events buffered per status subscriber.
    pub event_capacity: usize,
    pub metrics: Arc<Metrics>,
}

impl JobOptions {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            event_capacity: settings.event_capacity,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(RuntimeSettings::DEFAULT_POLL_INTERVAL_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

struct ActiveJob {
    /// Send `true` to request cancellation at the next checkpoint
    cancel_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<SeenSet>>,
}

/// Owns the lifecycle of one logical job at a time.
///
/// States: `Idle → Validating → Running → Completed | Failed | Cancelled`.
/// [`start`](Self::start) validates synchronously, spawns exactly one worker
/// task on the tokio runtime and returns without waiting for it. While the
/// job runs, the worker is the only writer of its progress; everything read
/// through the controller is a snapshot.
pub struct JobController {
    gateway: Arc<dyn GatewayClient>,
    tokio_handle: Handle,
    state: JobStateManager,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    active: Mutex<Option<ActiveJob>>,
}

impl JobController {
    /// Create a controller with default options.
    ///
    /// # Arguments
    /// * `gateway` - The processing engine every job talks to
    /// * `tokio_handle` - Handle to the tokio runtime for spawning job workers
    pub fn new(gateway: Arc<dyn GatewayClient>, tokio_handle: Handle) -> Self {
        Self::with_options(gateway, tokio_handle, JobOptions::default())
    }

    pub fn with_options(
        gateway: Arc<dyn GatewayClient>,
        tokio_handle: Handle,
        options: JobOptions,
    ) -> Self {
        let sink = StatusSink::new(options.event_capacity, options.metrics.clone());
        Self {
            gateway,
            tokio_handle,
            state: JobStateManager::new(sink),
            metrics: options.metrics,
            poll_interval: options.poll_interval,
            active: Mutex::new(None),
        }
    }

    /// Validate `config` and start a job in `mode`.
    ///
    /// Returns as soon as the worker is spawned. On validation failure the
    /// controller returns to `Idle` and nothing is touched.
    pub fn start(&self, config: Configuration, mode: JobMode) -> Result<(), JobError> {
        // Held for the whole transition so two callers cannot both start
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state.read(|status| status.state.is_active()) {
            tracing::warn!("Start requested while a job is running");
            return Err(JobError::AlreadyRunning);
        }

        self.state.begin_validation(mode);
        if let Err(e) = config.validate() {
            tracing::warn!("Configuration '{}' rejected: {}", config.name, e);
            self.state.reject(&e.to_string());
            return Err(JobError::ConfigInvalid(e));
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.state.start_running();

        let worker = JobWorker {
            gateway: self.gateway.clone(),
            state: self.state.clone(),
            metrics: self.metrics.clone(),
            poll_interval: self.poll_interval,
        };
        let handle = self
            .tokio_handle
            .spawn(async move { worker.run(config, mode, cancel_rx).await });

        *active = Some(ActiveJob {
            cancel_tx,
            handle: Some(handle),
        });

        tracing::info!("{} job started", mode);
        Ok(())
    }

    /// Start a one-shot batch.
    pub fn start_batch(&self, config: Configuration) -> Result<(), JobError> {
        self.start(config, JobMode::Batch)
    }

    /// Start a monitor session; it runs until [`cancel`](Self::cancel).
    pub fn start_monitor(&self, config: Configuration) -> Result<(), JobError> {
        self.start(config, JobMode::Monitor)
    }

    /// Request cancellation. Callable from any thread; the worker honours it
    /// at its next checkpoint and lets an in-flight file finish.
    pub fn cancel(&self) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(job) if self.is_running() => {
                tracing::info!("Cancellation requested");
                let _ = job.cancel_tx.send(true);
            }
            _ => tracing::debug!("Cancel requested with no running job"),
        }
    }

    /// Wait for the current job's worker to finish.
    ///
    /// # Returns
    /// The final status and the files handled, in processing order
    pub async fn wait(&self) -> Result<JobReport, JobError> {
        let handle = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.as_mut().and_then(|job| job.handle.take())
        };
        let handle = handle.ok_or(JobError::NotStarted)?;

        match handle.await {
            Ok(seen) => Ok(JobReport {
                status: self.state.snapshot(),
                seen_files: seen.into_paths(),
            }),
            Err(e) => {
                tracing::error!("Job worker join error: {}", e);
                self.state.finish(JobState::Failed, Some(e.to_string()));
                Err(JobError::Worker(e.to_string()))
            }
        }
    }

    /// Snapshot of the current (or last) job.
    pub fn status(&self) -> JobStatus {
        self.state.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.state.read(|status| status.state.is_active())
    }

    /// Subscribe to the status event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = active.as_ref() {
            let _ = job.cancel_tx.send(true);
        }
    }
}
