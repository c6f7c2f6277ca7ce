use super::progress::{JobProgress, SeenSet};
use crate::metrics::Metrics;
use crate::models::{Configuration, JobMode, JobState};
use crate::services::GatewayClient;
use crate::state::JobStateManager;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// The single background unit of work behind a running job.
///
/// Created by the controller for each `start`, moved into the spawned task,
/// and the only writer of the job's progress until the task ends.
#[derive(Clone)]
pub(crate) struct JobWorker {
    pub(super) gateway: Arc<dyn GatewayClient>,
    pub(super) state: JobStateManager,
    pub(super) metrics: Arc<Metrics>,
    pub(super) poll_interval: Duration,
}

impl JobWorker {
    /// Run the job to a terminal state.
    ///
    /// # Returns
    /// The seen-set of the job, in processing order
    pub(super) async fn run(
        self,
        config: Configuration,
        mode: JobMode,
        cancel_rx: watch::Receiver<bool>,
    ) -> SeenSet {
        tracing::info!("Starting {} job for '{}'", mode, config.name);
        let baseline = self.metrics.snapshot();
        let started = Instant::now();

        if let Err(reason) = self.prepare(&config).await {
            tracing::error!("Job aborted before processing: {}", reason);
            self.state.finish(JobState::Failed, Some(reason));
            return SeenSet::new();
        }

        let progress = JobProgress::new(self.state.clone(), self.metrics.clone(), cancel_rx);
        let seen = match mode {
            JobMode::Batch => self.run_batch(&config, progress).await,
            JobMode::Monitor => self.run_monitor(&config, progress).await,
        };

        self.metrics.log_job_summary(&baseline, started.elapsed());
        seen
    }

    /// Create output folders and load the pattern mapping.
    ///
    /// Runs before any file is touched; any error fails the job.
    async fn prepare(&self, config: &Configuration) -> Result<(), String> {
        for folder in config.output_folders() {
            if !folder.exists() {
                fs::create_dir_all(folder)
                    .map_err(|e| format!("Failed to create folder {}: {}", folder, e))?;
                tracing::info!("Created folder {}", folder);
            }
        }

        if let Some(pattern_file) = &config.pattern_mapping_file {
            self.gateway
                .load_pattern_mapping(pattern_file)
                .await
                .map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    async fn run_batch(&self, config: &Configuration, mut progress: JobProgress) -> SeenSet {
        let result = self.gateway.process_batch(config, &mut progress).await;

        match result {
            Ok(summary) => {
                // Keep the gateway's own totals authoritative
                self.state.update(|status| {
                    status.processed = summary.processed;
                    status.failed = summary.failed;
                });

                let final_state = if progress.stop_observed() {
                    JobState::Cancelled
                } else {
                    JobState::Completed
                };
                tracing::info!(
                    "Batch {}: {} processed, {} failed",
                    final_state,
                    summary.processed,
                    summary.failed
                );
                self.state.finish(final_state, None);
            }
            Err(e) => {
                tracing::error!("Batch failed: {}", e);
                self.state.finish(JobState::Failed, Some(e.to_string()));
            }
        }

        progress.into_seen()
    }
}
