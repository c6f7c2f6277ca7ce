use super::progress::{JobProgress, SeenSet};
use super::worker::JobWorker;
use crate::models::{Configuration, JobState};
use crate::services::BatchProgress;
use crate::services::gateway::outcome_of;

/// Log a metrics line every this many polls.
const PERIODIC_METRICS_TICKS: u64 = 30;

impl JobWorker {
    /// Poll the source folder until cancelled.
    ///
    /// Each tick discovers files afresh, processes the unseen ones one at a
    /// time in discovery order, then waits for the poll interval or a cancel
    /// request, whichever comes first. A failed discovery only costs the tick.
    pub(super) async fn run_monitor(
        &self,
        config: &Configuration,
        mut progress: JobProgress,
    ) -> SeenSet {
        let mut cancel_rx = progress.cancel_receiver();
        let mut ticks: u64 = 0;

        'session: loop {
            if progress.should_stop() {
                break;
            }

            match self.gateway.discover_files(config).await {
                Ok(files) => {
                    for path in files {
                        if progress.has_seen(&path) {
                            continue;
                        }
                        if progress.should_stop() {
                            break 'session;
                        }

                        progress.file_started(&path);
                        let result = self.gateway.process_one(config, &path).await;
                        let outcome = outcome_of(result, &path);
                        progress.file_finished(&path, outcome);
                    }
                }
                Err(e) => {
                    self.metrics.record_discovery_error();
                    tracing::warn!("Discovery failed, retrying next poll: {}", e);
                    self.state.report_error(format!("Discovery failed: {}", e));
                }
            }

            self.metrics.record_poll_tick();
            ticks += 1;
            if ticks % PERIODIC_METRICS_TICKS == 0 {
                self.metrics.log_periodic();
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = cancel_rx.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Cancel handle dropped, stopping monitor");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "Monitor stopped after {} polls, {} files seen",
            ticks,
            progress.seen().len()
        );
        self.state.finish(JobState::Cancelled, None);
        progress.into_seen()
    }
}
