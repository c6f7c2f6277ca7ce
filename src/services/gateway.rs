use crate::models::{BatchSummary, Configuration, FileOutcome};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised across the gateway boundary
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("File discovery failed in {folder}: {reason}")]
    Discovery { folder: Utf8PathBuf, reason: String },

    #[error("Process error: {0}")]
    Process(#[from] std::io::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Pattern mapping {path} could not be loaded: {reason}")]
    PatternMapping { path: Utf8PathBuf, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Observer handed to [`GatewayClient::process_batch`].
///
/// `should_stop` is the cancellation checkpoint: it is consulted before each
/// file and never interrupts a file already handed to the gateway.
pub trait BatchProgress: Send {
    fn should_stop(&self) -> bool;
    fn file_started(&mut self, path: &Utf8Path);
    fn file_finished(&mut self, path: &Utf8Path, outcome: FileOutcome);
}

/// The narrow contract between the orchestrator and the external processing engine.
///
/// Implementations must be cheap to share (`Arc<dyn GatewayClient>`); all
/// per-run inputs arrive as parameters.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// List the files currently eligible for processing, in processing order.
    ///
    /// Never cached: every call reflects the live state of the source tree.
    async fn discover_files(&self, config: &Configuration)
    -> Result<Vec<Utf8PathBuf>, GatewayError>;

    /// Process a single file.
    ///
    /// `Ok(false)` is an ordinary failure; `Err` is reserved for genuine
    /// processing errors (spawn failure, timeout).
    async fn process_one(&self, config: &Configuration, path: &Utf8Path)
    -> Result<bool, GatewayError>;

    /// Load a pattern-mapping document before any file is touched.
    async fn load_pattern_mapping(&self, path: &Utf8Path) -> Result<(), GatewayError>;

    /// Process every discovered file once.
    ///
    /// The provided implementation discovers once, then hands files to
    /// [`process_one`](Self::process_one) strictly one at a time. Per-file
    /// errors are absorbed as failed outcomes; only discovery failure is
    /// returned as an error.
    async fn process_batch(
        &self,
        config: &Configuration,
        progress: &mut dyn BatchProgress,
    ) -> Result<BatchSummary, GatewayError> {
        let files = self.discover_files(config).await?;
        tracing::info!("Batch discovered {} files", files.len());

        let mut summary = BatchSummary::default();
        for path in files {
            if progress.should_stop() {
                tracing::info!("Batch stopped before {}", path);
                break;
            }

            progress.file_started(&path);
            let outcome = outcome_of(self.process_one(config, &path).await, &path);
            summary.record(&outcome);
            progress.file_finished(&path, outcome);
        }

        Ok(summary)
    }
}

/// Fold a `process_one` result into a per-file outcome.
pub fn outcome_of(result: Result<bool, GatewayError>, path: &Utf8Path) -> FileOutcome {
    match result {
        Ok(true) => FileOutcome::Succeeded,
        Ok(false) => FileOutcome::Failed(None),
        Err(e) => {
            tracing::warn!("Processing {} failed: {}", path, e);
            FileOutcome::Failed(Some(e.to_string()))
        }
    }
}
