use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

/// Lifecycle of a job owned by a [`JobController`](crate::orchestrator::JobController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Validating,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// A job in this state blocks any further `start`.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Validating | JobState::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Validating => write!(f, "Validating"),
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Failed => write!(f, "Failed"),
            JobState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// What a job does once it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Process every discovered file once, then finish.
    Batch,
    /// Poll for new files until cancelled.
    Monitor,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Batch => write!(f, "batch"),
            JobMode::Monitor => write!(f, "monitor"),
        }
    }
}

/// Result of handing one file to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Succeeded,
    /// The gateway reported failure, with its error when one was raised.
    Failed(Option<String>),
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Succeeded)
    }
}

/// Counts returned by a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &FileOutcome) {
        if outcome.is_success() {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}

/// Point-in-time view of a job, safe to hand to any observer.
///
/// Only the job's worker writes the live copy; everyone else gets clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub mode: Option<JobMode>,
    pub processed: usize,
    pub failed: usize,
    /// Size of the seen-set.
    pub seen: usize,
    pub current_file: Option<Utf8PathBuf>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}

impl JobStatus {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            processed: self.processed,
            failed: self.failed,
        }
    }

    /// One-line status text, like the console's status bar.
    pub fn status_line(&self) -> String {
        match self.state {
            JobState::Idle => "Ready".to_string(),
            JobState::Validating => "Validating configuration...".to_string(),
            JobState::Running => match &self.current_file {
                Some(file) => format!(
                    "Processing {} ({} done, {} failed)",
                    file.file_name().unwrap_or(file.as_str()),
                    self.processed,
                    self.failed
                ),
                None => "Processing...".to_string(),
            },
            JobState::Completed => format!(
                "Complete: {} processed, {} failed",
                self.processed, self.failed
            ),
            JobState::Failed => format!(
                "Error occurred: {}",
                self.last_error.as_deref().unwrap_or("unknown error")
            ),
            JobState::Cancelled => format!(
                "Stopped by user: {} processed, {} failed",
                self.processed, self.failed
            ),
        }
    }
}

/// Final account of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub status: JobStatus,
    /// Files handled by the job, in processing order.
    pub seen_files: Vec<Utf8PathBuf>,
}
