//! DocGate - headless console for a document-indexing gateway
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary wires the library together:
//! - Runtime settings from `DOCGATE_*` environment variables ([`RuntimeSettings`])
//! - Logging infrastructure (daily file rotation + optional console output)
//! - Tokio runtime for the job worker and gateway subprocesses
//! - Configuration documents and the last-session pointer ([`ConfigManager`])
//! - The job orchestrator ([`JobController`]) driving a [`CommandGateway`]
//!
//! Status events are rendered to stdout as they arrive; tracing output goes to
//! the log file and, unless `--quiet`, to stderr.
//!
//! # Exit Codes
//!
//! - `0`: success
//! - `1`: generic failure (I/O, persistence, a job that ended Failed)
//! - `2`: configuration invalid
//! - `3`: source folder missing

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use docgate::logging::{LOG_PREFIX, resolve_log_dir, setup_logging_with_console};
use docgate::models::ProcessingMode;
use docgate::services::sanitizer;
use docgate::{
    APP_NAME, CommandGateway, ConfigManager, Configuration, JobController, JobError, JobMode,
    JobOptions, JobState, LastSessionPointer, RuntimeSettings, VERSION,
};
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG_INVALID: u8 = 2;
const EXIT_SOURCE_MISSING: u8 = 3;

/// Headless console for a document-indexing gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Do not mirror log output to the console
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for log files (defaults to the project's log folder)
    #[arg(long, global = true)]
    log_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every file in the source folder once
    Run {
        /// Configuration document (defaults to the last session)
        #[arg(short, long)]
        config: Option<Utf8PathBuf>,

        /// Gateway executable (overrides DOCGATE_GATEWAY)
        #[arg(long)]
        gateway: Option<String>,
    },

    /// Watch the source folder and process new files until interrupted
    Monitor {
        /// Configuration document (defaults to the last session)
        #[arg(short, long)]
        config: Option<Utf8PathBuf>,

        /// Gateway executable (overrides DOCGATE_GATEWAY)
        #[arg(long)]
        gateway: Option<String>,

        /// Seconds between polls (overrides DOCGATE_POLL_INTERVAL_SECS)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// List file and folder names with irregular whitespace
    ValidateNames {
        #[arg(short, long)]
        path: Utf8PathBuf,
    },

    /// Rename file and folder names with irregular whitespace
    FixNames {
        #[arg(short, long)]
        path: Utf8PathBuf,
    },

    /// Create a new project configuration with default settings
    Init {
        #[arg(short, long)]
        name: String,

        /// Folder the configuration document is written to
        #[arg(short, long)]
        dir: Utf8PathBuf,
    },

    /// Show the configuration used by the last session
    Last,

    /// Write a starter pattern-mapping document
    Patterns {
        #[arg(short, long)]
        path: Utf8PathBuf,
    },

    /// Show where the gateway's summary report is
    Report {
        #[arg(short, long)]
        config: Option<Utf8PathBuf>,
    },

    /// Apply a processing-mode preset to a configuration document
    ApplyMode {
        #[arg(short, long)]
        config: Utf8PathBuf,

        /// fast, balanced or high_quality
        #[arg(short, long)]
        mode: ProcessingMode,
    },
}

impl Commands {
    /// The configuration path a command works on, when it has one.
    fn config_arg(&self) -> Option<Option<&Utf8PathBuf>> {
        match self {
            Commands::Run { config, .. }
            | Commands::Monitor { config, .. }
            | Commands::Report { config } => Some(config.as_ref()),
            Commands::ApplyMode { config, .. } => Some(Some(config)),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run_cli(cli: Cli) -> Result<ExitCode> {
    let settings = RuntimeSettings::load()?;

    let log_dir = match &cli.log_dir {
        Some(dir) => dir.clone(),
        None => resolve_log_dir(peek_config(&cli.command).as_ref(), &settings.log_dir),
    };
    let _guard = setup_logging_with_console(&log_dir, LOG_PREFIX, cli.debug, !cli.quiet)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("docgate-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(dispatch(cli.command, settings));

    runtime.shutdown_timeout(Duration::from_secs(5));

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    tracing::info!("Shutdown complete");
    result
}

/// Best-effort read of the project a command will use, to place its logs.
fn peek_config(command: &Commands) -> Option<Configuration> {
    let path = match command.config_arg()? {
        Some(path) => path.clone(),
        None => LastSessionPointer::in_home_dir().read()?,
    };
    let contents = fs::read_to_string(&path).ok()?;
    ConfigManager::parse(&contents).ok()
}

async fn dispatch(command: Commands, settings: RuntimeSettings) -> Result<ExitCode> {
    let manager = ConfigManager::with_default_pointer();

    match command {
        Commands::Run { config, gateway } => {
            let config = load_or_resume(&manager, config)?;
            run_job(config, JobMode::Batch, gateway, None, settings).await
        }
        Commands::Monitor {
            config,
            gateway,
            interval_secs,
        } => {
            let config = load_or_resume(&manager, config)?;
            run_job(config, JobMode::Monitor, gateway, interval_secs, settings).await
        }
        Commands::ValidateNames { path } => {
            let irregular = sanitizer::find_irregular_names(&path)?;
            for name in &irregular {
                println!("{}", name);
            }
            println!("{} irregular names found", irregular.len());
            Ok(ExitCode::SUCCESS)
        }
        Commands::FixNames { path } => {
            let renamed = sanitizer::normalize_names(&path)?;
            println!("{} names normalized", renamed);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { name, dir } => {
            let config = manager.create_config(&name, &dir)?;
            if let Some(location) = &config.config_location {
                println!("Created configuration '{}' at {}", config.name, location);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Last => {
            match manager.pointer().read() {
                Some(path) => println!("{}", path),
                None => println!("No previous session"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Patterns { path } => {
            manager.create_pattern_template(&path)?;
            println!("Pattern template written to {}", path);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { config } => {
            let config = load_or_resume(&manager, config)?;
            match ConfigManager::report_path(&config) {
                Some(report) => {
                    println!("{}", report);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("No report has been generated yet");
                    Ok(ExitCode::from(EXIT_FAILURE))
                }
            }
        }
        Commands::ApplyMode { config, mode } => {
            let mut loaded = manager.load_config(&config)?;
            loaded.apply_processing_mode(mode);
            manager.save_config(&loaded, &config)?;
            println!("Applied '{}' preset to {}", mode, config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_or_resume(manager: &ConfigManager, path: Option<Utf8PathBuf>) -> Result<Configuration> {
    match path {
        Some(path) => manager.load_config(&path),
        None => manager
            .resume_last_session()
            .ok_or_else(|| anyhow!("No --config given and no previous session to resume")),
    }
}

async fn run_job(
    config: Configuration,
    mode: JobMode,
    gateway: Option<String>,
    interval_secs: Option<u64>,
    settings: RuntimeSettings,
) -> Result<ExitCode> {
    let gateway = CommandGateway::new(gateway.unwrap_or_else(|| settings.gateway.clone()));
    tracing::info!("Using gateway {}", gateway.executable());

    let mut options = JobOptions::from_settings(&settings);
    if let Some(secs) = interval_secs {
        options.poll_interval = Duration::from_secs(secs.max(1));
    }

    let controller = Arc::new(JobController::with_options(
        Arc::new(gateway),
        Handle::current(),
        options,
    ));
    let mut events = controller.subscribe();

    if let Err(e) = controller.start(config, mode) {
        return match rejected_exit_code(&e) {
            Some(code) => {
                eprintln!("{}", e);
                Ok(ExitCode::from(code))
            }
            None => Err(e.into()),
        };
    }

    let interrupt = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received");
                controller.cancel();
            }
        })
    };

    let wait = controller.wait();
    tokio::pin!(wait);
    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,
            event = events.recv() => match event {
                Ok(event) => println!("{}", event.render()),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Status display skipped {} events", missed);
                }
                Err(RecvError::Closed) => {}
            },
        }
    };
    interrupt.abort();

    loop {
        match events.try_recv() {
            Ok(event) => println!("{}", event.render()),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    let status = &report.status;
    println!(
        "{}: {} processed, {} failed",
        status.state, status.processed, status.failed
    );

    Ok(ExitCode::from(finished_exit_code(status.state)))
}

/// Exit code for a start the controller refused, if the refusal has its own.
fn rejected_exit_code(error: &JobError) -> Option<u8> {
    match error {
        JobError::ConfigInvalid(e) if e.is_source_missing() => Some(EXIT_SOURCE_MISSING),
        JobError::ConfigInvalid(_) => Some(EXIT_CONFIG_INVALID),
        _ => None,
    }
}

/// Exit code for a job that ran to a terminal state.
fn finished_exit_code(state: JobState) -> u8 {
    match state {
        JobState::Failed => EXIT_FAILURE,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate::ValidationError;

    #[test]
    fn test_rejected_exit_codes() {
        let missing = JobError::ConfigInvalid(ValidationError::SourceFolderNotFound(
            Utf8PathBuf::from("/plant/incoming"),
        ));
        assert_eq!(rejected_exit_code(&missing), Some(3));

        let invalid = JobError::ConfigInvalid(ValidationError::MissingStagingArea);
        assert_eq!(rejected_exit_code(&invalid), Some(2));

        assert_eq!(rejected_exit_code(&JobError::AlreadyRunning), None);
        assert_eq!(rejected_exit_code(&JobError::NotStarted), None);
    }

    #[test]
    fn test_finished_exit_codes() {
        assert_eq!(finished_exit_code(JobState::Completed), 0);
        assert_eq!(finished_exit_code(JobState::Cancelled), 0);
        assert_eq!(finished_exit_code(JobState::Failed), 1);
    }
}
