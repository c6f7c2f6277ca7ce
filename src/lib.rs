// DocGate - headless orchestrator for a document-indexing gateway
//
// This is the library crate containing the configuration model, the job
// orchestrator and the services it drives. The binary crate (main.rs)
// provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, LastSessionPointer, RuntimeSettings};
pub use models::{Configuration, JobMode, JobReport, JobState, JobStatus, ValidationError};
pub use orchestrator::{JobController, JobError, JobOptions};
pub use services::{CommandGateway, GatewayClient, GatewayError};
pub use state::{JobStateManager, StatusEvent, StatusKind, StatusSink};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
