use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Process settings that are not part of a project configuration.
///
/// Built from defaults layered under `DOCGATE_*` environment variables,
/// e.g. `DOCGATE_GATEWAY=/opt/gateway/gateway` or `DOCGATE_POLL_INTERVAL_SECS=5`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuntimeSettings {
    /// External gateway executable.
    pub gateway: String,
    /// Monitor poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Directory for rolling log files when the project sets none.
    pub log_dir: String,
    /// Capacity of the status event channel.
    pub event_capacity: usize,
}

impl RuntimeSettings {
    pub const DEFAULT_GATEWAY: &'static str = "document-indexing-gateway";
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

    /// Load defaults overridden by the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config::Environment::with_prefix("DOCGATE").try_parsing(true))
    }

    fn load_from(env: config::Environment) -> Result<Self> {
        config::Config::builder()
            .set_default("gateway", Self::DEFAULT_GATEWAY)?
            .set_default("poll_interval_secs", Self::DEFAULT_POLL_INTERVAL_SECS)?
            .set_default("log_dir", "logs")?
            .set_default("event_capacity", 256_u64)?
            .add_source(env)
            .build()
            .context("Failed to build runtime settings")?
            .try_deserialize()
            .context("Invalid DOCGATE_* runtime settings")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
