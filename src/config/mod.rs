pub mod last_session;
pub mod runtime;

pub use last_session::LastSessionPointer;
pub use runtime::RuntimeSettings;

use crate::models::Configuration;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Starter pattern-mapping document written by [`ConfigManager::create_pattern_template`].
///
/// The gateway owns the meaning of these patterns; this is only a scaffold.
pub const PATTERN_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Patterns version="5.0">
    <!-- Equipment Tags: ###-X-##### -->
    <Pattern from="\d{3}-[A-Z]-\d{5}" to="Equipment"/>

    <!-- Valve Tags: ###-HV-##### -->
    <Pattern from="\d{3}-HV-\d{5}" to="Valve"/>

    <!-- Motor Tags: ###-EM-#####X-## -->
    <Pattern from="\d{3}-EM-\d{5}[A-Z]-\d{2}" to="Motor"/>

    <!-- Add your custom patterns here -->

</Patterns>
"#;

/// File name of the HTML summary the gateway leaves in the log folder.
pub const REPORT_FILE_NAME: &str = "summary_report.html";

/// Configuration manager for loading and saving project configuration documents.
///
/// Documents are YAML; JSON documents written by older consoles load as well.
/// Every successful save or load rewrites the [`LastSessionPointer`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    pointer: LastSessionPointer,
}

impl ConfigManager {
    /// Create a ConfigManager that keeps its last-session pointer at `pointer_path`.
    pub fn new<P: AsRef<Utf8Path>>(pointer_path: P) -> Self {
        Self {
            pointer: LastSessionPointer::new(pointer_path),
        }
    }

    /// Create a ConfigManager using the pointer in the user's home directory.
    pub fn with_default_pointer() -> Self {
        Self {
            pointer: LastSessionPointer::in_home_dir(),
        }
    }

    pub fn pointer(&self) -> &LastSessionPointer {
        &self.pointer
    }

    /// Parse a configuration document.
    pub fn parse(contents: &str) -> Result<Configuration> {
        if contents.trim().is_empty() {
            return Ok(Configuration::default());
        }
        serde_yaml_ng::from_str(contents).context("Failed to parse configuration document")
    }

    /// Render a configuration document. Every field is written, defaults included.
    pub fn render(config: &Configuration) -> Result<String> {
        serde_yaml_ng::to_string(config).context("Failed to serialize configuration to YAML")
    }

    /// Load the configuration stored at `path`.
    ///
    /// # Returns
    /// The loaded Configuration with `config_location` set to `path`
    pub fn load_config(&self, path: &Utf8Path) -> Result<Configuration> {
        let file_contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path))?;

        let mut config = Self::parse(&file_contents)
            .with_context(|| format!("Failed to parse configuration: {}", path))?;
        config.config_location = Some(path.to_path_buf());

        self.remember(path);
        tracing::info!("Loaded configuration '{}' from {}", config.name, path);
        Ok(config)
    }

    /// Save `config` to `path`.
    ///
    /// # Returns
    /// The stored copy, with `config_location` pointing at `path`
    pub fn save_config(&self, config: &Configuration, path: &Utf8Path) -> Result<Configuration> {
        let mut stored = config.clone();
        stored.config_location = Some(path.to_path_buf());

        let yaml_string = Self::render(&stored)?;

        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {}", parent))?;
            }
        }

        fs::write(path, yaml_string)
            .with_context(|| format!("Failed to write configuration: {}", path))?;

        self.remember(path);
        tracing::info!("Saved configuration '{}' to {}", stored.name, path);
        Ok(stored)
    }

    /// Create and save a default configuration named `name` inside `folder`.
    pub fn create_config(&self, name: &str, folder: &Utf8Path) -> Result<Configuration> {
        if name.trim().is_empty() {
            bail!("Project name must not be empty");
        }
        if folder.as_str().trim().is_empty() {
            bail!("Configuration folder must not be empty");
        }

        let path = folder.join(format!("{}.yaml", name.trim()));
        self.save_config(&Configuration::named(name.trim()), &path)
    }

    /// Reload `config` from the location it was last saved to or loaded from.
    pub fn reload(&self, config: &Configuration) -> Result<Configuration> {
        match &config.config_location {
            Some(path) if path.exists() => self.load_config(path),
            Some(path) => bail!("Configuration file no longer exists: {}", path),
            None => bail!("No configuration file to reload"),
        }
    }

    /// Resume the previous session: read the pointer once and load what it names.
    ///
    /// Any problem is logged and treated as "no previous session".
    pub fn resume_last_session(&self) -> Option<Configuration> {
        let path = self.pointer.read()?;

        if !path.exists() {
            tracing::warn!("Last configuration {} no longer exists", path);
            return None;
        }

        match self.load_config(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Could not resume last session from {}: {:#}", path, e);
                None
            }
        }
    }

    /// Write the starter pattern-mapping document to `path`.
    pub fn create_pattern_template(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent))?;
            }
        }

        fs::write(path, PATTERN_TEMPLATE)
            .with_context(|| format!("Failed to write pattern file: {}", path))?;

        tracing::info!("Created pattern mapping template at {}", path);
        Ok(())
    }

    /// Location of the gateway's HTML summary, when one has been produced.
    pub fn report_path(config: &Configuration) -> Option<Utf8PathBuf> {
        let report = config.log_folder.as_ref()?.join(REPORT_FILE_NAME);
        report.exists().then_some(report)
    }

    fn remember(&self, path: &Utf8Path) {
        // Pointer failures never fail the save or load itself
        if let Err(e) = self.pointer.remember(path) {
            tracing::warn!("Failed to update last-session pointer: {:#}", e);
        }
    }
}
