use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// File name of the pointer inside the user's home directory.
pub const POINTER_FILE_NAME: &str = ".docgate_last_config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointerRecord {
    last_config: Utf8PathBuf,
}

/// The "last used configuration" pointer.
///
/// Lives at a fixed location, is read once at startup through
/// [`read`](Self::read) and rewritten after every successful save or load.
/// A missing or unreadable pointer just means there is no previous session.
#[derive(Debug, Clone)]
pub struct LastSessionPointer {
    location: Utf8PathBuf,
}

impl LastSessionPointer {
    pub fn new<P: AsRef<Utf8Path>>(location: P) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
        }
    }

    /// Pointer stored in the user's home directory, falling back to the
    /// working directory when no home can be determined.
    pub fn in_home_dir() -> Self {
        let home = dirs::home_dir()
            .and_then(|home| Utf8PathBuf::try_from(home).ok())
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Self::new(home.join(POINTER_FILE_NAME))
    }

    pub fn location(&self) -> &Utf8Path {
        &self.location
    }

    /// Read the remembered configuration path, if any.
    pub fn read(&self) -> Option<Utf8PathBuf> {
        if !self.location.exists() {
            tracing::debug!("No last-session pointer at {}", self.location);
            return None;
        }

        let contents = match fs::read_to_string(&self.location) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Ignoring unreadable last-session pointer {}: {}", self.location, e);
                return None;
            }
        };

        match serde_yaml_ng::from_str::<PointerRecord>(&contents) {
            Ok(record) if !record.last_config.as_str().is_empty() => Some(record.last_config),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring malformed last-session pointer {}: {}", self.location, e);
                None
            }
        }
    }

    /// Overwrite the pointer with `config_path`.
    pub fn remember(&self, config_path: &Utf8Path) -> Result<()> {
        if let Some(parent) = self.location.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create pointer directory: {}", parent))?;
            }
        }

        let record = PointerRecord {
            last_config: config_path.to_path_buf(),
        };
        let yaml_string = serde_yaml_ng::to_string(&record)
            .context("Failed to serialize last-session pointer")?;

        fs::write(&self.location, yaml_string)
            .with_context(|| format!("Failed to write last-session pointer: {}", self.location))?;

        tracing::debug!("Remembered {} as last configuration", config_path);
        Ok(())
    }
}
