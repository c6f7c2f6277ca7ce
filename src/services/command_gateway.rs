use crate::models::Configuration;
use crate::services::gateway::{GatewayClient, GatewayError};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use walkdir::WalkDir;

/// Extensions the gateway always accepts.
pub const BASE_EXTENSIONS: [&str; 9] = [
    "pdf", "tif", "tiff", "png", "jpg", "jpeg", "bmp", "docx", "xlsx",
];

/// Gateway reached by spawning the external engine once per file.
///
/// The engine is invoked as `<executable> -c <config document> -f <file> -s`,
/// where the configuration document is the project's saved location unless
/// an explicit one is given.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    executable: Utf8PathBuf,
    config_document: Option<Utf8PathBuf>,
}

impl CommandGateway {
    pub fn new<P: AsRef<Utf8Path>>(executable: P) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
            config_document: None,
        }
    }

    /// Pass `path` to the engine instead of the project's own location.
    pub fn with_config_document<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.config_document = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn executable(&self) -> &Utf8Path {
        &self.executable
    }

    /// Extensions eligible under `config`, lowercase.
    pub fn eligible_extensions(config: &Configuration) -> Vec<&'static str> {
        let mut extensions = BASE_EXTENSIONS.to_vec();
        if config.convert_doc {
            extensions.push("doc");
        }
        if config.convert_xls {
            extensions.push("xls");
        }
        extensions
    }

    fn is_eligible(path: &Utf8Path, extensions: &[&str]) -> bool {
        path.extension()
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| extensions.contains(&ext.as_str()))
    }

    /// Build the engine arguments for one file.
    pub fn build_args(
        &self,
        config: &Configuration,
        path: &Utf8Path,
    ) -> Result<Vec<String>, GatewayError> {
        let document = self
            .config_document
            .as_ref()
            .or(config.config_location.as_ref())
            .ok_or_else(|| {
                GatewayError::Other(
                    "Configuration must be saved before the gateway can use it".to_string(),
                )
            })?;

        Ok(vec![
            "-c".to_string(),
            document.to_string(),
            "-f".to_string(),
            path.to_string(),
            "-s".to_string(),
        ])
    }
}

/// Eligible files under `folder`, sorted by name within each directory.
///
/// Only an unreadable `folder` fails the walk; unreadable entries below it
/// are logged and skipped.
fn walk_source(
    folder: &Utf8Path,
    extensions: &[&str],
    max_depth: usize,
) -> Result<Vec<Utf8PathBuf>, GatewayError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(GatewayError::Discovery {
                    folder: folder.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", folder, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match Utf8PathBuf::try_from(entry.into_path()) {
            Ok(path) if CommandGateway::is_eligible(&path, extensions) => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping non UTF-8 path: {}", e.as_path().display()),
        }
    }
    Ok(files)
}

#[async_trait]
impl GatewayClient for CommandGateway {
    async fn discover_files(
        &self,
        config: &Configuration,
    ) -> Result<Vec<Utf8PathBuf>, GatewayError> {
        let folder = config.source_folder.clone();
        if !folder.is_dir() {
            return Err(GatewayError::Discovery {
                folder,
                reason: "source folder does not exist".to_string(),
            });
        }

        let extensions = Self::eligible_extensions(config);
        let max_depth = if config.include_subfolders {
            usize::MAX
        } else {
            1
        };

        let files = tokio::task::spawn_blocking(move || {
            walk_source(&folder, &extensions, max_depth)
        })
        .await
        .map_err(|e| GatewayError::Other(format!("Discovery task failed: {}", e)))??;

        tracing::debug!(
            "Discovered {} eligible files in {}",
            files.len(),
            config.source_folder
        );
        Ok(files)
    }

    async fn process_one(
        &self,
        config: &Configuration,
        path: &Utf8Path,
    ) -> Result<bool, GatewayError> {
        let args = self.build_args(config, path)?;
        tracing::info!("Executing: {} {}", self.executable, args.join(" "));

        let start = Instant::now();
        let child = Command::new(self.executable.as_std_path())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match config.processing_timeout_duration() {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    tracing::warn!("Gateway timed out on {} after {:?}", path, limit);
                    GatewayError::Timeout(limit)
                })??,
            None => child.wait_with_output().await?,
        };

        let success = output.status.success();
        tracing::info!(
            "Gateway finished {} in {:.2}s with {}",
            path,
            start.elapsed().as_secs_f32(),
            output.status
        );
        if !success && !output.stderr.is_empty() {
            tracing::warn!("Gateway stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
        }

        Ok(success)
    }

    async fn load_pattern_mapping(&self, path: &Utf8Path) -> Result<(), GatewayError> {
        let contents = fs::read_to_string(path).map_err(|e| GatewayError::PatternMapping {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if contents.trim().is_empty() {
            return Err(GatewayError::PatternMapping {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }

        tracing::info!("Pattern mapping {} is ready", path);
        Ok(())
    }
}
