//! Shared helpers for integration tests: an in-memory gateway and
//! throwaway project folders.

#![allow(dead_code)]

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use docgate::models::Configuration;
use docgate::services::{GatewayClient, GatewayError};
use docgate::{JobController, JobStatus};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Gateway whose "source folder" is a list held in memory.
///
/// Files can be added while a job runs, marked as failing, and one file can
/// be gated so that its processing blocks until the test releases it.
#[derive(Default)]
pub struct FakeGateway {
    files: Mutex<Vec<Utf8PathBuf>>,
    failing: Mutex<HashSet<Utf8PathBuf>>,
    processed: Mutex<Vec<Utf8PathBuf>>,
    gated: Mutex<Option<Utf8PathBuf>>,
    entered: Notify,
    release: Notify,
    discovery_failures: AtomicUsize,
    discover_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn with_files(files: &[&str]) -> Self {
        let gateway = Self::default();
        for file in files {
            gateway.add_file(file);
        }
        gateway
    }

    pub fn add_file(&self, file: &str) {
        self.files.lock().unwrap().push(Utf8PathBuf::from(file));
    }

    pub fn fail_on(&self, file: &str) {
        self.failing.lock().unwrap().insert(Utf8PathBuf::from(file));
    }

    /// Make processing of `file` block until [`release`](Self::release).
    pub fn gate(&self, file: &str) {
        *self.gated.lock().unwrap() = Some(Utf8PathBuf::from(file));
    }

    /// Wait until the gated file has been handed to the gateway.
    pub async fn wait_until_gated(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.entered.notified())
            .await
            .expect("gated file was never processed");
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Fail the next `count` discovery calls.
    pub fn fail_discoveries(&self, count: usize) {
        self.discovery_failures.store(count, Ordering::SeqCst);
    }

    pub fn processed(&self) -> Vec<Utf8PathBuf> {
        self.processed.lock().unwrap().clone()
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn discover_files(
        &self,
        config: &Configuration,
    ) -> Result<Vec<Utf8PathBuf>, GatewayError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);

        let pending = self.discovery_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.discovery_failures.store(pending - 1, Ordering::SeqCst);
            return Err(GatewayError::Discovery {
                folder: config.source_folder.clone(),
                reason: "share unavailable".to_string(),
            });
        }

        Ok(self.files.lock().unwrap().clone())
    }

    async fn process_one(
        &self,
        _config: &Configuration,
        path: &Utf8Path,
    ) -> Result<bool, GatewayError> {
        let gated = self.gated.lock().unwrap().as_deref() == Some(path);
        if gated {
            self.entered.notify_one();
            self.release.notified().await;
        }

        self.processed.lock().unwrap().push(path.to_path_buf());
        Ok(!self.failing.lock().unwrap().contains(path))
    }

    async fn load_pattern_mapping(&self, _path: &Utf8Path) -> Result<(), GatewayError> {
        Ok(())
    }
}

/// A project whose source folder exists and whose staging area is inside it.
pub fn temp_project() -> (TempDir, Configuration) {
    let temp = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
    let source = root.join("source");
    std::fs::create_dir_all(&source).unwrap();

    let mut config = Configuration::named("Integration");
    config.source_folder = source;
    config.staging_area = root.join("staging");
    (temp, config)
}

/// Poll the controller until `predicate` holds, or panic after a few seconds.
pub async fn wait_for_status<F>(controller: &JobController, predicate: F) -> JobStatus
where
    F: Fn(&JobStatus) -> bool,
{
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = controller.status();
            if predicate(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    result.expect("timed out waiting for job status")
}
