//! Integration tests for the services layer
//!
//! These tests verify:
//! - CommandGateway discovery against a real folder tree, unreadable parts included
//! - Exit status, argument passing and timeouts of the spawned engine
//! - A batch job end to end through JobController and CommandGateway
//! - Name normalization on real directory trees, including idempotency

use camino::Utf8PathBuf;
use docgate::services::{CommandGateway, GatewayClient, GatewayError, sanitizer};
use docgate::{Configuration, JobController, JobState};
use proptest::prelude::*;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Handle;

fn create_test_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, dir)
}

/// A saved project whose source folder holds `files`.
fn project_with(dir: &Utf8PathBuf, files: &[&str]) -> Configuration {
    let source = dir.join("source");
    fs::create_dir_all(&source).unwrap();
    for file in files {
        fs::write(source.join(file), b"%PDF-1.4").unwrap();
    }

    let mut config = Configuration::named("Services");
    config.source_folder = source;
    config.staging_area = dir.join("staging");
    config.config_location = Some(dir.join("project.yaml"));
    config
}

#[cfg(unix)]
fn write_script(dir: &Utf8PathBuf, name: &str, body: &str) -> Utf8PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_discovery_reflects_live_folder() {
    let (_temp, dir) = create_test_dir();
    let config = project_with(&dir, &["001.pdf"]);
    let gateway = CommandGateway::new("gateway");

    assert_eq!(gateway.discover_files(&config).await.unwrap().len(), 1);

    fs::write(config.source_folder.join("002.tif"), b"II*").unwrap();
    fs::write(config.source_folder.join("readme.txt"), b"skip").unwrap();

    let files = gateway.discover_files(&config).await.unwrap();
    assert_eq!(
        files,
        vec![
            config.source_folder.join("001.pdf"),
            config.source_folder.join("002.tif")
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_discovery_skips_unreadable_subfolder() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, dir) = create_test_dir();
    let config = project_with(&dir, &["ok.pdf"]);
    let locked = config.source_folder.join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("hidden.pdf"), b"%PDF-1.4").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not bind a privileged user
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = CommandGateway::new("gateway").discover_files(&config).await;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(result.unwrap(), vec![config.source_folder.join("ok.pdf")]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_exit_status_maps_to_outcome() {
    let (_temp, dir) = create_test_dir();
    let config = project_with(&dir, &["a.pdf"]);
    let file = config.source_folder.join("a.pdf");

    let ok = CommandGateway::new("true").process_one(&config, &file).await;
    assert!(ok.unwrap());

    let failed = CommandGateway::new("false").process_one(&config, &file).await;
    assert!(!failed.unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn test_engine_receives_expected_arguments() {
    let (_temp, dir) = create_test_dir();
    let config = project_with(&dir, &["a.pdf"]);
    let capture = dir.join("args.txt");
    let script = write_script(&dir, "engine.sh", &format!("echo \"$@\" > '{}'", capture));

    let file = config.source_folder.join("a.pdf");
    let ok = CommandGateway::new(&script)
        .process_one(&config, &file)
        .await
        .unwrap();

    assert!(ok);
    let args = fs::read_to_string(&capture).unwrap();
    assert_eq!(
        args.trim(),
        format!("-c {} -f {} -s", dir.join("project.yaml"), file)
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_processing_timeout_is_enforced() {
    let (_temp, dir) = create_test_dir();
    let mut config = project_with(&dir, &["slow.pdf"]);
    config.processing_timeout_enabled = true;
    config.processing_timeout = 0.002; // minutes
    let script = write_script(&dir, "slow.sh", "sleep 5");

    let result = CommandGateway::new(&script)
        .process_one(&config, &config.source_folder.join("slow.pdf"))
        .await;

    assert!(matches!(result, Err(GatewayError::Timeout(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_batch_job_end_to_end() {
    let (_temp, dir) = create_test_dir();
    let mut config = project_with(&dir, &["a.pdf", "b.pdf", "c.png"]);
    config.log_folder = Some(dir.join("logs"));
    let script = write_script(&dir, "engine.sh", "case \"$4\" in *b.pdf) exit 2;; esac");

    let controller = JobController::new(Arc::new(CommandGateway::new(&script)), Handle::current());
    controller.start_batch(config).unwrap();
    let report = controller.wait().await.unwrap();

    assert_eq!(report.status.state, JobState::Completed);
    assert_eq!(report.status.processed, 2);
    assert_eq!(report.status.failed, 1);
    assert!(dir.join("staging").is_dir());
    assert!(dir.join("logs").is_dir());
}

#[test]
fn test_fix_names_on_project_tree() {
    let (_temp, dir) = create_test_dir();
    fs::create_dir_all(dir.join(" Area 100 ").join("P&ID   sheets")).unwrap();
    fs::write(
        dir.join(" Area 100 ").join("P&ID   sheets").join("PID  001 .pdf"),
        b"x",
    )
    .unwrap();

    assert_eq!(sanitizer::find_irregular_names(&dir).unwrap().len(), 3);
    assert_eq!(sanitizer::normalize_names(&dir).unwrap(), 3);
    // Only runs and the ends are touched; the space before the extension stays
    assert!(
        dir.join("Area 100")
            .join("P&ID sheets")
            .join("PID 001 .pdf")
            .exists()
    );
    assert!(sanitizer::find_irregular_names(&dir).unwrap().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn normalize_names_is_idempotent(
        names in prop::collection::vec("[a-c ]{1,6}\\.pdf", 1..8),
        folders in prop::collection::vec("[a-c ]{1,5}", 0..3),
    ) {
        let (_temp, dir) = create_test_dir();
        let mut parent = dir.clone();
        for folder in &folders {
            parent = parent.join(folder);
            // Blank or duplicate folder names are simply skipped
            if fs::create_dir_all(&parent).is_err() {
                parent = dir.clone();
            }
        }
        for name in &names {
            let _ = fs::write(parent.join(name), b"x");
        }

        sanitizer::normalize_names(&dir).unwrap();
        prop_assert_eq!(sanitizer::normalize_names(&dir).unwrap(), 0);
    }
}
