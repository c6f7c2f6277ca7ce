use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static REPEATED_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("repeated whitespace pattern is valid"));

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("Folder not found: {0}")]
    RootNotFound(Utf8PathBuf),

    #[error("Not a folder: {0}")]
    NotADirectory(Utf8PathBuf),
}

/// Canonical form of a file or folder name: whitespace runs collapsed to one
/// space, leading and trailing whitespace removed.
pub fn canonical_name(name: &str) -> String {
    WHITESPACE_RUN.replace_all(name.trim(), " ").into_owned()
}

/// A name is irregular when it has leading or trailing whitespace or two or
/// more whitespace characters in a row. A single interior tab is left alone.
pub fn is_irregular(name: &str) -> bool {
    name.trim() != name || REPEATED_WHITESPACE.is_match(name)
}

fn check_root(root: &Utf8Path) -> Result<(), SanitizeError> {
    if !root.exists() {
        return Err(SanitizeError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(SanitizeError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

/// Every entry below `root` with an irregular name, deepest entries first.
fn irregular_entries(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root, e);
                continue;
            }
        };

        let path = match Utf8PathBuf::try_from(entry.into_path()) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping non UTF-8 path: {}", e.as_path().display());
                continue;
            }
        };

        if path.file_name().is_some_and(is_irregular) {
            found.push(path);
        }
    }

    found
}

/// Walk the tree under `root` and list names with repeated interior or
/// leading/trailing whitespace. `root` itself is not checked.
pub fn find_irregular_names(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SanitizeError> {
    check_root(root)?;

    let mut found = irregular_entries(root);
    found.sort();

    tracing::info!("Found {} irregular names under {}", found.len(), root);
    Ok(found)
}

/// Rename every irregular name under `root` to its canonical form.
///
/// Best effort: collisions and rename failures are logged and skipped.
/// Children are renamed before their parents so collected paths stay valid.
///
/// # Returns
/// The number of names actually changed
pub fn normalize_names(root: &Utf8Path) -> Result<usize, SanitizeError> {
    check_root(root)?;

    let mut renamed = 0;
    for path in irregular_entries(root) {
        let Some(name) = path.file_name() else {
            continue;
        };

        let canonical = canonical_name(name);
        if canonical.is_empty() {
            tracing::warn!("Cannot normalize blank name: {:?}", path);
            continue;
        }

        let target = path.with_file_name(&canonical);
        if target.exists() {
            tracing::warn!("Skipping {}: {} already exists", path, target);
            continue;
        }

        match fs::rename(&path, &target) {
            Ok(()) => {
                tracing::info!("Renamed {:?} -> {:?}", name, canonical);
                renamed += 1;
            }
            Err(e) => tracing::warn!("Failed to rename {}: {}", path, e),
        }
    }

    tracing::info!("Normalized {} names under {}", renamed, root);
    Ok(renamed)
}
