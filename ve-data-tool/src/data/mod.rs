//! Data directory maintenance: manifest validation and population.
//!
//! The tree drivers visit `root` and every non-hidden directory below it and
//! handle each one independently. A failure in one directory is logged and
//! the walk moves on; callers inspect the per-directory results. The root is
//! always visited, so a missing or non-directory root shows up as a failed
//! directory rather than an empty tree.

pub mod manifest;
pub mod populate;
pub mod validate;

use crate::fs::scope::resolve_in_repository;
use crate::fs::walker::collect_directories;
use crate::utils::errors::Result;
use crate::utils::reporter::Reporter;
use std::path::{Path, PathBuf};

pub use manifest::{Manifest, ManifestFileEntry};
pub use populate::{populate_manifest, PopulateOutcome, PopulateStatus};
pub use validate::{check_data_directory, DirectoryValidationReport};

/// Validation result for one directory of a tree walk.
#[derive(Debug, Clone)]
pub struct DirectoryCheck {
    pub directory: PathBuf,
    pub report: DirectoryValidationReport,
}

/// Population result for one directory of a tree walk.
#[derive(Debug, Clone)]
pub struct DirectoryUpdate {
    pub directory: PathBuf,
    pub outcome: PopulateOutcome,
}

/// Resolve the walk root and list the directories to visit.
fn tree_directories(
    repository_root: &Path,
    root: &Path,
    reporter: &dyn Reporter,
) -> Result<Vec<PathBuf>> {
    let scoped = match resolve_in_repository(repository_root, root) {
        Ok(scoped) => scoped,
        Err(e) => {
            reporter.error(&format!("Cannot process {}: {}", root.display(), e));
            return Err(e);
        }
    };

    let walk = collect_directories(&scoped.absolute);
    for error in &walk.errors {
        let path = error.path().unwrap_or(&scoped.absolute);
        let cause = error
            .io_error()
            .map_or_else(|| error.to_string(), ToString::to_string);
        reporter.error(&format!("Cannot read {}: {}", path.display(), cause));
    }

    Ok(walk.directories)
}

/// Recursively check all data directories under `root`.
///
/// `Ok` means the walk completed, not that every directory is valid.
pub fn check_data(
    repository_root: &Path,
    root: &Path,
    reporter: &dyn Reporter,
) -> Result<Vec<DirectoryCheck>> {
    reporter.info(&format!("Checking all data directories within: {}", root.display()));

    let mut checks = Vec::new();
    for directory in tree_directories(repository_root, root, reporter)? {
        match check_data_directory(repository_root, &directory, reporter) {
            Ok(report) => checks.push(DirectoryCheck { directory, report }),
            Err(e) => reporter.error(&format!(" - Skipped {}: {}", directory.display(), e)),
        }
    }

    let failed = checks.iter().filter(|c| !c.report.is_valid).count();
    if failed == 0 {
        reporter.info(&format!("All {} directories validated", checks.len()));
    } else {
        reporter.error(&format!(
            "{} of {} directories contain errors",
            failed,
            checks.len()
        ));
    }

    Ok(checks)
}

/// Recursively create or extend manifests under `root`.
pub fn update_manifests(
    repository_root: &Path,
    root: &Path,
    reporter: &dyn Reporter,
) -> Result<Vec<DirectoryUpdate>> {
    reporter.info(&format!("Updating manifests within: {}", root.display()));

    let mut updates = Vec::new();
    for directory in tree_directories(repository_root, root, reporter)? {
        match populate_manifest(repository_root, &directory, reporter) {
            Ok(outcome) => updates.push(DirectoryUpdate { directory, outcome }),
            Err(e) => reporter.error(&format!(" - Skipped {}: {}", directory.display(), e)),
        }
    }

    Ok(updates)
}
