//! Creating and extending manifests from directory contents.
//!
//! Population only ever adds entries. Files that have disappeared keep
//! their entries; the validator reports them.

use super::manifest::{Manifest, ManifestFileEntry};
use crate::fs::scope::resolve_in_repository;
use crate::fs::walker::{data_file_names, MANIFEST_FILE_NAME};
use crate::utils::errors::Result;
use crate::utils::reporter::Reporter;
use std::fmt;
use std::path::Path;

/// What `populate` did to the directory's manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateStatus {
    /// No data files and no manifest: nothing written
    Empty,
    /// A new manifest was written
    Created,
    /// An existing manifest was read, and extended if anything was new
    Updated,
}

impl fmt::Display for PopulateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PopulateStatus::Empty => "empty",
            PopulateStatus::Created => "created",
            PopulateStatus::Updated => "updated",
        };
        write!(f, "{}", s)
    }
}

/// Result of populating one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateOutcome {
    pub status: PopulateStatus,
    /// Names newly added to the manifest, in discovery order
    pub added: Vec<String>,
}

/// Create or extend the manifest in `directory`.
///
/// # Errors
/// `OutOfScope` for directories outside the repository, manifest parse and
/// structure errors for an unreadable existing manifest, and I/O errors.
pub fn populate_manifest(
    repository_root: &Path,
    directory: &Path,
    reporter: &dyn Reporter,
) -> Result<PopulateOutcome> {
    let scoped = resolve_in_repository(repository_root, directory)?;
    let relative = scoped.relative_string();
    let candidates = data_file_names(&scoped.absolute)?;
    let manifest_path = scoped.absolute.join(MANIFEST_FILE_NAME);

    if !manifest_path.exists() {
        if candidates.is_empty() {
            return Ok(PopulateOutcome {
                status: PopulateStatus::Empty,
                added: Vec::new(),
            });
        }

        let manifest = Manifest {
            directory: relative.clone(),
            files: candidates.iter().map(ManifestFileEntry::bare).collect(),
        };
        manifest.save(&manifest_path)?;

        reporter.info(&format!("Created manifest for {}", relative));
        for name in &candidates {
            reporter.info(&format!(" + {}", name));
        }

        return Ok(PopulateOutcome {
            status: PopulateStatus::Created,
            added: candidates,
        });
    }

    let mut manifest = Manifest::load(&manifest_path)?;

    let added: Vec<String> = candidates
        .into_iter()
        .filter(|name| !manifest.contains(name))
        .collect();

    if !added.is_empty() {
        manifest
            .files
            .extend(added.iter().map(ManifestFileEntry::bare));
        manifest.save(&manifest_path)?;

        reporter.info(&format!("Updated manifest for {}", relative));
        for name in &added {
            reporter.info(&format!(" + {}", name));
        }
    }

    Ok(PopulateOutcome {
        status: PopulateStatus::Updated,
        added,
    })
}
