//! Validation of a data directory against its manifest.
//!
//! Every applicable check runs before the report is returned, so one pass
//! lists every problem with a directory. Only a missing manifest, an
//! unreadable manifest or a missing directory stop the checks early.

use super::manifest::Manifest;
use crate::fs::scope::{relative_segments, resolve_in_repository};
use crate::fs::walker::{data_file_names, MANIFEST_FILE_NAME};
use crate::utils::errors::{Result, ToolError};
use crate::utils::reporter::Reporter;
use std::collections::BTreeSet;
use std::path::Path;

/// Outcome of validating one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl DirectoryValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Whether any error line contains `fragment`.
    pub fn has_error(&self, fragment: &str) -> bool {
        self.errors.iter().any(|e| e.contains(fragment))
    }
}

/// Accumulates errors while logging each as it is found.
struct Findings<'a> {
    errors: Vec<String>,
    reporter: &'a dyn Reporter,
}

impl<'a> Findings<'a> {
    fn new(reporter: &'a dyn Reporter) -> Self {
        Self {
            errors: Vec::new(),
            reporter,
        }
    }

    fn record(&mut self, error: String) {
        self.reporter.error(&format!(" - {}", error));
        self.errors.push(error);
    }

    fn finish(self) -> DirectoryValidationReport {
        if self.errors.is_empty() {
            self.reporter.info(" - Directory validated");
        } else {
            self.reporter.error(" - Directory manifest contains errors");
        }
        DirectoryValidationReport::from_errors(self.errors)
    }
}

/// Validate a data directory.
///
/// Checks that the directory's non-hidden files are described by a
/// `MANIFEST.yaml` whose `directory` matches its location relative to the
/// repository root, and that every entry names exactly one of url or script.
///
/// # Errors
/// Only `ToolError::OutOfScope`, when `directory` is outside the repository.
/// Every other problem is recorded in the returned report.
pub fn check_data_directory(
    repository_root: &Path,
    directory: &Path,
    reporter: &dyn Reporter,
) -> Result<DirectoryValidationReport> {
    let scoped = match resolve_in_repository(repository_root, directory) {
        Ok(scoped) => scoped,
        Err(e) => {
            reporter.error(&format!("Cannot check {}: {}", directory.display(), e));
            return Err(e);
        }
    };

    reporter.info(&format!("Checking {}", scoped.relative_string()));
    let mut findings = Findings::new(reporter);

    if !scoped.absolute.exists() {
        findings.record("Directory not found".to_string());
        return Ok(findings.finish());
    }

    if !scoped.absolute.is_dir() {
        findings.record("Directory path is a file not a directory".to_string());
        return Ok(findings.finish());
    }

    let actual_files: BTreeSet<String> = match data_file_names(&scoped.absolute) {
        Ok(names) => names.into_iter().collect(),
        Err(e) => {
            findings.record(format!("Cannot read directory: {}", e));
            return Ok(findings.finish());
        }
    };

    reporter.info(&format!(" - Found {} files.", actual_files.len()));

    let manifest_path = scoped.absolute.join(MANIFEST_FILE_NAME);
    let has_manifest = manifest_path.is_file();

    match (actual_files.is_empty(), has_manifest) {
        (true, false) => return Ok(findings.finish()),
        (false, false) => {
            findings.record(format!("{} not found", MANIFEST_FILE_NAME));
            return Ok(findings.finish());
        }
        (true, true) => {
            findings.record(format!("{} present in empty directory", MANIFEST_FILE_NAME));
            return Ok(findings.finish());
        }
        (false, true) => {}
    }

    let manifest = match Manifest::load(&manifest_path) {
        Ok(manifest) => manifest,
        Err(ToolError::ManifestStructure { problems, .. }) => {
            for problem in problems {
                findings.record(format!("{} structure incorrect: {}", MANIFEST_FILE_NAME, problem));
            }
            return Ok(findings.finish());
        }
        Err(ToolError::ManifestParse { message, .. }) => {
            findings.record(format!("Cannot parse {}: {}", MANIFEST_FILE_NAME, message));
            return Ok(findings.finish());
        }
        Err(e) => {
            findings.record(format!("Cannot read {}: {}", MANIFEST_FILE_NAME, e));
            return Ok(findings.finish());
        }
    };

    // Identity: the manifest must name its own location, relative to the root.
    if relative_segments(Path::new(&manifest.directory)) != relative_segments(&scoped.relative) {
        findings.record(format!(
            "{} directory name does not match: {}",
            MANIFEST_FILE_NAME, manifest.directory
        ));
    }

    let manifest_files: BTreeSet<String> = manifest
        .file_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let only_in_manifest: Vec<&str> = manifest_files
        .difference(&actual_files)
        .map(String::as_str)
        .collect();
    if !only_in_manifest.is_empty() {
        findings.record(format!(
            "Unknown files in manifest: {}",
            only_in_manifest.join(", ")
        ));
    }

    let only_in_directory: Vec<&str> = actual_files
        .difference(&manifest_files)
        .map(String::as_str)
        .collect();
    if !only_in_directory.is_empty() {
        findings.record(format!(
            "Files missing from manifest: {}",
            only_in_directory.join(", ")
        ));
    }

    for problem in manifest.provenance_problems() {
        findings.record(problem);
    }

    Ok(findings.finish())
}
