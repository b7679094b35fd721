//! Metadata checks for analysis scripts and notebooks.
//!
//! Every script in the analysis tree documents itself with a YAML block
//! (see [`frontmatter`]) that must match [`ScriptMetadata`] exactly.

pub mod frontmatter;

use crate::config::Config;
use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::errors::{Result, ToolError};
use crate::utils::reporter::Reporter;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

pub use frontmatter::{ScriptFormat, SCRIPT_SUFFIXES};

/// File names with a script suffix that are never checked.
pub const IGNORED_FILES: &[&str] = &["__init__.py", "README.md"];

/// An input or output file named by a script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptFileDetails {
    pub name: String,
    /// Directory of the file relative to the repository root
    pub path: String,
    pub description: String,
}

/// Metadata every analysis script must provide.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptMetadata {
    pub title: String,
    pub description: String,
    pub author: Vec<String>,
    pub virtual_ecosystem_module: Vec<String>,
    pub status: String,
    pub package_dependencies: Vec<String>,
    pub usage_notes: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub input_files: Vec<ScriptFileDetails>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output_files: Vec<ScriptFileDetails>,
}

// An empty YAML key loads as null; treat it like an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read and validate the metadata block of one script.
pub fn validate_script_metadata(path: &Path) -> Result<ScriptMetadata> {
    let format = ScriptFormat::from_path(path).ok_or_else(|| ToolError::ScriptMetadata {
        path: path.to_path_buf(),
        message: "Unsupported script file type".to_string(),
    })?;

    let text = std::fs::read_to_string(path)?;
    let value = format.extract(&text, path)?;

    serde_yaml::from_value(value).map_err(|e| ToolError::ScriptMetadata {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn display_path(path: &Path, repository_root: &Path) -> String {
    path.strip_prefix(repository_root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Check the named input and output files exist under the repository root.
fn check_file_locations(
    metadata: &ScriptMetadata,
    repository_root: &Path,
    reporter: &dyn Reporter,
) -> bool {
    let mut all_found = true;

    for (label, files) in [
        ("inputs", &metadata.input_files),
        ("outputs", &metadata.output_files),
    ] {
        reporter.info(&format!("     Checking {} files", label));
        for file in files {
            let relative = Path::new(&file.path).join(&file.name);
            if repository_root.join(&relative).exists() {
                reporter.info(&format!("       ✓ File found: {}", relative.display()));
            } else {
                reporter.error(&format!("       ✗ File not found: {}", relative.display()));
                all_found = false;
            }
        }
    }

    all_found
}

/// Recursively validate script metadata under `directory`, by default the
/// configured analysis directory.
///
/// Returns `true` only when every script passed.
pub fn check_scripts(
    config: &Config,
    directory: Option<&Path>,
    check_locations: bool,
    reporter: &dyn Reporter,
) -> bool {
    let directory: PathBuf = directory
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.analysis_path());
    let repository_root = config.repository_path();

    reporter.info(&format!("Script checking {}", directory.display()));

    if !directory.exists() {
        reporter.error(" ✗ Directory not found");
        return false;
    }
    if !directory.is_dir() {
        reporter.error(" ✗ Directory path is a file not a directory");
        return false;
    }

    let options = WalkOptions {
        exclude_names: IGNORED_FILES.iter().map(|s| s.to_string()).collect(),
        suffixes: SCRIPT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
    };
    let mut scripts: Vec<PathBuf> = match walk_directory(&directory, &options) {
        Ok(files) => files.into_iter().map(|f| f.path).collect(),
        Err(e) => {
            reporter.error(&format!(" ✗ Cannot read directory: {}", e));
            return false;
        }
    };
    scripts.sort();

    reporter.info(&format!(" - Found {} script files", scripts.len()));

    let mut all_valid = true;
    for script in &scripts {
        let shown = display_path(script, repository_root);

        match validate_script_metadata(script) {
            Ok(metadata) => {
                reporter.info(&format!("   ✓ {}", shown));
                if check_locations && !check_file_locations(&metadata, repository_root, reporter) {
                    all_valid = false;
                }
            }
            Err(e) => {
                reporter.error(&format!("   ✗ {}", shown));
                let message = match e {
                    ToolError::ScriptMetadata { message, .. } => message,
                    other => other.to_string(),
                };
                reporter.error(&format!("     {}", message));
                all_valid = false;
            }
        }
    }

    all_valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::reporter::MemoryReporter;
    use std::fs;
    use tempfile::TempDir;
    use tracing::Level;

    const PY_SCRIPT: &str = r#""""---
title: Soil carbon
description: Summarises soil carbon samples.
author:
  - A. Person
virtual_ecosystem_module:
  - soil
status: wip
input_files:
  - name: samples.csv
    path: data/primary/soil
    description: Raw samples
output_files:
package_dependencies:
  - pandas
usage_notes: None
---
"""

a = 1
"#;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/script_files")
    }

    fn repo() -> (TempDir, Config) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("analysis/soil")).unwrap();
        let config = Config::new(
            temp_dir.path().to_path_buf(),
            "client".to_string(),
            "remote".to_string(),
            None,
        );
        (temp_dir, config)
    }

    #[test]
    fn test_fixture_files_validate() -> Result<()> {
        for name in ["script.R", "script.py", "script.md", "script.Rmd"] {
            let metadata = validate_script_metadata(&fixtures().join(name))?;
            assert!(!metadata.title.is_empty(), "{}", name);
            assert!(!metadata.author.is_empty(), "{}", name);
        }
        Ok(())
    }

    #[test]
    fn test_null_file_lists_are_empty() -> Result<()> {
        let metadata = validate_script_metadata(&fixtures().join("script.py"))?;
        assert!(metadata.input_files.is_empty());
        assert!(metadata.output_files.is_empty());
        Ok(())
    }

    #[test]
    fn test_check_fixture_directory() {
        let (_temp_dir, config) = repo();
        let reporter = MemoryReporter::new();

        let fixtures = fixtures();
        assert!(check_scripts(&config, Some(&fixtures), true, &reporter));
        assert!(reporter.contains(Level::INFO, " - Found 4 script files"));
    }

    #[test]
    fn test_unknown_key_fails() {
        let (temp_dir, config) = repo();
        let script = temp_dir.path().join("analysis/soil/extra.py");
        let text = PY_SCRIPT.replace("status: wip", "status: wip\nreviewer: B");
        fs::write(&script, text).unwrap();
        let reporter = MemoryReporter::new();

        assert!(!check_scripts(&config, None, false, &reporter));
        assert!(reporter.contains(Level::ERROR, "   ✗ analysis/soil/extra.py"));
    }

    #[test]
    fn test_file_locations() {
        let (temp_dir, config) = repo();
        fs::write(temp_dir.path().join("analysis/soil/clean.py"), PY_SCRIPT).unwrap();
        let reporter = MemoryReporter::new();

        // Metadata is fine, the named input does not exist yet.
        assert!(check_scripts(&config, None, false, &reporter));
        assert!(!check_scripts(&config, None, true, &reporter));
        assert_eq!(reporter.count_matching(Level::ERROR, "File not found"), 1);

        fs::create_dir_all(temp_dir.path().join("data/primary/soil")).unwrap();
        fs::write(temp_dir.path().join("data/primary/soil/samples.csv"), "").unwrap();
        assert!(check_scripts(&config, None, true, &reporter));
    }

    #[test]
    fn test_ignored_and_hidden_files_are_skipped() {
        let (temp_dir, config) = repo();
        let analysis = temp_dir.path().join("analysis");
        fs::write(analysis.join("__init__.py"), "").unwrap();
        fs::write(analysis.join("README.md"), "# Analysis").unwrap();
        fs::write(analysis.join(".draft.py"), "").unwrap();
        fs::write(analysis.join("notes.txt"), "").unwrap();
        let reporter = MemoryReporter::new();

        assert!(check_scripts(&config, None, true, &reporter));
        assert!(reporter.contains(Level::INFO, " - Found 0 script files"));
    }

    #[test]
    fn test_missing_directory() {
        let (temp_dir, config) = repo();
        let reporter = MemoryReporter::new();

        let missing = temp_dir.path().join("nowhere");
        assert!(!check_scripts(&config, Some(&missing), false, &reporter));
        assert!(reporter.contains(Level::ERROR, " ✗ Directory not found"));
    }
}
