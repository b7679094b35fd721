//! Manifest types for data directories.
//!
//! A manifest (`MANIFEST.yaml`) lists every data file in one directory with
//! its provenance: either an external `url` or the `script` that generated
//! it. Loading checks shape only; the url-or-script rule is applied by the
//! validator so that partially completed manifests stay loadable.

use crate::utils::errors::{Result, ToolError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Data directory manifest, serialized as `MANIFEST.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Location of the manifest relative to the repository root
    pub directory: String,
    pub files: Vec<ManifestFileEntry>,
}

/// Provenance details for a single file in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFileEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(default, rename = "md5", skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ManifestFileEntry {
    /// An entry with no provenance recorded yet.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            script: None,
            checksum: None,
        }
    }

    /// Exactly one of `url` and `script` is set.
    pub fn has_complete_provenance(&self) -> bool {
        self.url.is_some() != self.script.is_some()
    }
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// YAML syntax failures are `ManifestParse`; documents that parse but do
    /// not have the manifest shape are `ManifestStructure`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    /// Parse manifest text; `path` is only used for error reporting.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ToolError::ManifestParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let manifest: Manifest =
            serde_yaml::from_value(value).map_err(|e| ToolError::ManifestStructure {
                path: path.to_path_buf(),
                problems: vec![e.to_string()],
            })?;

        let problems = manifest.structure_problems();
        if !problems.is_empty() {
            return Err(ToolError::ManifestStructure {
                path: path.to_path_buf(),
                problems,
            });
        }

        Ok(manifest)
    }

    /// Write the manifest as YAML, leaving unset optional fields out.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Shape problems beyond what deserialization enforces: empty or
    /// duplicated names and malformed URLs.
    pub fn structure_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for (idx, entry) in self.files.iter().enumerate() {
            if entry.name.trim().is_empty() {
                problems.push(format!("files[{}]: name is empty", idx));
            } else if !seen.insert(entry.name.as_str()) {
                problems.push(format!("{}: duplicate file name", entry.name));
            }

            if let Some(url) = &entry.url {
                if let Err(e) = reqwest::Url::parse(url) {
                    problems.push(format!("{}: invalid url '{}' ({})", entry.name, url, e));
                }
            }
        }

        problems
    }

    /// One message per entry that does not set exactly one of url or script.
    pub fn provenance_problems(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|entry| !entry.has_complete_provenance())
            .map(|entry| format!("{}: provide one of url or script", entry.name))
            .collect()
    }

    /// Whether an entry with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|entry| entry.name == name)
    }

    pub fn file_names(&self) -> HashSet<&str> {
        self.files.iter().map(|entry| entry.name.as_str()).collect()
    }
}
