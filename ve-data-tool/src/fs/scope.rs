//! Repository containment for directory arguments.

use crate::utils::errors::{Result, ToolError};
use std::path::{Component, Path, PathBuf};

/// A directory known to lie within the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedDirectory {
    /// Absolute, lexically normalised path
    pub absolute: PathBuf,

    /// Location relative to the repository root (empty for the root itself)
    pub relative: PathBuf,
}

impl ScopedDirectory {
    /// The relative location with `/` separators, as written in manifests.
    pub fn relative_string(&self) -> String {
        relative_segments(&self.relative)
            .unwrap_or_default()
            .join("/")
    }
}

/// Resolve `directory` against `repository_root` and reject anything outside it.
///
/// Relative paths are taken relative to the root. Nothing touches the
/// filesystem here: the directory need not exist.
pub fn resolve_in_repository(repository_root: &Path, directory: &Path) -> Result<ScopedDirectory> {
    let root = normalize(&std::path::absolute(repository_root)?);
    let joined = if directory.is_absolute() {
        directory.to_path_buf()
    } else {
        root.join(directory)
    };
    let absolute = normalize(&joined);

    let relative = absolute
        .strip_prefix(&root)
        .map_err(|_| ToolError::OutOfScope(directory.to_path_buf()))?
        .to_path_buf();

    Ok(ScopedDirectory { absolute, relative })
}

/// Normal components of a relative path as strings.
///
/// `.` components are dropped. Returns `None` for absolute paths and for
/// paths that step up with `..`, since those cannot name a location below
/// the repository root as written.
pub fn relative_segments(path: &Path) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => return None,
        }
    }
    Some(segments)
}

/// Resolve `.` and `..` without consulting the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
