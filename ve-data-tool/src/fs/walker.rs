//! Directory traversal for manifest and script checks.
//!
//! Hidden entries (names starting with `.`) are skipped everywhere; the
//! manifest file is a reserved name that never counts as data.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Reserved manifest file name, one per data directory.
pub const MANIFEST_FILE_NAME: &str = "MANIFEST.yaml";

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Exact file names to leave out
    pub exclude_names: Vec<String>,

    /// Lowercase suffixes (with leading dot) to keep; empty keeps everything
    pub suffixes: Vec<String>,
}

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File depth from root
    pub depth: usize,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> Self {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Self {
            path,
            relative_path,
            depth: entry.depth(),
        }
    }
}

/// True for dot-files and dot-directories.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

fn is_hidden(entry: &DirEntry) -> bool {
    // The walk root itself is never filtered, even if it is a dot-directory.
    entry.depth() > 0 && is_hidden_name(&entry.file_name().to_string_lossy())
}

fn walker(root: &Path) -> WalkDir {
    WalkDir::new(root).sort_by_file_name()
}

/// Walk a directory tree and collect all non-hidden files
///
/// # Arguments
/// * `root` - Root directory to start walking from
/// * `options` - Name and suffix filters
///
/// # Returns
/// * `Ok(Vec<FileInfo>)` - Files found, ordered by path
/// * `Err(io::Error)` - If a directory cannot be read
pub fn walk_directory(root: &Path, options: &WalkOptions) -> std::io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    for entry in walker(root).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        if should_exclude(&entry, options) {
            continue;
        }

        files.push(FileInfo::from_entry(&entry, root));
    }

    Ok(files)
}

/// Directories found by [`collect_directories`].
#[derive(Debug)]
pub struct DirectoryWalk {
    /// The walk root first, then every non-hidden directory below it
    pub directories: Vec<PathBuf>,

    /// Entries that could not be read; the walk went on without them
    pub errors: Vec<walkdir::Error>,
}

/// Collect `root` and every non-hidden directory below it, root first.
///
/// The root is always listed, whatever it is, so callers can report a
/// missing or non-directory root themselves. A subdirectory that cannot be
/// opened is still listed, and its error is kept in
/// [`DirectoryWalk::errors`].
pub fn collect_directories(root: &Path) -> DirectoryWalk {
    let mut walk = DirectoryWalk {
        directories: vec![root.to_path_buf()],
        errors: Vec::new(),
    };

    if !root.is_dir() {
        return walk;
    }

    for entry in walker(root).into_iter().filter_entry(|e| !is_hidden(e)) {
        match entry {
            Ok(entry) if entry.depth() > 0 && entry.file_type().is_dir() => {
                walk.directories.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => walk.errors.push(e),
        }
    }

    walk
}

/// Build `<base>/deep/...` so that the walk can enter its upper levels but
/// not the last ones, whose full path exceeds `PATH_MAX`.
///
/// Opening such a directory fails with `ENAMETOOLONG` even for root.
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn build_unopenable_tree(base: &Path) -> std::io::Result<()> {
    let segment = "d".repeat(200);

    let mut deep = base.join("deep");
    std::fs::create_dir(&deep)?;
    while deep.as_os_str().len() <= 3600 {
        deep.push(&segment);
        std::fs::create_dir(&deep)?;
    }

    // Deeper levels are built under a short path and moved into place.
    let staging = base.join("staging");
    let mut inner = staging.join(&segment);
    for _ in 0..3 {
        inner.push(&segment);
    }
    std::fs::create_dir_all(&inner)?;
    std::fs::rename(staging.join(&segment), deep.join(&segment))?;
    std::fs::remove_dir(&staging)
}

/// Names of the non-hidden, non-manifest regular files directly in `dir`,
/// sorted by name.
pub fn data_file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if is_hidden_name(&name) || name == MANIFEST_FILE_NAME {
            continue;
        }

        if entry.path().is_file() {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Check a file entry against the name and suffix filters
fn should_exclude(entry: &DirEntry, options: &WalkOptions) -> bool {
    let file_name = entry.file_name().to_string_lossy();

    if options.exclude_names.iter().any(|name| *name == file_name) {
        return true;
    }

    if options.suffixes.is_empty() {
        return false;
    }

    let suffix = entry
        .path()
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()));

    match suffix {
        Some(suffix) => !options.suffixes.contains(&suffix),
        None => true,
    }
}
