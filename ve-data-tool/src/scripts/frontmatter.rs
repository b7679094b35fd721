//! YAML metadata blocks embedded in scripts and notebooks.

use crate::utils::errors::{Result, ToolError};
use std::path::Path;

/// Script and notebook formats carrying a metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    /// `#| `-commented YAML at the top of an R script
    RScript,
    /// YAML in the module docstring
    Python,
    /// Front-matter with a `ve_data_science` section (MyST or R Markdown)
    Markdown,
}

/// Lowercase suffixes of the files handled by the scripts checker.
pub const SCRIPT_SUFFIXES: &[&str] = &[".r", ".py", ".md", ".rmd"];

const R_MARKER: &str = "#| ---";
const NOTEBOOK_SECTION: &str = "ve_data_science";

fn invalid(path: &Path, message: impl Into<String>) -> ToolError {
    ToolError::ScriptMetadata {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_yaml(document: &str, path: &Path) -> Result<serde_yaml::Value> {
    serde_yaml::from_str(document).map_err(|e| invalid(path, format!("Invalid YAML: {}", e)))
}

impl ScriptFormat {
    /// Pick the format from the file suffix, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let suffix = path.extension()?.to_string_lossy().to_lowercase();
        match suffix.as_str() {
            "r" => Some(ScriptFormat::RScript),
            "py" => Some(ScriptFormat::Python),
            "md" | "rmd" => Some(ScriptFormat::Markdown),
            _ => None,
        }
    }

    /// Extract the metadata document from file text.
    pub fn extract(self, text: &str, path: &Path) -> Result<serde_yaml::Value> {
        match self {
            ScriptFormat::RScript => extract_r(text, path),
            ScriptFormat::Python => extract_python(text, path),
            ScriptFormat::Markdown => extract_markdown(text, path),
        }
    }
}

fn extract_r(text: &str, path: &Path) -> Result<serde_yaml::Value> {
    let lines: Vec<&str> = text.lines().collect();
    let markers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim_end() == R_MARKER)
        .map(|(idx, _)| idx)
        .collect();

    if markers.len() < 2 {
        return Err(invalid(path, "YAML block not contained within document markers."));
    }
    if markers[0] != 0 {
        return Err(invalid(path, "First YAML metadata marker is not at the file start."));
    }

    // The closing marker would open a second document, so it is left out.
    let block = &lines[markers[0]..markers[1]];
    if !block
        .iter()
        .all(|line| line.starts_with("#| ") || line.trim_end() == "#|")
    {
        return Err(invalid(
            path,
            "Inconsistent use of YAML line comment within YAML block.",
        ));
    }

    let document: Vec<&str> = block
        .iter()
        .map(|line| {
            let rest = line.strip_prefix("#|").unwrap_or(line);
            rest.strip_prefix(' ').unwrap_or(rest)
        })
        .collect();

    parse_yaml(&document.join("\n"), path)
}

/// Body of the leading triple-quoted string, if the module starts with one.
fn module_docstring(text: &str) -> Option<&str> {
    let mut rest = text.trim_start_matches('\u{feff}');

    // Comments and blank lines may precede the docstring.
    loop {
        let trimmed = rest.trim_start();
        if trimmed.starts_with('#') {
            rest = trimmed.split_once('\n').map_or("", |(_, after)| after);
        } else {
            rest = trimmed;
            break;
        }
    }

    let rest = rest
        .strip_prefix(|c: char| matches!(c, 'r' | 'R' | 'u' | 'U'))
        .unwrap_or(rest);

    ["\"\"\"", "'''"].iter().find_map(|quote| {
        let body = rest.strip_prefix(quote)?;
        body.find(quote).map(|end| &body[..end])
    })
}

fn extract_python(text: &str, path: &Path) -> Result<serde_yaml::Value> {
    let docstring =
        module_docstring(text).ok_or_else(|| invalid(path, "Missing docstring in python script"))?;

    // Drop the closing document marker and any trailing blank lines.
    let document = format!(
        "{}\n",
        docstring.trim_end_matches(|c| c == '\n' || c == '\r' || c == '-')
    );

    parse_yaml(&document, path)
}

fn extract_markdown(text: &str, path: &Path) -> Result<serde_yaml::Value> {
    let lines: Vec<&str> = text.lines().collect();
    let markers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with("---"))
        .map(|(idx, _)| idx)
        .collect();

    if markers.len() != 2 {
        return Err(invalid(
            path,
            format!("Found {} not 2 YAML metadata markers.", markers.len()),
        ));
    }
    if markers[0] != 0 {
        return Err(invalid(path, "First YAML metadata marker is not at the file start."));
    }

    let front_matter = parse_yaml(&lines[markers[0]..markers[1]].join("\n"), path)?;

    front_matter
        .get(NOTEBOOK_SECTION)
        .cloned()
        .ok_or_else(|| invalid(path, format!("{} metadata not found", NOTEBOOK_SECTION)))
}
