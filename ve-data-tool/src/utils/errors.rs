//! Custom error types for the data tool.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory is not within the repository: {}", .0.display())]
    OutOfScope(PathBuf),

    #[error("Cannot parse {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    #[error("Manifest structure incorrect in {}: {}", path.display(), problems.join("; "))]
    ManifestStructure {
        path: PathBuf,
        problems: Vec<String>,
    },

    #[error("Invalid script metadata in {}: {message}", path.display())]
    ScriptMetadata { path: PathBuf, message: String },

    #[error("Transfer API error: {0}")]
    TransferApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ToolError>;
