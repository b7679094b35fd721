//! Configuration management for the data tool.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! (`VE_DATA_TOOL__<SECTION>__<KEY>`), and writes the initial file during
//! `configure`.

use crate::utils::errors::{Result, ToolError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Marker directory identifying the root of a ve_data_science clone.
pub const REPOSITORY_MARKER: &str = ".ve_data_science";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "VE_DATA_TOOL_CONFIG";

const ENV_PREFIX: &str = "VE_DATA_TOOL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub globus: GlobusConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Absolute path of the local repository clone
    pub path: PathBuf,

    /// Data directory, relative to the repository root
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Analysis (scripts) directory, relative to the repository root
    #[serde(default = "default_analysis_dir")]
    pub analysis_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobusConfig {
    /// UUID of the registered client application
    pub app_client_uuid: String,

    #[serde(default = "default_app_client_name")]
    pub app_client_name: String,

    /// UUID of the shared remote collection
    pub remote_collection_uuid: String,

    /// UUID of the local personal collection
    #[serde(default)]
    pub local_collection_uuid: Option<String>,

    /// Data root within the remote collection
    #[serde(default = "default_remote_data_path")]
    pub remote_data_path: String,

    /// Bearer token for the transfer API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Deepest directory level expanded by recursive listings
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Pause after every N listing calls
    #[serde(default = "default_sleep_frequency")]
    pub sleep_frequency: usize,

    #[serde(default = "default_sleep_duration_ms")]
    pub sleep_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Seconds between task status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_analysis_dir() -> PathBuf {
    PathBuf::from("analysis")
}

fn default_app_client_name() -> String {
    "ve_data_science".to_string()
}

fn default_remote_data_path() -> String {
    "ve_data_science/data".to_string()
}

fn default_api_base_url() -> String {
    "https://transfer.api.globus.org/v0.10".to_string()
}

fn default_max_depth() -> usize {
    3
}

fn default_sleep_frequency() -> usize {
    10
}

fn default_sleep_duration_ms() -> u64 {
    500
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            sleep_frequency: default_sleep_frequency(),
            sleep_duration_ms: default_sleep_duration_ms(),
        }
    }
}

impl ListingConfig {
    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_duration_ms)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl TransferConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Create a configuration with defaults for everything but the identities.
    pub fn new(
        repository_path: PathBuf,
        app_client_uuid: String,
        remote_collection_uuid: String,
        local_collection_uuid: Option<String>,
    ) -> Self {
        Config {
            repository: RepositoryConfig {
                path: repository_path,
                data_dir: default_data_dir(),
                analysis_dir: default_analysis_dir(),
            },
            globus: GlobusConfig {
                app_client_uuid,
                app_client_name: default_app_client_name(),
                remote_collection_uuid,
                local_collection_uuid,
                remote_data_path: default_remote_data_path(),
                access_token: None,
                api_base_url: default_api_base_url(),
            },
            listing: ListingConfig::default(),
            transfer: TransferConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Load configuration from a TOML file, applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::Config(format!(
                "Configuration file not found at {}: run `configure`",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Toml,
            ))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the configuration file location.
    ///
    /// An explicit path wins, then `VE_DATA_TOOL_CONFIG`, then
    /// `$HOME/.config/ve_data_tool/config.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = std::env::var("HOME").map_err(|_| {
            ToolError::Config(format!(
                "Cannot locate configuration: set {} or HOME",
                CONFIG_PATH_ENV
            ))
        })?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("ve_data_tool")
            .join("config.toml"))
    }

    pub fn repository_path(&self) -> &Path {
        &self.repository.path
    }

    /// Absolute path of the data directory.
    pub fn data_path(&self) -> PathBuf {
        self.repository.path.join(&self.repository.data_dir)
    }

    /// Absolute path of the analysis directory.
    pub fn analysis_path(&self) -> PathBuf {
        self.repository.path.join(&self.repository.analysis_dir)
    }

    /// The local collection UUID, required for any Globus operation.
    pub fn local_collection(&self) -> Result<&str> {
        self.globus.local_collection_uuid.as_deref().ok_or_else(|| {
            ToolError::Config("globus.local_collection_uuid is not configured".to_string())
        })
    }
}

/// Arguments to [`configure`].
#[derive(Debug, Clone)]
pub struct ConfigureOptions {
    pub client_uuid: String,
    pub remote_uuid: String,
    pub local_uuid: Option<String>,
    pub repository_dir: Option<PathBuf>,
}

/// Generate the initial configuration file at `config_path`.
///
/// Refuses to overwrite an existing file, and requires the repository
/// directory (default: current directory) to contain the
/// `.ve_data_science` marker.
pub fn configure(options: ConfigureOptions, config_path: &Path) -> Result<PathBuf> {
    if config_path.exists() {
        return Err(ToolError::Config(format!(
            "Configuration file already exists at: {}",
            config_path.display()
        )));
    }

    let repository_path = match options.repository_dir {
        Some(dir) => std::path::absolute(dir)?,
        None => std::env::current_dir()?,
    };

    if !repository_path.join(REPOSITORY_MARKER).exists() {
        return Err(ToolError::Config(
            "Cannot confirm ve_data_science directory: run configuration in repository \
             root or provide path."
                .to_string(),
        ));
    }

    let config = Config::new(
        repository_path,
        options.client_uuid,
        options.remote_uuid,
        options.local_uuid,
    );
    config.save(config_path)?;

    Ok(config_path.to_path_buf())
}
