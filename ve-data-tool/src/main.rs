//! ve-data-tool - Main entry point
//!
//! Maintenance commands for a ve_data_science repository clone.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use ve_data_tool::config::{configure, Config, ConfigureOptions};
use ve_data_tool::globus::{self, EndpointPair, GlobusClient, ListingOptions};
use ve_data_tool::utils::{self, TracingReporter};
use ve_data_tool::{data, scripts};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check script and notebook metadata
    Scripts {
        /// Directory to check (default: analysis directory)
        directory: Option<PathBuf>,

        /// Also check that named input and output files exist
        #[arg(short = 'c', long)]
        check_file_locations: bool,
    },

    /// Validate data directory manifests
    Data {
        /// Directory to check (default: data directory)
        directory: Option<PathBuf>,
    },

    /// Create or extend data directory manifests
    Manifests {
        /// Directory to update (default: data directory)
        directory: Option<PathBuf>,
    },

    /// Synchronise the data directory with the remote collection
    GlobusSync,

    /// Compare local and remote data files
    GlobusStatus,

    /// Write the initial configuration file
    Configure {
        /// Globus app client UUID
        #[arg(long)]
        client_uuid: String,

        /// Remote collection UUID
        #[arg(long)]
        remote_uuid: String,

        /// Local collection UUID
        #[arg(long)]
        local_uuid: Option<String>,

        /// Repository root (default: current directory)
        #[arg(long, value_name = "DIR")]
        repository: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            // Logging may not be up yet if configuration failed to load.
            let _ = utils::logger::init("info");
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Directory arguments are taken relative to the working directory.
fn absolute_or(directory: Option<PathBuf>, default: PathBuf) -> Result<PathBuf> {
    match directory {
        Some(dir) => Ok(std::path::absolute(&dir)?),
        None => Ok(default),
    }
}

async fn run(args: Args) -> Result<bool> {
    let config_path = Config::resolve_path(args.config.as_deref())?;

    let command = match args.command {
        Command::Configure {
            client_uuid,
            remote_uuid,
            local_uuid,
            repository,
        } => {
            utils::logger::init(args.log_level.as_deref().unwrap_or("info"))?;
            let written = configure(
                ConfigureOptions {
                    client_uuid,
                    remote_uuid,
                    local_uuid,
                    repository_dir: repository,
                },
                &config_path,
            )?;
            tracing::info!("Configuration written to {}", written.display());
            return Ok(true);
        }
        command => command,
    };

    let shown = config_path.display();
    let config = Config::from_file(&config_path)
        .with_context(|| format!("Could not load configuration from {}", shown))?;

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::debug!(
        "ve-data-tool v{} (repository: {})",
        env!("CARGO_PKG_VERSION"),
        config.repository_path().display()
    );

    let reporter = TracingReporter;
    let repository_root: &Path = config.repository_path();

    match command {
        Command::Scripts {
            directory,
            check_file_locations,
        } => {
            let directory = absolute_or(directory, config.analysis_path())?;
            Ok(scripts::check_scripts(
                &config,
                Some(&directory),
                check_file_locations,
                &reporter,
            ))
        }
        Command::Data { directory } => {
            let directory = absolute_or(directory, config.data_path())?;
            let checks = data::check_data(repository_root, &directory, &reporter)?;
            Ok(checks.iter().all(|check| check.report.is_valid))
        }
        Command::Manifests { directory } => {
            let directory = absolute_or(directory, config.data_path())?;
            data::update_manifests(repository_root, &directory, &reporter)?;
            Ok(true)
        }
        Command::GlobusSync => {
            let client = GlobusClient::from_config(&config)?;
            let endpoints = EndpointPair::from_config(&config)?;
            let synced = globus::globus_sync(
                &client,
                &endpoints,
                config.transfer.poll_interval(),
                &reporter,
            )
            .await?;
            Ok(synced)
        }
        Command::GlobusStatus => {
            let client = GlobusClient::from_config(&config)?;
            let endpoints = EndpointPair::from_config(&config)?;
            let options = ListingOptions::from_config(&config.listing);
            globus::globus_status(&client, &endpoints, &options, &reporter).await?;
            Ok(true)
        }
        Command::Configure { .. } => Ok(true),
    }
}
