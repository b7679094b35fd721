//! ve_data_science repository maintenance library
//!
//! Data manifest validation and population, script metadata checks, and
//! Globus synchronisation of the data directory.

pub mod config;
pub mod data;
pub mod fs;
pub mod globus;
pub mod scripts;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::ToolError;
pub type Result<T> = std::result::Result<T, ToolError>;
