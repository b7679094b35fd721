//! Utility modules for the data tool.

pub mod errors;
pub mod logger;
pub mod reporter;

pub use errors::{Result, ToolError};
pub use reporter::{MemoryReporter, Reporter, TracingReporter};
