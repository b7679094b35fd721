//! Local filesystem helpers: directory walking and repository containment.

pub mod scope;
pub mod walker;

pub use scope::{resolve_in_repository, ScopedDirectory};
pub use walker::MANIFEST_FILE_NAME;
