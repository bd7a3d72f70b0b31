//! Content loaders for reading action data from files.
//!
//! Definitions and level tables are RON, engine tuning is TOML. All loaders
//! deserialize straight into action-core types through their serde derives.

pub mod catalog;
pub mod config;
pub mod factory;
pub mod levels;

pub use catalog::ActionCatalog;
pub use config::ConfigLoader;
pub use factory::ContentFactory;
pub use levels::LevelTableLoader;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
