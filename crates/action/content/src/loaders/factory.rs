//! Content factory for loading action content from a data directory.

use std::path::{Path, PathBuf};

use action_core::ActionSystemConfig;

use crate::loaders::{ActionCatalog, ConfigLoader, LoadResult};

/// Content factory that loads all action content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── config.toml
/// ├── levels.ron
/// └── actions/
///     ├── cryoseism.ron
///     └── basic.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    /// Creates a new content factory pointing to a data directory.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Path to the directory containing data files
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load action system configuration from `config.toml`.
    pub fn load_config(&self) -> LoadResult<ActionSystemConfig> {
        let path = self.data_dir.join("config.toml");
        ConfigLoader::load(&path)
    }

    /// Load every `actions/*.ron` file into one catalog.
    ///
    /// Level tables come from `levels.ron` when present. Files are read in
    /// name order so later files replace earlier actions of the same name.
    pub fn load_catalog(&self) -> LoadResult<ActionCatalog> {
        let levels_path = self.data_dir.join("levels.ron");
        let levels = levels_path.exists().then_some(levels_path.as_path());

        let actions_dir = self.data_dir.join("actions");
        let entries = std::fs::read_dir(&actions_dir).map_err(|e| {
            anyhow::anyhow!("Failed to read directory {}: {}", actions_dir.display(), e)
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
            .collect();
        files.sort();

        let mut catalog = ActionCatalog::new();
        for file in files {
            let loaded = ActionCatalog::load(&file, levels)?;
            for (_, template) in loaded.iter() {
                catalog.insert(template.definition().clone());
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_data_dir_loads() {
        let factory = ContentFactory::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"));
        let config = factory.load_config().unwrap();
        assert_eq!(config, ActionSystemConfig::default());

        let catalog = factory.load_catalog().unwrap();
        let embedded = ActionCatalog::embedded().unwrap();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, embedded.names().collect::<Vec<_>>());
        assert_eq!(
            catalog.fingerprint("Cryoseism"),
            embedded.fingerprint("Cryoseism")
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let factory = ContentFactory::new("/definitely/not/here");
        let err = factory.load_catalog().unwrap_err();
        assert!(err.to_string().contains("Failed to read directory"));
    }
}
