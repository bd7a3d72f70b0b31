//! Action system configuration loader.

use std::path::Path;

use action_core::ActionSystemConfig;
use tracing::debug;

use crate::loaders::{LoadResult, read_file};

/// Loader for [`ActionSystemConfig`] from TOML files.
///
/// Keys missing from the file keep their engine defaults.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML file containing ActionSystemConfig
    pub fn load(path: &Path) -> LoadResult<ActionSystemConfig> {
        let content = read_file(path)?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "action system config loaded");
        Ok(config)
    }

    /// Parse config data from TOML text.
    pub fn parse(content: &str) -> LoadResult<ActionSystemConfig> {
        let config: ActionSystemConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;

        if !(config.periodic_step.is_finite() && config.periodic_step > 0.0) {
            return Err(anyhow::anyhow!(
                "periodic_step must be positive and finite, got {}",
                config.periodic_step
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ConfigLoader::parse("distance_to_ground = 450.0\n").unwrap();
        assert_eq!(config.distance_to_ground, 450.0);
        assert_eq!(
            config.periodic_step,
            ActionSystemConfig::DEFAULT_PERIODIC_STEP
        );
        assert_eq!(
            config.fallback_landing_velocity,
            ActionSystemConfig::DEFAULT_FALLBACK_LANDING_VELOCITY
        );
    }

    #[test]
    fn bundled_config_matches_defaults() {
        let config = ConfigLoader::parse(include_str!("../../data/config.toml")).unwrap();
        assert_eq!(config, ActionSystemConfig::default());
    }

    #[test]
    fn degenerate_step_rejected() {
        assert!(ConfigLoader::parse("periodic_step = 0.0\n").is_err());
        assert!(ConfigLoader::parse("periodic_step = inf\n").is_err());
        assert!(ConfigLoader::parse("periodic_step = nan\n").is_err());
        assert!(ConfigLoader::parse("periodic_step = \"fast\"\n").is_err());
    }
}
