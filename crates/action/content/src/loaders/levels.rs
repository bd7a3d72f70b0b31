//! Per-level parameter table loader.

use std::collections::BTreeMap;
use std::path::Path;

use action_core::LevelTable;

use crate::loaders::{LoadResult, read_file};

/// Loader for level tables keyed by action name.
///
/// The RON layout is `{ "ActionName": { level: { "Key": value } } }`.
pub struct LevelTableLoader;

impl LevelTableLoader {
    /// Load level tables from a RON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the RON file
    ///
    /// # Returns
    ///
    /// Returns the tables keyed by action name.
    pub fn load(path: &Path) -> LoadResult<BTreeMap<String, LevelTable>> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    /// Parse level tables from RON text.
    pub fn parse(content: &str) -> LoadResult<BTreeMap<String, LevelTable>> {
        let tables: BTreeMap<String, LevelTable> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse level tables RON: {}", e))?;
        Ok(tables)
    }

    /// Level tables bundled with the crate.
    pub fn embedded() -> LoadResult<BTreeMap<String, LevelTable>> {
        Self::parse(include_str!("../../data/levels.ron"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRYOSEISM_KEYS: [&str; 10] = [
        "SlowDuration",
        "SlowMagnitude",
        "ExplodeTime",
        "StunDuration",
        "ChainStunDuration",
        "InitialRadius",
        "ChainRadius",
        "LeapVelocity",
        "LandingTime",
        "LandingVelocity",
    ];

    #[test]
    fn embedded_rows_are_complete() {
        let tables = LevelTableLoader::embedded().unwrap();
        let cryoseism = tables.get("Cryoseism").expect("cryoseism table");
        let levels: Vec<u32> = cryoseism.levels().collect();
        assert_eq!(levels, vec![1, 2, 3]);
        for level in levels {
            for key in CRYOSEISM_KEYS {
                assert!(
                    cryoseism.value(level, key).is_some(),
                    "level {level} is missing {key}"
                );
            }
        }
    }

    #[test]
    fn parse_inline_table() {
        let tables = LevelTableLoader::parse(r#"{ "Dash": { 1: { "Distance": 400.0 } } }"#).unwrap();
        assert_eq!(tables["Dash"].value(1, "Distance"), Some(400.0));
        assert_eq!(tables["Dash"].value(2, "Distance"), None);
    }
}
