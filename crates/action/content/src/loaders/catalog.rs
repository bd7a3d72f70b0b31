//! Action catalog: definitions turned into shared templates.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use action_core::{ActionDefinition, ActionTemplate, LevelTable};
use tracing::{debug, warn};

use crate::abilities;
use crate::loaders::{LevelTableLoader, LoadResult, read_file};

/// Registry of action templates keyed by action name.
///
/// Inserting a definition attaches its level table (when the definition
/// does not carry one), installs code hooks for abilities that have them,
/// and logs table issues without rejecting the definition.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    templates: BTreeMap<String, Arc<ActionTemplate>>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the action definitions and level tables bundled with the crate.
    pub fn embedded() -> LoadResult<Self> {
        let levels = LevelTableLoader::embedded()?;
        let mut catalog = Self::new();

        // Signature abilities
        let cryoseism = parse_definitions(include_str!("../../data/actions/cryoseism.ron"))
            .map_err(|e| anyhow::anyhow!("Failed to parse cryoseism.ron: {}", e))?;
        catalog.extend(cryoseism, &levels);

        // Utility actions (Sprint, Stagger)
        let basic = parse_definitions(include_str!("../../data/actions/basic.ron"))
            .map_err(|e| anyhow::anyhow!("Failed to parse basic.ron: {}", e))?;
        catalog.extend(basic, &levels);

        Ok(catalog)
    }

    /// Loads action definitions from a RON file.
    ///
    /// # Arguments
    ///
    /// * `path` - RON file holding a list of action definitions
    /// * `levels` - Optional RON file of level tables keyed by action name
    pub fn load(path: &Path, levels: Option<&Path>) -> LoadResult<Self> {
        let content = read_file(path)?;
        let definitions = parse_definitions(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        let levels = match levels {
            Some(levels) => LevelTableLoader::load(levels)?,
            None => BTreeMap::new(),
        };

        let mut catalog = Self::new();
        catalog.extend(definitions, &levels);
        Ok(catalog)
    }

    /// Adds definitions, attaching level tables by action name.
    pub fn extend(
        &mut self,
        definitions: impl IntoIterator<Item = ActionDefinition>,
        levels: &BTreeMap<String, LevelTable>,
    ) {
        for mut definition in definitions {
            if definition.level_table.is_none()
                && let Some(table) = levels.get(&definition.name)
            {
                definition.level_table = Some(table.clone());
            }
            self.insert(definition);
        }
    }

    /// Builds the template for `definition` and registers it, replacing any
    /// action with the same name.
    pub fn insert(&mut self, definition: ActionDefinition) -> Arc<ActionTemplate> {
        let template = abilities::install(ActionTemplate::new(definition));
        let name = template.name().to_string();

        for issue in template.validate() {
            warn!(action = %name, ?issue, "action table issue");
        }
        match template.fingerprint() {
            Some(digest) => {
                debug!(action = %name, fingerprint = %hex::encode(digest), "action registered")
            }
            None => debug!(action = %name, "action registered"),
        }

        let template = Arc::new(template);
        if self
            .templates
            .insert(name.clone(), Arc::clone(&template))
            .is_some()
        {
            warn!(action = %name, "action definition replaced");
        }
        template
    }

    pub fn get(&self, name: &str) -> Option<Arc<ActionTemplate>> {
        self.templates.get(name).cloned()
    }

    /// Hex-encoded definition fingerprint, for comparing peers' content.
    pub fn fingerprint(&self, name: &str) -> Option<String> {
        self.templates
            .get(name)?
            .fingerprint()
            .map(hex::encode)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ActionTemplate>)> + '_ {
        self.templates.iter().map(|(name, t)| (name.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn parse_definitions(content: &str) -> Result<Vec<ActionDefinition>, ron::error::SpannedError> {
    ron::from_str(content)
}
