//! Name-indexed table of model definitions.

use crate::definition::{ModelDefinition, DEFINITION_RECORD};
use crate::error::{ModelError, Result};
use crate::recolor::TextureSet;
use partkit_cfg::ConfigNode;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Record name for shared texture sets.
pub const TEXTURE_SET_RECORD: &str = "TEXTURESET";

/// Definitions indexed by name.
///
/// Definitions are shared as `Arc`s so a reload never invalidates what
/// live instances already hold.
#[derive(Debug, Default, Clone)]
pub struct DefinitionCatalog {
    definitions: HashMap<String, Arc<ModelDefinition>>,
    texture_sets: HashMap<String, Arc<TextureSet>>,
}

impl DefinitionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the catalog from the children of `root`.
    ///
    /// Root-level `TEXTURESET` records are indexed first so definitions can
    /// reference them by name. Duplicate names are logged and the first
    /// record wins. The previous contents are replaced in one step.
    pub fn load(&mut self, root: &ConfigNode) {
        let mut texture_sets: HashMap<String, Arc<TextureSet>> = HashMap::new();
        for node in root.nodes_named(TEXTURE_SET_RECORD) {
            let set = TextureSet::from_config(node);
            match texture_sets.entry(set.name.clone()) {
                Entry::Occupied(_) => warn!("duplicate texture set '{}' ignored", set.name),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(set));
                }
            }
        }

        let mut definitions: HashMap<String, Arc<ModelDefinition>> = HashMap::new();
        for node in root.nodes_named(DEFINITION_RECORD) {
            let def = ModelDefinition::from_config(node, &texture_sets);
            if def.name.is_empty() {
                warn!("{} without a name skipped", DEFINITION_RECORD);
                continue;
            }
            match definitions.entry(def.name.clone()) {
                Entry::Occupied(_) => warn!("duplicate model definition '{}' ignored", def.name),
                Entry::Vacant(slot) => {
                    debug!("loaded model definition '{}'", def.name);
                    slot.insert(Arc::new(def));
                }
            }
        }

        info!(
            definitions = definitions.len(),
            texture_sets = texture_sets.len(),
            "model definition catalog loaded"
        );
        self.definitions = definitions;
        self.texture_sets = texture_sets;
    }

    /// Parse `text` and [`load`](Self::load) it.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        let root = partkit_cfg::parse(text)?;
        self.load(&root);
        Ok(())
    }

    /// Read and [`load`](Self::load) a record file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let root = partkit_cfg::parse_file(path)?;
        self.load(&root);
        Ok(())
    }

    /// Look up a definition.
    pub fn get(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        self.definitions.get(name).cloned()
    }

    /// Look up a definition that must exist.
    pub fn require(&self, name: &str) -> Result<Arc<ModelDefinition>> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownDefinition(name.to_string()))
    }

    /// Look up several definitions, preserving order. Unknown names are
    /// logged and skipped.
    pub fn get_many<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<ModelDefinition>> {
        names
            .iter()
            .filter_map(|n| {
                let n = n.as_ref();
                let found = self.get(n);
                if found.is_none() {
                    warn!("model definition '{}' not found", n);
                }
                found
            })
            .collect()
    }

    /// Shared texture set by name.
    pub fn texture_set(&self, name: &str) -> Option<Arc<TextureSet>> {
        self.texture_sets.get(name).cloned()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definition names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = r#"
MODEL_DEFINITION
{
    name = tank
    height = 4
    textureSet = white
}
MODEL_DEFINITION
{
    name = nose
    height = 2
}
MODEL_DEFINITION
{
    name = tank
    height = 99
}
TEXTURESET
{
    name = white
}
"#;

    #[test]
    fn load_indexes_and_keeps_first_duplicate() {
        let mut catalog = DefinitionCatalog::new();
        catalog.load_str(RECORDS).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["nose", "tank"]);
        assert_eq!(catalog.get("tank").unwrap().height, 4.0);
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.require("nose").unwrap().name, "nose");
        assert!(matches!(
            catalog.require("missing"),
            Err(ModelError::UnknownDefinition(name)) if name == "missing"
        ));
    }

    #[test]
    fn texture_sets_resolve_regardless_of_record_order() {
        let mut catalog = DefinitionCatalog::new();
        catalog.load_str(RECORDS).unwrap();
        let tank = catalog.get("tank").unwrap();
        assert_eq!(tank.texture_sets.len(), 1);
        assert!(catalog.texture_set("white").is_some());
    }

    #[test]
    fn get_many_skips_unknown_names() {
        let mut catalog = DefinitionCatalog::new();
        catalog.load_str(RECORDS).unwrap();
        let found = catalog.get_many(&["nose", "ghost", "tank"]);
        let names: Vec<_> = found.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["nose", "tank"]);
    }

    #[test]
    fn reload_replaces_table_and_keeps_held_definitions_alive() {
        let mut catalog = DefinitionCatalog::new();
        catalog.load_str(RECORDS).unwrap();
        let held = catalog.get("nose").unwrap();

        catalog
            .load_str("MODEL_DEFINITION\n{\n name = other\n}\n")
            .unwrap();
        assert_eq!(catalog.names(), vec!["other"]);
        assert_eq!(held.name, "nose");

        // idempotent
        catalog
            .load_str("MODEL_DEFINITION\n{\n name = other\n}\n")
            .unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn syntax_errors_surface_from_load_str() {
        let mut catalog = DefinitionCatalog::new();
        assert!(catalog.load_str("MODEL_DEFINITION\n{\n name = x\n").is_err());
        assert!(catalog.is_empty());
    }
}
