//! Multi-instance layouts and the per-slot definition/layout option sets.

use crate::catalog::DefinitionCatalog;
use crate::definition::ModelDefinition;
use crate::error::{ModelError, Result};
use crate::fields::{read_string, read_strings, read_vec3};
use partkit_cfg::ConfigNode;
use partkit_math::{LocalTransform, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Record name for layouts.
pub const LAYOUT_RECORD: &str = "MODEL_LAYOUT";
/// Record name for slot usage entries.
pub const USAGE_RECORD: &str = "MODEL";
/// Name of the built-in single-position layout.
pub const DEFAULT_LAYOUT: &str = "default";

/// One copy of the model within a layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPositionData {
    /// Position relative to the slot, in unscaled units.
    pub position: Vec3,
    /// Scale relative to the instance scale.
    pub scale: Vec3,
    /// Rotation, Euler degrees.
    pub rotation: Vec3,
}

impl Default for ModelPositionData {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            scale: Vec3::repeat(1.0),
            rotation: Vec3::zeros(),
        }
    }
}

impl ModelPositionData {
    fn from_config(node: &ConfigNode, context: &str) -> Self {
        Self {
            position: read_vec3(node, "position", Vec3::zeros(), context),
            scale: read_vec3(node, "scale", Vec3::repeat(1.0), context),
            rotation: read_vec3(node, "rotation", Vec3::zeros(), context),
        }
    }

    /// The position as a local transform, with the offset scaled by
    /// `(horizontal, vertical, horizontal)` and `y_offset` added.
    pub fn local_transform(&self, horizontal: f64, vertical: f64, y_offset: f64) -> LocalTransform {
        LocalTransform::from_parts(
            Vec3::new(
                self.position.x * horizontal,
                self.position.y * vertical + y_offset,
                self.position.z * horizontal,
            ),
            self.rotation,
            self.scale,
        )
    }
}

/// Named list of positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLayout {
    /// Unique name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Positions, in authored order.
    pub positions: Vec<ModelPositionData>,
}

impl ModelLayout {
    /// The built-in layout: one identity position.
    pub fn default_layout() -> Self {
        Self {
            name: DEFAULT_LAYOUT.to_string(),
            title: "Single".to_string(),
            positions: vec![ModelPositionData::default()],
        }
    }

    /// Parse a `MODEL_LAYOUT` record.
    pub fn from_config(node: &ConfigNode) -> Self {
        let name = read_string(node, "name").unwrap_or_default();
        let context = format!("{} '{}'", LAYOUT_RECORD, name);
        let positions: Vec<_> = node
            .nodes_named("POSITION")
            .map(|p| ModelPositionData::from_config(p, &context))
            .collect();
        if positions.is_empty() {
            warn!("{}: no POSITION records", context);
        }
        Self {
            title: read_string(node, "title").unwrap_or_else(|| name.clone()),
            name,
            positions,
        }
    }

    /// Number of positions.
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Mean magnitude of the position scale vectors; 0 for an empty layout.
    pub fn average_scale_magnitude(&self) -> f64 {
        if self.positions.is_empty() {
            warn!("layout '{}' has no positions; average scale is 0", self.name);
            return 0.0;
        }
        let total: f64 = self.positions.iter().map(|p| p.scale.norm()).sum();
        total / self.positions.len() as f64
    }
}

/// Layouts indexed by name. Always contains [`DEFAULT_LAYOUT`].
#[derive(Debug, Clone)]
pub struct LayoutCatalog {
    layouts: HashMap<String, Arc<ModelLayout>>,
}

impl Default for LayoutCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCatalog {
    /// A catalog holding only the default layout.
    pub fn new() -> Self {
        let mut layouts = HashMap::new();
        layouts.insert(DEFAULT_LAYOUT.to_string(), Arc::new(ModelLayout::default_layout()));
        Self { layouts }
    }

    /// Rebuild from the `MODEL_LAYOUT` children of `root`. Duplicates are
    /// logged and the first wins; an authored `default` replaces the
    /// built-in one.
    pub fn load(&mut self, root: &ConfigNode) {
        let mut layouts: HashMap<String, Arc<ModelLayout>> = HashMap::new();
        for node in root.nodes_named(LAYOUT_RECORD) {
            let layout = ModelLayout::from_config(node);
            if layout.name.is_empty() {
                warn!("{} without a name skipped", LAYOUT_RECORD);
                continue;
            }
            match layouts.entry(layout.name.clone()) {
                Entry::Occupied(_) => warn!("duplicate model layout '{}' ignored", layout.name),
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(layout));
                }
            }
        }
        layouts
            .entry(DEFAULT_LAYOUT.to_string())
            .or_insert_with(|| Arc::new(ModelLayout::default_layout()));
        debug!(layouts = layouts.len(), "model layout catalog loaded");
        self.layouts = layouts;
    }

    /// Look up a layout without fallback.
    pub fn get(&self, name: &str) -> Option<Arc<ModelLayout>> {
        self.layouts.get(name).cloned()
    }

    /// Look up a layout that must exist.
    pub fn require(&self, name: &str) -> Result<Arc<ModelLayout>> {
        self.get(name)
            .ok_or_else(|| ModelError::UnknownLayout(name.to_string()))
    }

    /// Look up a layout; unknown names log and yield the default layout.
    pub fn find(&self, name: &str) -> Arc<ModelLayout> {
        self.get(name).unwrap_or_else(|| {
            warn!("model layout '{}' not found, using '{}'", name, DEFAULT_LAYOUT);
            self.default_layout()
        })
    }

    /// Look up several layouts, preserving order. Unknown names are logged
    /// and skipped.
    pub fn find_many<S: AsRef<str>>(&self, names: &[S]) -> Vec<Arc<ModelLayout>> {
        names
            .iter()
            .filter_map(|n| {
                let found = self.get(n.as_ref());
                if found.is_none() {
                    warn!("model layout '{}' not found", n.as_ref());
                }
                found
            })
            .collect()
    }

    /// The default layout.
    pub fn default_layout(&self) -> Arc<ModelLayout> {
        self.layouts
            .get(DEFAULT_LAYOUT)
            .cloned()
            .unwrap_or_else(|| Arc::new(ModelLayout::default_layout()))
    }

    /// Number of layouts, including the default.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Always false; the default layout is always present.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Layout names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.layouts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// One definition together with the layouts a slot allows for it.
#[derive(Debug, Clone)]
pub struct ModelDefinitionLayoutOptions {
    /// The definition.
    pub definition: Arc<ModelDefinition>,
    layouts: Vec<Arc<ModelLayout>>,
}

impl ModelDefinitionLayoutOptions {
    /// Pair a definition with its layouts. At least one layout is required.
    pub fn new(definition: Arc<ModelDefinition>, layouts: Vec<Arc<ModelLayout>>) -> Result<Self> {
        if layouts.is_empty() {
            return Err(ModelError::NoLayouts(definition.name.clone()));
        }
        Ok(Self {
            definition,
            layouts,
        })
    }

    /// Pair a definition with only the built-in default layout.
    pub fn single(definition: Arc<ModelDefinition>) -> Self {
        Self {
            definition,
            layouts: vec![Arc::new(ModelLayout::default_layout())],
        }
    }

    /// Resolve the `MODEL { model = ..., layout = ... }` children of `node`.
    ///
    /// Usages without `layout` entries get the default layout. Unknown
    /// models and usages whose layouts all fail to resolve are logged and
    /// skipped.
    pub fn from_records(
        definitions: &DefinitionCatalog,
        layouts: &LayoutCatalog,
        node: &ConfigNode,
    ) -> Vec<Self> {
        let mut out = Vec::new();
        for usage in node.nodes_named(USAGE_RECORD) {
            let Some(model) = read_string(usage, "model") else {
                warn!("{} record without 'model' skipped", USAGE_RECORD);
                continue;
            };
            let Some(definition) = definitions.get(&model) else {
                warn!("model definition '{}' not found", model);
                continue;
            };
            let mut names = read_strings(usage, "layout");
            if names.is_empty() {
                names.push(DEFAULT_LAYOUT.to_string());
            }
            match Self::new(definition, layouts.find_many(&names)) {
                Ok(options) => out.push(options),
                Err(e) => warn!("{}", e),
            }
        }
        out
    }

    /// Definition name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Supported layouts, in authored order.
    pub fn layouts(&self) -> &[Arc<ModelLayout>] {
        &self.layouts
    }

    /// Whether `name` is one of the supported layouts.
    pub fn is_valid_layout(&self, name: &str) -> bool {
        self.layouts.iter().any(|l| l.name == name)
    }

    /// Supported layout by name.
    pub fn layout(&self, name: &str) -> Option<&Arc<ModelLayout>> {
        self.layouts.iter().find(|l| l.name == name)
    }

    /// The first supported layout.
    pub fn default_layout(&self) -> &Arc<ModelLayout> {
        &self.layouts[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RECORDS: &str = r#"
MODEL_LAYOUT
{
    name = quad
    title = Four
    POSITION { position = 1,0,0 }
    POSITION { position = -1,0,0 }
    POSITION { position = 0,0,1 }
    POSITION
    {
        position = 0,0,-1
        rotation = 0,90,0
        scale = 2,2,2
    }
}
MODEL_LAYOUT
{
    name = quad
}
MODEL_LAYOUT
{
    name = empty
}
MODEL_DEFINITION
{
    name = engine
}
MODEL
{
    model = engine
    layout = quad
    layout = missing
}
MODEL
{
    model = engine
}
MODEL
{
    model = ghost
}
MODEL
{
    model = engine
    layout = missing
}
"#;

    fn load() -> (DefinitionCatalog, LayoutCatalog, ConfigNode) {
        let root = partkit_cfg::parse(RECORDS).unwrap();
        let mut defs = DefinitionCatalog::new();
        defs.load(&root);
        let mut layouts = LayoutCatalog::new();
        layouts.load(&root);
        (defs, layouts, root)
    }

    #[test]
    fn catalog_always_has_default() {
        let (_, layouts, _) = load();
        assert_eq!(layouts.names(), vec!["default", "empty", "quad"]);
        assert_eq!(layouts.get("quad").unwrap().position_count(), 4);
        assert_eq!(layouts.find("nope").name, DEFAULT_LAYOUT);
        assert_eq!(layouts.require("quad").unwrap().name, "quad");
        assert!(matches!(layouts.require("nope"), Err(ModelError::UnknownLayout(_))));
        assert_eq!(LayoutCatalog::new().len(), 1);
    }

    #[test]
    fn average_scale_magnitude() {
        let (_, layouts, _) = load();
        let quad = layouts.find("quad");
        let unit = 3f64.sqrt();
        assert_relative_eq!(
            quad.average_scale_magnitude(),
            (3.0 * unit + 2.0 * unit) / 4.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(layouts.find("empty").average_scale_magnitude(), 0.0);
        assert_relative_eq!(
            ModelLayout::default_layout().average_scale_magnitude(),
            unit,
            epsilon = 1e-12
        );
    }

    #[test]
    fn options_require_a_layout() {
        let (defs, _, _) = load();
        let engine = defs.get("engine").unwrap();
        assert!(matches!(
            ModelDefinitionLayoutOptions::new(engine.clone(), Vec::new()),
            Err(ModelError::NoLayouts(name)) if name == "engine"
        ));
        let single = ModelDefinitionLayoutOptions::single(engine);
        assert!(single.is_valid_layout(DEFAULT_LAYOUT));
        assert_eq!(single.default_layout().name, DEFAULT_LAYOUT);
    }

    #[test]
    fn usage_records_resolve() {
        let (defs, layouts, root) = load();
        let options = ModelDefinitionLayoutOptions::from_records(&defs, &layouts, &root);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].layouts().len(), 1);
        assert!(options[0].is_valid_layout("quad"));
        assert!(!options[0].is_valid_layout(DEFAULT_LAYOUT));
        assert_eq!(options[1].default_layout().name, DEFAULT_LAYOUT);
    }

    #[test]
    fn position_transform_scales_offset() {
        let p = ModelPositionData {
            position: Vec3::new(1.0, 2.0, 0.0),
            ..Default::default()
        };
        let t = p.local_transform(2.0, 3.0, 0.5);
        assert_relative_eq!(t.position.x, 2.0);
        assert_relative_eq!(t.position.y, 6.5);
    }
}
