//! Immutable model definitions parsed from `MODEL_DEFINITION` records.

use crate::attach::{AttachNodeBaseData, NODE_DISABLED};
use crate::compound::CompoundModelData;
use crate::fields::{read_f64, read_string, read_strings, read_vec3};
use crate::orientation::ModelOrientation;
use crate::profile::is_subset;
use crate::recolor::TextureSet;
use partkit_cfg::ConfigNode;
use partkit_math::Vec3;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Record name for model definitions.
pub const DEFINITION_RECORD: &str = "MODEL_DEFINITION";

/// A geometry asset to clone into the model, with local edits.
#[derive(Debug, Clone, PartialEq)]
pub struct SubModelEntry {
    /// Source asset name.
    pub model_name: String,
    /// Mesh names to keep; empty keeps everything.
    pub keep_meshes: Vec<String>,
    /// `(old, new)` node renames applied after cloning.
    pub renames: Vec<(String, String)>,
    /// Name of an already-instantiated node to parent under.
    pub parent: Option<String>,
    /// Local position.
    pub position: Vec3,
    /// Local rotation, Euler degrees.
    pub rotation: Vec3,
    /// Local scale.
    pub scale: Vec3,
}

impl SubModelEntry {
    /// An entry that clones `model_name` with an identity transform.
    pub fn whole(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            keep_meshes: Vec::new(),
            renames: Vec::new(),
            parent: None,
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::repeat(1.0),
        }
    }

    fn from_config(node: &ConfigNode, context: &str) -> Option<Self> {
        let Some(model_name) = read_string(node, "modelName") else {
            warn!("{}: SUBMODEL without modelName skipped", context);
            return None;
        };
        let renames = node
            .values_of("rename")
            .into_iter()
            .filter_map(|raw| match raw.split_once(',') {
                Some((old, new)) => Some((old.trim().to_string(), new.trim().to_string())),
                None => {
                    warn!("{}: rename '{}' is not 'old,new'", context, raw);
                    None
                }
            })
            .collect();
        Some(Self {
            keep_meshes: read_strings(node, "transform"),
            renames,
            parent: read_string(node, "parent"),
            position: read_vec3(node, "position", Vec3::zeros(), context),
            rotation: read_vec3(node, "rotation", Vec3::zeros(), context),
            scale: read_vec3(node, "scale", Vec3::repeat(1.0), context),
            model_name,
        })
    }
}

/// A set of meshes combined into one renderable.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeGroup {
    /// Node to place the merged mesh under; the model root when absent.
    pub parent: Option<String>,
    /// Name of the merged renderable.
    pub target: String,
    /// Names of meshes to merge.
    pub meshes: Vec<String>,
}

impl MergeGroup {
    fn from_config(node: &ConfigNode, context: &str) -> Option<Self> {
        let Some(target) = read_string(node, "target") else {
            warn!("{}: MERGEDMODELS without target skipped", context);
            return None;
        };
        Some(Self {
            parent: read_string(node, "parent"),
            target,
            meshes: read_strings(node, "mesh"),
        })
    }
}

/// Records consumed by external modules (animation, RCS, engines, fairings,
/// solar panels, constraints). Carried verbatim.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AncillaryData {
    /// `ANIMATIONDATA` records.
    pub animation: Vec<ConfigNode>,
    /// `RCSDATA` records (with their `RCSPOSITION` children).
    pub rcs: Vec<ConfigNode>,
    /// `ENGINE_THRUST` records.
    pub engine_thrust: Vec<ConfigNode>,
    /// `ENGINE_TRANSFORM` records.
    pub engine_transform: Vec<ConfigNode>,
    /// `FAIRINGDATA` records.
    pub fairing: Vec<ConfigNode>,
    /// `SOLARDATA` records (with their `SOLARPOSITION` children).
    pub solar: Vec<ConfigNode>,
    /// `CONSTRAINT` records.
    pub constraint: Vec<ConfigNode>,
}

impl AncillaryData {
    fn from_config(node: &ConfigNode) -> Self {
        let take = |name: &str| node.nodes_named(name).cloned().collect::<Vec<_>>();
        Self {
            animation: take("ANIMATIONDATA"),
            rcs: take("RCSDATA"),
            engine_thrust: take("ENGINE_THRUST"),
            engine_transform: take("ENGINE_TRANSFORM"),
            fairing: take("FAIRINGDATA"),
            solar: take("SOLARDATA"),
            constraint: take("CONSTRAINT"),
        }
    }

    /// Whether no ancillary records were authored.
    pub fn is_empty(&self) -> bool {
        self.animation.is_empty()
            && self.rcs.is_empty()
            && self.engine_thrust.is_empty()
            && self.engine_transform.is_empty()
            && self.fairing.is_empty()
            && self.solar.is_empty()
            && self.constraint.is_empty()
    }
}

/// Authored template for one piece of mountable geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    /// Unique name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Description text.
    pub description: String,
    /// Primary geometry asset, when authored without `SUBMODEL` records.
    pub model_name: Option<String>,
    /// Upgrade/tech gate, passed through.
    pub upgrade_unlock: Option<String>,
    /// Height at scale 1.
    pub height: f64,
    /// Reference diameter at scale 1.
    pub diameter: f64,
    /// Diameter of the upper end at scale 1.
    pub upper_diameter: f64,
    /// Diameter of the lower end at scale 1.
    pub lower_diameter: f64,
    /// Lower bound on vertical/horizontal scale ratio.
    pub min_vertical_scale: f64,
    /// Upper bound on vertical/horizontal scale ratio.
    pub max_vertical_scale: f64,
    /// Base internal volume.
    pub volume: f64,
    /// Base mass.
    pub mass: f64,
    /// Base cost.
    pub cost: f64,
    /// Which end sits at the local origin.
    pub orientation: ModelOrientation,
    /// Axis for the half-turn applied when used in the opposite orientation.
    pub invert_axis: Vec3,
    /// Profiles presented at the upper end.
    pub upper_profiles: Vec<String>,
    /// Profiles presented at the lower end.
    pub lower_profiles: Vec<String>,
    /// Profiles accepted from a model mated above.
    pub compatible_upper_profiles: Vec<String>,
    /// Profiles accepted from a model mated below.
    pub compatible_lower_profiles: Vec<String>,
    /// Upper attach node; `None` when disabled.
    pub top_node: Option<AttachNodeBaseData>,
    /// Lower attach node; `None` when disabled.
    pub bottom_node: Option<AttachNodeBaseData>,
    /// Body attach nodes, in authored order.
    pub body_nodes: Vec<AttachNodeBaseData>,
    /// Radial surface-attach node.
    pub surface_node: AttachNodeBaseData,
    /// Geometry assets to clone.
    pub sub_models: Vec<SubModelEntry>,
    /// Mesh merge groups.
    pub merge_groups: Vec<MergeGroup>,
    /// Compound segment data, when the model stretches non-uniformly.
    pub compound: Option<CompoundModelData>,
    /// Material variants.
    pub texture_sets: Vec<TextureSet>,
    /// Name of the default texture set.
    pub default_texture_set: Option<String>,
    /// Pass-through records for external modules.
    pub ancillary: AncillaryData,
}

impl ModelDefinition {
    /// Parse a `MODEL_DEFINITION` record. Shared `textureSet = name`
    /// references resolve against `shared_sets`.
    ///
    /// Problems inside the record are logged and replaced by defaults; the
    /// result is always usable.
    pub fn from_config(node: &ConfigNode, shared_sets: &HashMap<String, Arc<TextureSet>>) -> Self {
        let name = read_string(node, "name").unwrap_or_default();
        let ctx = format!("{} '{}'", DEFINITION_RECORD, name);

        let height = positive(read_f64(node, "height", 1.0, &ctx), "height", &ctx);
        let diameter = positive(read_f64(node, "diameter", 1.0, &ctx), "diameter", &ctx);
        let mut min_vertical_scale = positive(
            read_f64(node, "minVerticalScale", 1.0, &ctx),
            "minVerticalScale",
            &ctx,
        );
        let mut max_vertical_scale = positive(
            read_f64(node, "maxVerticalScale", 1.0, &ctx),
            "maxVerticalScale",
            &ctx,
        );
        if min_vertical_scale > max_vertical_scale {
            warn!(
                "{}: minVerticalScale {} exceeds maxVerticalScale {}, swapping",
                ctx, min_vertical_scale, max_vertical_scale
            );
            std::mem::swap(&mut min_vertical_scale, &mut max_vertical_scale);
        }
        let orientation = node
            .value("orientation")
            .map(|raw| ModelOrientation::parse_or_default(raw, &ctx))
            .unwrap_or_default();

        let top_default = AttachNodeBaseData::default_top(height, diameter, orientation);
        let bottom_default = AttachNodeBaseData::default_bottom(height, diameter, orientation);
        let surface_default = AttachNodeBaseData::default_surface(height, diameter, orientation);
        let end_node = |key: &str, default: AttachNodeBaseData| match node.value(key) {
            Some(raw) if raw.trim().eq_ignore_ascii_case(NODE_DISABLED) => None,
            Some(raw) => Some(AttachNodeBaseData::parse_or(raw, default, &ctx)),
            None => Some(default),
        };
        let body_nodes = node
            .values_of("bodyNode")
            .into_iter()
            .filter_map(|raw| {
                let parsed = AttachNodeBaseData::parse(raw, top_default.size);
                if parsed.is_none() {
                    warn!("{}: malformed body node '{}' skipped", ctx, raw);
                }
                parsed
            })
            .collect();

        let model_name = read_string(node, "modelName");
        let mut sub_models: Vec<SubModelEntry> = node
            .nodes_named("SUBMODEL")
            .filter_map(|n| SubModelEntry::from_config(n, &ctx))
            .collect();
        if sub_models.is_empty() {
            match &model_name {
                Some(model) => sub_models.push(SubModelEntry::whole(model.clone())),
                None => warn!("{}: no modelName or SUBMODEL; geometry will be empty", ctx),
            }
        }

        let (texture_sets, default_texture_set) = parse_texture_sets(node, shared_sets, &ctx);

        Self {
            title: read_string(node, "title").unwrap_or_else(|| name.clone()),
            description: read_string(node, "description").unwrap_or_default(),
            model_name,
            upgrade_unlock: read_string(node, "upgradeUnlock"),
            height,
            diameter,
            upper_diameter: positive(
                read_f64(node, "upperDiameter", diameter, &ctx),
                "upperDiameter",
                &ctx,
            ),
            lower_diameter: positive(
                read_f64(node, "lowerDiameter", diameter, &ctx),
                "lowerDiameter",
                &ctx,
            ),
            min_vertical_scale,
            max_vertical_scale,
            volume: read_f64(node, "volume", 0.0, &ctx),
            mass: read_f64(node, "mass", 0.0, &ctx),
            cost: read_f64(node, "cost", 0.0, &ctx),
            orientation,
            invert_axis: read_vec3(node, "invertAxis", Vec3::z(), &ctx),
            upper_profiles: read_strings(node, "upperProfile"),
            lower_profiles: read_strings(node, "lowerProfile"),
            compatible_upper_profiles: read_strings(node, "compatibleUpperProfile"),
            compatible_lower_profiles: read_strings(node, "compatibleLowerProfile"),
            top_node: end_node("topNode", top_default),
            bottom_node: end_node("bottomNode", bottom_default),
            body_nodes,
            surface_node: node
                .value("surface")
                .map(|raw| AttachNodeBaseData::parse_or(raw, surface_default, &ctx))
                .unwrap_or(surface_default),
            sub_models,
            merge_groups: node
                .nodes_named("MERGEDMODELS")
                .filter_map(|n| MergeGroup::from_config(n, &ctx))
                .collect(),
            compound: node
                .node("COMPOUNDMODEL")
                .map(|n| CompoundModelData::from_config(n, &ctx)),
            texture_sets,
            default_texture_set,
            ancillary: AncillaryData::from_config(node),
            name,
        }
    }

    /// Whether the geometry must be turned end-over-end for `use_orientation`.
    pub fn should_invert(&self, use_orientation: ModelOrientation) -> bool {
        self.orientation.inverts_for(use_orientation)
    }

    /// Profiles presented at the upper end when used as `use_orientation`.
    pub fn presented_upper_profiles(&self, use_orientation: ModelOrientation) -> &[String] {
        if self.should_invert(use_orientation) {
            &self.lower_profiles
        } else {
            &self.upper_profiles
        }
    }

    /// Profiles presented at the lower end when used as `use_orientation`.
    pub fn presented_lower_profiles(&self, use_orientation: ModelOrientation) -> &[String] {
        if self.should_invert(use_orientation) {
            &self.upper_profiles
        } else {
            &self.lower_profiles
        }
    }

    /// Profiles accepted at the upper end when used as `use_orientation`.
    pub fn accepted_upper_profiles(&self, use_orientation: ModelOrientation) -> &[String] {
        if self.should_invert(use_orientation) {
            &self.compatible_lower_profiles
        } else {
            &self.compatible_upper_profiles
        }
    }

    /// Profiles accepted at the lower end when used as `use_orientation`.
    pub fn accepted_lower_profiles(&self, use_orientation: ModelOrientation) -> &[String] {
        if self.should_invert(use_orientation) {
            &self.compatible_upper_profiles
        } else {
            &self.compatible_lower_profiles
        }
    }

    /// Whether a neighbour presenting `profiles` may mate above this model
    /// when this model is used as `orientation`.
    pub fn is_valid_upper_profile(&self, profiles: &[String], orientation: ModelOrientation) -> bool {
        is_subset(profiles, self.accepted_upper_profiles(orientation))
    }

    /// Whether a neighbour presenting `profiles` may mate below this model
    /// when this model is used as `orientation`.
    pub fn is_valid_lower_profile(&self, profiles: &[String], orientation: ModelOrientation) -> bool {
        is_subset(profiles, self.accepted_lower_profiles(orientation))
    }

    /// Unscaled diameter of the upper end when used as `use_orientation`.
    pub fn upper_diameter_for(&self, use_orientation: ModelOrientation) -> f64 {
        if self.should_invert(use_orientation) {
            self.lower_diameter
        } else {
            self.upper_diameter
        }
    }

    /// Unscaled diameter of the lower end when used as `use_orientation`.
    pub fn lower_diameter_for(&self, use_orientation: ModelOrientation) -> f64 {
        if self.should_invert(use_orientation) {
            self.upper_diameter
        } else {
            self.lower_diameter
        }
    }

    /// Upper end node as seen in `use_orientation` (authored bottom when inverted).
    pub fn upper_node_for(&self, use_orientation: ModelOrientation) -> Option<&AttachNodeBaseData> {
        if self.should_invert(use_orientation) {
            self.bottom_node.as_ref()
        } else {
            self.top_node.as_ref()
        }
    }

    /// Lower end node as seen in `use_orientation` (authored top when inverted).
    pub fn lower_node_for(&self, use_orientation: ModelOrientation) -> Option<&AttachNodeBaseData> {
        if self.should_invert(use_orientation) {
            self.top_node.as_ref()
        } else {
            self.bottom_node.as_ref()
        }
    }

    /// Texture set by name.
    pub fn texture_set(&self, name: &str) -> Option<&TextureSet> {
        self.texture_sets.iter().find(|s| s.name == name)
    }

    /// The declared default texture set, else the first one.
    pub fn default_texture_set(&self) -> Option<&TextureSet> {
        self.default_texture_set
            .as_deref()
            .and_then(|n| self.texture_set(n))
            .or_else(|| self.texture_sets.first())
    }

    /// Whether the definition instantiates no geometry.
    pub fn has_geometry(&self) -> bool {
        !self.sub_models.is_empty()
    }
}

fn positive(value: f64, key: &str, context: &str) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        warn!("{}: {} must be positive (got {}), using 1", context, key, value);
        1.0
    }
}

fn parse_texture_sets(
    node: &ConfigNode,
    shared: &HashMap<String, Arc<TextureSet>>,
    context: &str,
) -> (Vec<TextureSet>, Option<String>) {
    let mut sets: Vec<TextureSet> = Vec::new();
    for name in read_strings(node, "textureSet") {
        match shared.get(&name) {
            Some(set) => sets.push(set.as_ref().clone()),
            None => warn!("{}: texture set '{}' not found", context, name),
        }
    }
    for inline in node.nodes_named("TEXTURESET") {
        sets.push(TextureSet::from_config(inline));
    }
    let default = read_string(node, "defaultTextureSet").or_else(|| sets.first().map(|s| s.name.clone()));
    if let Some(d) = &default {
        if !sets.iter().any(|s| &s.name == d) {
            warn!("{}: default texture set '{}' is not in the set list", context, d);
        }
    }
    (sets, default)
}
