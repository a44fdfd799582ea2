//! The per-slot model instance.
//!
//! A [`ModelModule`] binds one definition (chosen from the slot's option
//! list), one layout, a scale, an origin and a texture selection to a
//! mounting slot. It owns the logical state; the scene and the attach nodes
//! are driven through [`SceneHost`] and [`AttachNodeHost`].
//!
//! Scene structure per layout position:
//!
//! ```text
//! <slot>
//! └── position-N        layout offset, rotation and scale
//!     └── model         inversion half-turn, (h, v, h) scale
//!         └── <sub-model clones, merged meshes>
//! ```
//!
//! Compound definitions keep the `model` node at unit scale and drive their
//! named segments individually.

use crate::attach::AttachNodeBaseData;
use crate::definition::ModelDefinition;
use crate::error::{ModelError, Result};
use crate::layout::{ModelDefinitionLayoutOptions, ModelLayout};
use crate::nodes::{AttachNodeHost, AttachPoint};
use crate::orientation::ModelOrientation;
use crate::profile::is_subset;
use crate::recolor::{RecoloringData, TextureState};
use crate::scene::{NodeId, SceneHost};
use crate::settings::{EngineSettings, ScalePowers};
use partkit_math::{half_turn, LocalTransform, Rotation, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of a [`ModelModule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Logical state only; no geometry exists.
    Uninitialized,
    /// Geometry is instantiated and kept in sync.
    Ready,
}

/// Persisted per-slot state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Selected definition.
    pub definition: String,
    /// Selected layout.
    pub layout: String,
    /// Selected texture set.
    #[serde(default)]
    pub texture_set: String,
    /// Encoded user colours, when customised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<String>,
    /// Horizontal scale.
    pub horizontal_scale: f64,
    /// Vertical scale.
    pub vertical_scale: f64,
    /// Slot origin along the mounting axis.
    #[serde(default)]
    pub origin: f64,
}

impl ModuleState {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Copy)]
struct PositionNodes {
    root: NodeId,
    model: NodeId,
}

/// A live model bound to one mounting slot.
#[derive(Debug, Clone)]
pub struct ModelModule {
    slot_name: String,
    orientation: ModelOrientation,
    options: Vec<ModelDefinitionLayoutOptions>,
    powers: ScalePowers,
    current: usize,
    layout: Arc<ModelLayout>,
    horizontal_scale: f64,
    vertical_scale: f64,
    origin: f64,
    texture: TextureState,
    status: ModuleStatus,
    root: Option<NodeId>,
    positions: Vec<PositionNodes>,
}

impl ModelModule {
    /// Create an uninitialized module. The first option is selected, with
    /// the settings' default layout when it supports it.
    pub fn new(
        slot_name: impl Into<String>,
        orientation: ModelOrientation,
        options: Vec<ModelDefinitionLayoutOptions>,
        settings: &EngineSettings,
    ) -> Result<Self> {
        let slot_name = slot_name.into();
        let Some(first) = options.first() else {
            return Err(ModelError::NoDefinitions(slot_name));
        };
        let layout = first
            .layout(&settings.default_layout)
            .unwrap_or_else(|| first.default_layout())
            .clone();
        let mut module = Self {
            slot_name,
            orientation,
            options,
            powers: settings.scale_powers,
            current: 0,
            layout,
            horizontal_scale: 1.0,
            vertical_scale: 1.0,
            origin: 0.0,
            texture: TextureState::default(),
            status: ModuleStatus::Uninitialized,
            root: None,
            positions: Vec::new(),
        };
        module.set_scale(1.0, 1.0);
        let def = Arc::clone(&module.options[0].definition);
        module.texture.select("", &def);
        Ok(module)
    }

    // ---- accessors ----

    /// Slot name; also the name of the slot's scene node.
    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    /// Orientation the slot uses the model in.
    pub fn orientation(&self) -> ModelOrientation {
        self.orientation
    }

    /// Lifecycle state.
    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    /// Definitions this slot may select.
    pub fn options(&self) -> &[ModelDefinitionLayoutOptions] {
        &self.options
    }

    /// The current definition.
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.options[self.current].definition
    }

    /// The current layout.
    pub fn layout(&self) -> &Arc<ModelLayout> {
        &self.layout
    }

    /// Horizontal scale.
    pub fn horizontal_scale(&self) -> f64 {
        self.horizontal_scale
    }

    /// Vertical scale.
    pub fn vertical_scale(&self) -> f64 {
        self.vertical_scale
    }

    /// Slot origin along the mounting axis.
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Scene node of the slot, once set up.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Name of the selected texture set.
    pub fn texture_set(&self) -> &str {
        &self.texture.current
    }

    /// Current mask colours.
    pub fn colors(&self) -> RecoloringData {
        self.texture.colors
    }

    // ---- lifecycle ----

    /// Instantiate geometry under `parent` and mark the module ready.
    /// Calling it again rebuilds from scratch.
    pub fn setup_model(&mut self, scene: &mut dyn SceneHost, parent: NodeId) {
        if let Some(old) = self.root.take() {
            scene.destroy(old);
            self.positions.clear();
        }
        self.root = Some(scene.create_empty(&self.slot_name, Some(parent)));
        self.status = ModuleStatus::Ready;
        self.rebuild(scene);
        info!(
            slot = %self.slot_name,
            model = %self.definition().name,
            layout = %self.layout.name,
            "model module ready"
        );
    }

    /// Tear down and re-instantiate every layout position.
    pub fn rebuild(&mut self, scene: &mut dyn SceneHost) {
        if self.status != ModuleStatus::Ready {
            return;
        }
        for p in self.positions.drain(..) {
            scene.destroy(p.root);
        }
        let count = self.layout.position_count();
        for index in 0..count {
            if let Some(nodes) = self.instantiate_position(scene, index) {
                self.positions.push(nodes);
            }
        }
        debug!(slot = %self.slot_name, positions = self.positions.len(), "rebuilt model geometry");
        self.update_model_transforms(scene);
        self.apply_textures(scene);
    }

    fn instantiate_position(&self, scene: &mut dyn SceneHost, index: usize) -> Option<PositionNodes> {
        let slot = self.root?;
        let def = self.definition();
        let root = scene.create_empty(&format!("position-{}", index), Some(slot));
        let model = scene.create_empty("model", Some(root));

        for entry in &def.sub_models {
            let parent = match &entry.parent {
                Some(name) => match scene.find_descendants(model, name).first() {
                    Some(found) => *found,
                    None => {
                        warn!(
                            "{}: parent '{}' for '{}' not found, using model root",
                            def.name, name, entry.model_name
                        );
                        model
                    }
                },
                None => model,
            };
            let Some(clone) = scene.clone_asset(&entry.model_name, parent) else {
                warn!("{}: geometry asset '{}' not found", def.name, entry.model_name);
                continue;
            };
            scene.set_local_transform(
                clone,
                LocalTransform::from_parts(entry.position, entry.rotation, entry.scale),
            );
            if !entry.keep_meshes.is_empty() {
                for node in scene.descendants(clone) {
                    if node == clone || !scene.is_mesh(node) {
                        continue;
                    }
                    let keep = scene
                        .name(node)
                        .is_some_and(|n| entry.keep_meshes.iter().any(|k| *k == n));
                    if !keep {
                        scene.destroy(node);
                    }
                }
            }
            for (old, new) in &entry.renames {
                for node in scene.find_descendants(clone, old) {
                    scene.rename(node, new);
                }
            }
        }

        for group in &def.merge_groups {
            let parent = group
                .parent
                .as_deref()
                .and_then(|p| scene.find_descendants(model, p).first().copied())
                .unwrap_or(model);
            let sources: Vec<NodeId> = group
                .meshes
                .iter()
                .flat_map(|m| scene.find_descendants(model, m))
                .collect();
            if scene.merge_meshes(&sources, &group.target, parent).is_none() {
                warn!("{}: nothing to merge into '{}'", def.name, group.target);
            }
        }
        Some(PositionNodes { root, model })
    }

    // ---- selection ----

    /// Switch to the definition named `name`.
    ///
    /// An unknown name is logged and the first option is used instead; the
    /// return value is `false` in that case. The layout falls back to the
    /// new definition's default when the current one is unsupported, the
    /// scale is re-clamped, and the texture selection is revalidated.
    /// Ready modules are rebuilt.
    pub fn select_definition(&mut self, scene: &mut dyn SceneHost, name: &str) -> bool {
        let found = self.switch_definition(name);
        self.rebuild(scene);
        found
    }

    fn switch_definition(&mut self, name: &str) -> bool {
        let (index, found) = match self.options.iter().position(|o| o.name() == name) {
            Some(i) => (i, true),
            None => {
                warn!(
                    "{}: model '{}' is not an option, using '{}'",
                    self.slot_name,
                    name,
                    self.options[0].name()
                );
                (0, false)
            }
        };
        self.current = index;
        let options = &self.options[index];
        if !options.is_valid_layout(&self.layout.name) {
            let fallback = options.default_layout().clone();
            debug!(
                "{}: layout '{}' unsupported by '{}', using '{}'",
                self.slot_name,
                self.layout.name,
                options.name(),
                fallback.name
            );
            self.layout = fallback;
        }
        let def = Arc::clone(&options.definition);
        self.set_scale(self.horizontal_scale, self.vertical_scale);
        let current = self.texture.current.clone();
        self.texture.select(&current, &def);
        found
    }

    /// Switch layouts. Unsupported names log and use the definition's
    /// default layout. Existing positions keep their geometry; surplus
    /// positions are destroyed and new ones instantiated.
    pub fn select_layout(&mut self, scene: &mut dyn SceneHost, name: &str) -> bool {
        let found = self.switch_layout(name);
        if self.status == ModuleStatus::Ready {
            let wanted = self.layout.position_count();
            while self.positions.len() > wanted {
                if let Some(p) = self.positions.pop() {
                    scene.destroy(p.root);
                }
            }
            for index in self.positions.len()..wanted {
                if let Some(nodes) = self.instantiate_position(scene, index) {
                    self.positions.push(nodes);
                }
            }
            self.update_model_transforms(scene);
            self.apply_textures(scene);
        }
        found
    }

    fn switch_layout(&mut self, name: &str) -> bool {
        let options = &self.options[self.current];
        match options.layout(name) {
            Some(layout) => {
                self.layout = layout.clone();
                true
            }
            None => {
                warn!(
                    "{}: layout '{}' is not valid for '{}', using '{}'",
                    self.slot_name,
                    name,
                    options.name(),
                    options.default_layout().name
                );
                self.layout = options.default_layout().clone();
                false
            }
        }
    }

    /// Select a texture set (unknown names fall back to the definition's
    /// default) and apply it.
    pub fn select_texture_set(&mut self, scene: &mut dyn SceneHost, name: &str) {
        let def = Arc::clone(self.definition());
        self.texture.select(name, &def);
        self.apply_textures(scene);
    }

    /// Override the mask colours and apply them.
    pub fn set_colors(&mut self, scene: &mut dyn SceneHost, colors: RecoloringData) {
        self.texture.set_colors(colors);
        self.apply_textures(scene);
    }

    fn apply_textures(&self, scene: &mut dyn SceneHost) {
        if self.status != ModuleStatus::Ready {
            return;
        }
        let Some(set) = self.definition().texture_set(&self.texture.current) else {
            return;
        };
        for p in &self.positions {
            set.apply(scene, p.model, &self.texture.colors);
        }
    }

    // ---- scale and position ----

    /// Set the scales. `vertical` is clamped into
    /// `[horizontal * min_vertical_scale, horizontal * max_vertical_scale]`.
    /// Non-positive horizontal scales are rejected.
    pub fn set_scale(&mut self, horizontal: f64, vertical: f64) {
        if !(horizontal > 0.0 && horizontal.is_finite()) {
            warn!("{}: ignoring horizontal scale {}", self.slot_name, horizontal);
            return;
        }
        let def = self.definition();
        let min = horizontal * def.min_vertical_scale;
        let max = horizontal * def.max_vertical_scale;
        let clamped = if !vertical.is_finite() {
            min
        } else if min <= max {
            vertical.clamp(min, max)
        } else {
            vertical.max(min)
        };
        self.horizontal_scale = horizontal;
        self.vertical_scale = clamped;
    }

    /// Scale so the reference diameter equals `diameter`, keeping the
    /// vertical/horizontal ratio.
    pub fn set_scale_for_diameter(&mut self, diameter: f64) {
        let base = self.definition().diameter;
        self.scale_keeping_ratio(diameter / base);
    }

    /// Scale to an exact height and diameter.
    pub fn set_scale_for_height_and_diameter(&mut self, height: f64, diameter: f64) {
        let def = self.definition();
        let (h, v) = (diameter / def.diameter, height / def.height);
        self.set_scale(h, v);
    }

    /// Scale so the upper end (as used) has `diameter`.
    pub fn set_scale_for_upper_diameter(&mut self, diameter: f64) {
        let base = self.definition().upper_diameter_for(self.orientation);
        self.scale_keeping_ratio(diameter / base);
    }

    /// Scale so the lower end (as used) has `diameter`.
    pub fn set_scale_for_lower_diameter(&mut self, diameter: f64) {
        let base = self.definition().lower_diameter_for(self.orientation);
        self.scale_keeping_ratio(diameter / base);
    }

    fn scale_keeping_ratio(&mut self, horizontal: f64) {
        let ratio = self.vertical_scale / self.horizontal_scale;
        self.set_scale(horizontal, horizontal * ratio);
    }

    /// Set the slot origin. Transforms update on the next
    /// [`update_model_transforms`](Self::update_model_transforms).
    pub fn set_position(&mut self, origin: f64) {
        self.origin = origin;
    }

    /// Write every position's transforms: layout placement at the scaled
    /// offset plus origin and placement offset, the inversion half-turn,
    /// and either the `(h, v, h)` model scale or the compound segments.
    pub fn update_model_transforms(&self, scene: &mut dyn SceneHost) {
        if self.status != ModuleStatus::Ready {
            return;
        }
        let def = self.definition();
        let (h, v) = (self.horizontal_scale, self.vertical_scale);
        let y_offset = self.origin + self.placement_offset();
        let rotation = if self.should_invert() {
            half_turn(&def.invert_axis)
        } else {
            Rotation::identity()
        };
        let model_scale = if def.compound.is_some() {
            Vec3::repeat(1.0)
        } else {
            Vec3::new(h, v, h)
        };
        let segments = def
            .compound
            .as_ref()
            .map(|c| c.distribute(v * def.height, h, def.orientation.stack_direction()))
            .unwrap_or_default();

        for (nodes, data) in self.positions.iter().zip(&self.layout.positions) {
            scene.set_local_transform(nodes.root, data.local_transform(h, v, y_offset));
            scene.set_local_transform(
                nodes.model,
                LocalTransform {
                    position: Vec3::zeros(),
                    rotation,
                    scale: model_scale,
                },
            );
            for seg in &segments {
                for node in scene.find_descendants(nodes.model, &seg.name) {
                    let mut t = scene.local_transform(node).unwrap_or_default();
                    t.position = seg.position;
                    t.scale = seg.scale;
                    scene.set_local_transform(node, t);
                }
            }
        }
    }

    // ---- derived geometry ----

    /// Whether the geometry is turned end-over-end in this slot.
    pub fn should_invert(&self) -> bool {
        self.definition().should_invert(self.orientation)
    }

    /// `vertical_scale * height`.
    pub fn current_height(&self) -> f64 {
        self.vertical_scale * self.definition().height
    }

    /// `horizontal_scale * diameter`.
    pub fn current_diameter(&self) -> f64 {
        self.horizontal_scale * self.definition().diameter
    }

    /// Scaled diameter of the upper end as used.
    pub fn upper_diameter(&self) -> f64 {
        self.horizontal_scale * self.definition().upper_diameter_for(self.orientation)
    }

    /// Scaled diameter of the lower end as used.
    pub fn lower_diameter(&self) -> f64 {
        self.horizontal_scale * self.definition().lower_diameter_for(self.orientation)
    }

    /// Vertical shift reconciling the authored orientation with the slot's.
    pub fn placement_offset(&self) -> f64 {
        use ModelOrientation::*;
        let half = self.current_height() * 0.5;
        match (self.definition().orientation, self.orientation) {
            (Top, Central) | (Central, Bottom) => -half,
            (Central, Top) | (Bottom, Central) => half,
            _ => 0.0,
        }
    }

    /// Upper extent along the mounting axis.
    pub fn top(&self) -> f64 {
        self.origin + self.current_height() * self.orientation.top_fraction()
    }

    /// Lower extent along the mounting axis.
    pub fn bottom(&self) -> f64 {
        self.top() - self.current_height()
    }

    /// Midpoint along the mounting axis.
    pub fn center(&self) -> f64 {
        self.top() - self.current_height() * 0.5
    }

    /// Number of layout positions.
    pub fn position_count(&self) -> usize {
        self.layout.position_count()
    }

    /// Mean scale magnitude of the current layout.
    pub fn average_layout_scale(&self) -> f64 {
        self.layout.average_scale_magnitude()
    }

    fn scaled_stat(&self, base: f64, power: f64) -> f64 {
        let average = (2.0 * self.horizontal_scale + self.vertical_scale) / 3.0;
        base * average.powf(power) * self.position_count() as f64
    }

    /// Mass of every position at the current scale.
    pub fn module_mass(&self) -> f64 {
        self.scaled_stat(self.definition().mass, self.powers.mass)
    }

    /// Cost of every position at the current scale.
    pub fn module_cost(&self) -> f64 {
        self.scaled_stat(self.definition().cost, self.powers.cost)
    }

    /// Volume of every position at the current scale.
    pub fn module_volume(&self) -> f64 {
        self.scaled_stat(self.definition().volume, self.powers.volume)
    }

    /// Profiles presented at the upper end.
    pub fn upper_profiles(&self) -> &[String] {
        self.definition().presented_upper_profiles(self.orientation)
    }

    /// Profiles presented at the lower end.
    pub fn lower_profiles(&self) -> &[String] {
        self.definition().presented_lower_profiles(self.orientation)
    }

    // ---- attach nodes ----

    /// Place a node descriptor for this instance: scaled, inverted when
    /// needed, and offset to the slot.
    pub fn node_placement(&self, data: &AttachNodeBaseData) -> (Vec3, Vec3, i32) {
        let def = self.definition();
        let invert = self.should_invert().then_some(&def.invert_axis);
        let (mut pos, dir, size) = data.placement(self.horizontal_scale, self.vertical_scale, invert);
        pos.y += self.origin + self.placement_offset();
        (pos, dir, size)
    }

    /// Position the upper end node `name`. A disabled node is destroyed.
    pub fn update_attach_node_top(&self, nodes: &mut dyn AttachNodeHost, name: &str, user_input: bool) {
        match self.definition().upper_node_for(self.orientation) {
            Some(data) => self.place_node(nodes, name, data, user_input),
            None => nodes.destroy_node(name),
        }
    }

    /// Position the lower end node `name`. A disabled node is destroyed.
    pub fn update_attach_node_bottom(&self, nodes: &mut dyn AttachNodeHost, name: &str, user_input: bool) {
        match self.definition().lower_node_for(self.orientation) {
            Some(data) => self.place_node(nodes, name, data, user_input),
            None => nodes.destroy_node(name),
        }
    }

    /// Position body nodes in order. Names beyond the definition's body
    /// node count are destroyed.
    pub fn update_attach_node_body<S: AsRef<str>>(
        &self,
        nodes: &mut dyn AttachNodeHost,
        names: &[S],
        user_input: bool,
    ) {
        let body = &self.definition().body_nodes;
        for (index, name) in names.iter().enumerate() {
            match body.get(index) {
                Some(data) => self.place_node(nodes, name.as_ref(), data, user_input),
                None => nodes.destroy_node(name.as_ref()),
            }
        }
    }

    /// Position the radial surface-attach node.
    pub fn update_surface_attach_node(&self, nodes: &mut dyn AttachNodeHost, name: &str, user_input: bool) {
        let data = self.definition().surface_node;
        self.place_node(nodes, name, &data, user_input);
    }

    fn place_node(
        &self,
        nodes: &mut dyn AttachNodeHost,
        name: &str,
        data: &AttachNodeBaseData,
        user_input: bool,
    ) {
        let (pos, dir, size) = self.node_placement(data);
        match nodes.node(name) {
            Some(existing) => {
                let delta = pos - existing.position;
                nodes.move_node(name, pos, dir, size);
                if user_input && nodes.attached_part(name).is_some() {
                    nodes.translate_attached(name, delta);
                }
            }
            None => nodes.create_node(AttachPoint::new(name, pos, dir, size)),
        }
    }

    // ---- compatibility ----

    /// Whether this slot can switch to `candidate` without removing a node
    /// that has a part mated to it. `upper_node`/`lower_node` name the end
    /// nodes to check; `body_node_names` are the slot's body nodes in order.
    pub fn can_switch_to<S: AsRef<str>>(
        &self,
        candidate: &ModelDefinition,
        nodes: &dyn AttachNodeHost,
        body_node_names: &[S],
        upper_node: Option<&str>,
        lower_node: Option<&str>,
    ) -> bool {
        keeps_occupied_nodes(
            candidate,
            self.orientation,
            nodes,
            body_node_names,
            upper_node,
            lower_node,
        )
    }

    /// Candidates that may be mounted directly above this instance in a
    /// slot using `other_orientation`: the candidate's presented lower
    /// profiles must all be accepted at this instance's upper end, and the
    /// switch must keep every occupied node of that slot (`end_node` is
    /// its far, upper node).
    pub fn valid_upper_models<S: AsRef<str>>(
        &self,
        candidates: &[Arc<ModelDefinition>],
        other_orientation: ModelOrientation,
        nodes: &dyn AttachNodeHost,
        body_node_names: &[S],
        end_node: Option<&str>,
    ) -> Vec<Arc<ModelDefinition>> {
        let accepted = self.definition().accepted_upper_profiles(self.orientation);
        candidates
            .iter()
            .filter(|c| {
                is_subset(c.presented_lower_profiles(other_orientation), accepted)
                    && keeps_occupied_nodes(c, other_orientation, nodes, body_node_names, end_node, None)
            })
            .cloned()
            .collect()
    }

    /// Mirror of [`valid_upper_models`](Self::valid_upper_models) for the
    /// slot below; `end_node` is that slot's far, lower node.
    pub fn valid_lower_models<S: AsRef<str>>(
        &self,
        candidates: &[Arc<ModelDefinition>],
        other_orientation: ModelOrientation,
        nodes: &dyn AttachNodeHost,
        body_node_names: &[S],
        end_node: Option<&str>,
    ) -> Vec<Arc<ModelDefinition>> {
        let accepted = self.definition().accepted_lower_profiles(self.orientation);
        candidates
            .iter()
            .filter(|c| {
                is_subset(c.presented_upper_profiles(other_orientation), accepted)
                    && keeps_occupied_nodes(c, other_orientation, nodes, body_node_names, None, end_node)
            })
            .cloned()
            .collect()
    }

    // ---- persistence ----

    /// Snapshot of the persisted state.
    pub fn state(&self) -> ModuleState {
        ModuleState {
            definition: self.definition().name.clone(),
            layout: self.layout.name.clone(),
            texture_set: self.texture.current.clone(),
            colors: self.texture.persisted_colors(),
            horizontal_scale: self.horizontal_scale,
            vertical_scale: self.vertical_scale,
            origin: self.origin,
        }
    }

    /// Apply persisted state. Invalid names fall back as the selectors do.
    /// A ready module is rebuilt.
    pub fn restore(&mut self, scene: &mut dyn SceneHost, state: &ModuleState) {
        self.restore_logical(state);
        self.rebuild(scene);
    }

    /// Apply persisted state without touching any scene; use before
    /// [`setup_model`](Self::setup_model).
    pub fn restore_logical(&mut self, state: &ModuleState) {
        self.switch_definition(&state.definition);
        self.switch_layout(&state.layout);
        self.set_scale(state.horizontal_scale, state.vertical_scale);
        self.origin = state.origin;
        if let Some(colors) = &state.colors {
            self.texture.restore_colors(colors);
        }
        let def = Arc::clone(self.definition());
        self.texture.select(&state.texture_set, &def);
    }
}

fn keeps_occupied_nodes<S: AsRef<str>>(
    candidate: &ModelDefinition,
    orientation: ModelOrientation,
    nodes: &dyn AttachNodeHost,
    body_node_names: &[S],
    upper_node: Option<&str>,
    lower_node: Option<&str>,
) -> bool {
    let occupied = |name: &str| nodes.attached_part(name).is_some();
    let body_ok = body_node_names
        .iter()
        .enumerate()
        .all(|(i, name)| i < candidate.body_nodes.len() || !occupied(name.as_ref()));
    let upper_ok = upper_node
        .map_or(true, |n| !occupied(n) || candidate.upper_node_for(orientation).is_some());
    let lower_ok = lower_node
        .map_or(true, |n| !occupied(n) || candidate.lower_node_for(orientation).is_some());
    body_ok && upper_ok && lower_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DefinitionCatalog;
    use crate::layout::LayoutCatalog;
    use crate::nodes::AttachNodes;
    use crate::recolor::{encode_colors, Color};
    use crate::scene::{AssetNode, SceneGraph};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    const RECORDS: &str = r#"
MODEL_DEFINITION
{
    name = tank
    height = 4
    diameter = 2.5
    mass = 1
    cost = 100
    volume = 10
    minVerticalScale = 0.5
    maxVerticalScale = 2
    upperProfile = size2
    lowerProfile = size2
    compatibleUpperProfile = size2
    compatibleLowerProfile = size2
    bodyNode = 1.25,2,0,1,0,0
    bodyNode = -1.25,2,0,-1,0,0
    defaultTextureSet = white
    SUBMODEL
    {
        modelName = Assets/Tank
        transform = Body
        rename = Body,TankBody
    }
    TEXTURESET
    {
        name = white
        COLORS
        {
            mainColor = 1,0,0
        }
        MATERIAL
        {
            texture = _MainTex,Textures/white
        }
    }
    TEXTURESET
    {
        name = black
    }
}
MODEL_DEFINITION
{
    name = adapter
    height = 1
    diameter = 5
    upperDiameter = 5
    lowerDiameter = 3
    modelName = Assets/Tank
}
MODEL_DEFINITION
{
    name = stretchy
    height = 4
    maxVerticalScale = 3
    modelName = Assets/Stretchy
    COMPOUNDMODEL
    {
        TRANSFORM
        {
            name = Cap
            height = 1
        }
        TRANSFORM
        {
            name = Body
            height = 3
            canScale = true
        }
    }
    MERGEDMODELS
    {
        target = Bolts
        mesh = Bolt
    }
}
MODEL_DEFINITION
{
    name = cap2
    lowerProfile = size2
}
MODEL_DEFINITION
{
    name = cap1
    lowerProfile = size1
}
MODEL_DEFINITION
{
    name = flipped
    orientation = BOTTOM
    upperProfile = size2
    lowerProfile = size1
}
MODEL_DEFINITION
{
    name = capless
    lowerProfile = size2
    topNode = none
}
MODEL_LAYOUT
{
    name = quad
    POSITION { position = 1,0,0 }
    POSITION { position = -1,0,0 }
    POSITION { position = 0,0,1 }
    POSITION { position = 0,0,-1 }
}
MODEL
{
    model = tank
    layout = default
    layout = quad
}
MODEL
{
    model = adapter
}
MODEL
{
    model = stretchy
}
"#;

    struct Fixture {
        catalog: DefinitionCatalog,
        options: Vec<ModelDefinitionLayoutOptions>,
        scene: SceneGraph,
        parent: NodeId,
    }

    fn fixture() -> Fixture {
        let root = partkit_cfg::parse(RECORDS).unwrap();
        let mut catalog = DefinitionCatalog::new();
        catalog.load(&root);
        let mut layouts = LayoutCatalog::new();
        layouts.load(&root);
        let options = ModelDefinitionLayoutOptions::from_records(&catalog, &layouts, &root);
        assert_eq!(options.len(), 3);

        let mut scene = SceneGraph::new();
        scene.register_asset(
            "Assets/Tank",
            AssetNode::group("Tank", vec![AssetNode::mesh("Body"), AssetNode::mesh("Trim")]),
        );
        scene.register_asset(
            "Assets/Stretchy",
            AssetNode::group(
                "Stretchy",
                vec![
                    AssetNode::mesh("Cap"),
                    AssetNode::mesh("Body"),
                    AssetNode::mesh("Bolt"),
                    AssetNode::mesh("Bolt"),
                ],
            ),
        );
        let parent = scene.create_empty("part", None);
        Fixture {
            catalog,
            options,
            scene,
            parent,
        }
    }

    fn module(f: &Fixture, orientation: ModelOrientation) -> ModelModule {
        ModelModule::new("core", orientation, f.options.clone(), &EngineSettings::default()).unwrap()
    }

    #[test]
    fn empty_options_are_rejected() {
        let err = ModelModule::new("x", ModelOrientation::Top, Vec::new(), &EngineSettings::default());
        assert!(matches!(err, Err(ModelError::NoDefinitions(_))));
    }

    #[test]
    fn setup_clones_filters_and_renames() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        assert_eq!(m.status(), ModuleStatus::Uninitialized);
        m.setup_model(&mut f.scene, f.parent);
        assert_eq!(m.status(), ModuleStatus::Ready);

        let root = m.root().unwrap();
        assert_eq!(f.scene.find_descendants(root, "TankBody").len(), 1);
        assert!(f.scene.find_descendants(root, "Trim").is_empty());
        let body = f.scene.find_descendants(root, "TankBody")[0];
        assert_eq!(f.scene.path(body), "part/core/position-0/model/Tank/TankBody");
    }

    #[test]
    fn layout_switch_keeps_existing_positions() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.setup_model(&mut f.scene, f.parent);
        let first = f.scene.find_descendants(m.root().unwrap(), "TankBody")[0];

        assert!(m.select_layout(&mut f.scene, "quad"));
        assert_eq!(m.position_count(), 4);
        let bodies = f.scene.find_descendants(m.root().unwrap(), "TankBody");
        assert_eq!(bodies.len(), 4);
        assert_eq!(bodies[0], first);

        assert!(!m.select_layout(&mut f.scene, "ring"));
        assert_eq!(m.layout().name, "default");
        assert_eq!(f.scene.find_descendants(m.root().unwrap(), "TankBody"), vec![first]);
    }

    #[test]
    fn unknown_definition_falls_back_to_first_option() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.setup_model(&mut f.scene, f.parent);
        assert!(m.select_definition(&mut f.scene, "stretchy"));
        assert_eq!(m.definition().name, "stretchy");
        assert!(!m.select_definition(&mut f.scene, "ghost"));
        assert_eq!(m.definition().name, "tank");
        assert_eq!(f.scene.find_descendants(m.root().unwrap(), "TankBody").len(), 1);
        assert!(f.scene.find_descendants(m.root().unwrap(), "Stretchy").is_empty());
    }

    #[test]
    fn definition_switch_resets_unsupported_layout() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.select_layout(&mut f.scene, "quad");
        m.select_definition(&mut f.scene, "adapter");
        assert_eq!(m.layout().name, "default");
    }

    #[test]
    fn vertical_scale_is_clamped() {
        let f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.set_scale(2.0, 10.0);
        assert_relative_eq!(m.vertical_scale(), 4.0);
        m.set_scale(2.0, 0.1);
        assert_relative_eq!(m.vertical_scale(), 1.0);
        m.set_scale(1.5, 2.0);
        assert_relative_eq!(m.vertical_scale(), 2.0);
        m.set_scale(0.0, 2.0);
        assert_relative_eq!(m.horizontal_scale(), 1.5);
        for (h, v) in [(0.25, 100.0), (3.0, -1.0), (1.0, f64::NAN)] {
            m.set_scale(h, v);
            assert!(m.vertical_scale() >= h * 0.5 - 1e-12);
            assert!(m.vertical_scale() <= h * 2.0 + 1e-12);
        }
    }

    #[test]
    fn malformed_scale_bounds_keep_module_usable() {
        let mut catalog = DefinitionCatalog::new();
        catalog
            .load_str(
                r#"
MODEL_DEFINITION
{
    name = nan-min
    height = 2
    minVerticalScale = nan
    maxVerticalScale = 2
}
MODEL_DEFINITION
{
    name = nan-max
    height = 2
    maxVerticalScale = nan
}
MODEL_DEFINITION
{
    name = negative
    height = 2
    minVerticalScale = -3
    maxVerticalScale = inf
}
"#,
            )
            .unwrap();
        for name in ["nan-min", "nan-max", "negative"] {
            let options = vec![ModelDefinitionLayoutOptions::single(catalog.get(name).unwrap())];
            let mut m =
                ModelModule::new(name, ModelOrientation::Top, options, &EngineSettings::default())
                    .unwrap();
            m.set_scale(1.5, 0.1);
            assert!(m.vertical_scale() > 0.0, "{}", name);
            assert!(m.current_height() > 0.0, "{}", name);
            assert!(m.top() > m.bottom(), "{}", name);
        }
    }

    #[test]
    fn diameter_helpers() {
        let f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.set_scale(1.0, 1.5);
        m.set_scale_for_diameter(5.0);
        assert_relative_eq!(m.horizontal_scale(), 2.0);
        assert_relative_eq!(m.vertical_scale(), 3.0);
        assert_relative_eq!(m.current_diameter(), 5.0);
        assert_relative_eq!(m.current_height(), 12.0);

        m.set_scale_for_height_and_diameter(4.0, 2.5);
        assert_relative_eq!(m.horizontal_scale(), 1.0);
        assert_relative_eq!(m.vertical_scale(), 1.0);
    }

    #[test]
    fn upper_and_lower_diameters() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.select_definition(&mut f.scene, "adapter");
        m.set_scale(2.0, 2.0);
        assert_relative_eq!(m.upper_diameter(), 10.0);
        assert_relative_eq!(m.lower_diameter(), 6.0);

        m.set_scale_for_lower_diameter(3.0);
        assert_relative_eq!(m.horizontal_scale(), 1.0);
        m.set_scale_for_upper_diameter(7.5);
        assert_relative_eq!(m.horizontal_scale(), 1.5);
    }

    #[test]
    fn stats_scale_with_average_scale_and_positions() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.set_scale(2.0, 2.0);
        assert_relative_eq!(m.module_mass(), 8.0, epsilon = 1e-9);
        assert_relative_eq!(m.module_volume(), 80.0, epsilon = 1e-9);

        m.select_layout(&mut f.scene, "quad");
        assert_relative_eq!(m.module_cost(), 3200.0, epsilon = 1e-9);

        let settings = EngineSettings::from_toml("[scale_powers]\ncost = 1.0\n").unwrap();
        let mut cheap = ModelModule::new("core", ModelOrientation::Top, f.options.clone(), &settings).unwrap();
        cheap.set_scale(2.0, 2.0);
        assert_relative_eq!(cheap.module_cost(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn extents_follow_slot_orientation() {
        let f = fixture();
        let mut top = module(&f, ModelOrientation::Top);
        top.set_position(1.0);
        assert_relative_eq!(top.top(), 5.0);
        assert_relative_eq!(top.bottom(), 1.0);
        assert_relative_eq!(top.center(), 3.0);

        let mut central = module(&f, ModelOrientation::Central);
        central.set_position(1.0);
        assert_relative_eq!(central.top(), 3.0);
        assert_relative_eq!(central.bottom(), -1.0);

        let bottom = module(&f, ModelOrientation::Bottom);
        assert_relative_eq!(bottom.top(), 0.0);
        assert_relative_eq!(bottom.bottom(), -4.0);
    }

    #[test]
    fn placement_offset_moves_position_root() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Central);
        assert_relative_eq!(m.placement_offset(), -2.0);
        m.setup_model(&mut f.scene, f.parent);
        let pos = f.scene.find_descendants(m.root().unwrap(), "position-0")[0];
        assert_relative_eq!(f.scene.local_transform(pos).unwrap().position.y, -2.0);
        assert!(!m.should_invert());
    }

    #[test]
    fn inverted_model_gets_half_turn() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Bottom);
        assert!(m.should_invert());
        assert_relative_eq!(m.placement_offset(), 0.0);
        m.setup_model(&mut f.scene, f.parent);
        let model = f.scene.find_descendants(m.root().unwrap(), "model")[0];
        let t = f.scene.local_transform(model).unwrap();
        assert_relative_eq!(t.rotation.angle(), PI, epsilon = 1e-12);
        assert_relative_eq!(t.scale.y, 1.0);
    }

    #[test]
    fn compound_segments_are_distributed() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.setup_model(&mut f.scene, f.parent);
        m.select_definition(&mut f.scene, "stretchy");
        m.set_scale(1.0, 1.5);
        m.update_model_transforms(&mut f.scene);

        let root = m.root().unwrap();
        let model = f.scene.find_descendants(root, "model")[0];
        assert_relative_eq!(f.scene.local_transform(model).unwrap().scale.y, 1.0);
        let cap = f.scene.local_transform(f.scene.find_descendants(root, "Cap")[0]).unwrap();
        let body = f.scene.local_transform(f.scene.find_descendants(root, "Body")[0]).unwrap();
        assert_relative_eq!(cap.position.y, 0.0);
        assert_relative_eq!(cap.scale.y, 1.0);
        assert_relative_eq!(body.position.y, 1.0);
        assert_relative_eq!(body.scale.y, 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(body.scale.x, 1.0);

        assert_eq!(f.scene.find_descendants(root, "Bolts").len(), 1);
        assert!(f.scene.find_descendants(root, "Bolt").is_empty());
    }

    #[test]
    fn body_nodes_beyond_declared_count_are_destroyed() {
        let f = fixture();
        let m = module(&f, ModelOrientation::Top);
        let mut nodes = AttachNodes::new();
        let names = ["body1", "body2", "body3", "body4"];
        for n in names {
            nodes.create_node(AttachPoint::new(n, Vec3::zeros(), Vec3::y(), 1));
        }
        m.update_attach_node_body(&mut nodes, &names, false);
        assert_eq!(nodes.len(), 2);
        let b1 = nodes.node("body1").unwrap();
        assert_relative_eq!(b1.position.x, 1.25);
        assert_relative_eq!(b1.position.y, 2.0);
        assert_relative_eq!(nodes.node("body2").unwrap().orientation.x, -1.0);
        assert!(nodes.node("body3").is_none());
        assert!(nodes.node("body4").is_none());
    }

    #[test]
    fn end_nodes_move_mated_parts_on_user_input() {
        let f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        let mut nodes = AttachNodes::new();
        m.update_attach_node_top(&mut nodes, "top", false);
        m.update_attach_node_bottom(&mut nodes, "bottom", false);
        assert_relative_eq!(nodes.node("top").unwrap().position.y, 4.0);
        assert_relative_eq!(nodes.node("bottom").unwrap().position.y, 0.0);
        assert_eq!(nodes.node("top").unwrap().size, 2);

        nodes.attach("top", "nose");
        m.set_scale(1.0, 2.0);
        m.update_attach_node_top(&mut nodes, "top", true);
        assert_relative_eq!(nodes.node("top").unwrap().position.y, 8.0);
        assert_relative_eq!(nodes.mated("top").unwrap().offset.y, 4.0);

        m.set_scale(1.0, 1.0);
        m.update_attach_node_top(&mut nodes, "top", false);
        assert_relative_eq!(nodes.node("top").unwrap().position.y, 4.0);
        assert_relative_eq!(nodes.mated("top").unwrap().offset.y, 4.0);
    }

    #[test]
    fn inverted_end_nodes_swap() {
        let f = fixture();
        let m = module(&f, ModelOrientation::Bottom);
        let mut nodes = AttachNodes::new();
        m.update_attach_node_top(&mut nodes, "top", false);
        m.update_attach_node_bottom(&mut nodes, "bottom", false);
        assert_relative_eq!(nodes.node("top").unwrap().position.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(nodes.node("bottom").unwrap().position.y, -4.0, epsilon = 1e-12);
        assert_relative_eq!(nodes.node("bottom").unwrap().orientation.y, -1.0, epsilon = 1e-12);

        m.update_surface_attach_node(&mut nodes, "srf", false);
        assert_relative_eq!(nodes.node("srf").unwrap().position.x, -1.25, epsilon = 1e-12);
        assert_relative_eq!(nodes.node("srf").unwrap().position.y, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn valid_upper_models_check_profiles_and_nodes() {
        let f = fixture();
        let m = module(&f, ModelOrientation::Top);
        let candidates = f.catalog.get_many(&["cap2", "cap1", "flipped", "capless"]);
        let mut nodes = AttachNodes::new();
        let none: [&str; 0] = [];

        let names = |v: Vec<Arc<ModelDefinition>>| v.iter().map(|d| d.name.clone()).collect::<Vec<_>>();
        assert_eq!(
            names(m.valid_upper_models(&candidates, ModelOrientation::Top, &nodes, &none, Some("top2"))),
            vec!["cap2", "flipped", "capless"]
        );

        nodes.attach("top2", "probe");
        assert_eq!(
            names(m.valid_upper_models(&candidates, ModelOrientation::Top, &nodes, &none, Some("top2"))),
            vec!["cap2", "flipped"]
        );

        nodes.attach("body0", "strut");
        assert!(m
            .valid_upper_models(&candidates, ModelOrientation::Top, &nodes, &["body0"], None)
            .is_empty());
    }

    #[test]
    fn valid_lower_models_use_presented_upper_profiles() {
        let f = fixture();
        let m = module(&f, ModelOrientation::Top);
        let candidates = f.catalog.get_many(&["tank", "cap2", "flipped"]);
        let nodes = AttachNodes::new();
        let none: [&str; 0] = [];
        let found: Vec<_> = m
            .valid_lower_models(&candidates, ModelOrientation::Top, &nodes, &none, None)
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(found, vec!["tank"]);
        // every candidate presents size2 upward once hung below the origin
        let below = m.valid_lower_models(&candidates, ModelOrientation::Bottom, &nodes, &none, None);
        assert_eq!(below.len(), 3);
    }

    #[test]
    fn can_switch_to_protects_occupied_nodes() {
        let f = fixture();
        let m = module(&f, ModelOrientation::Top);
        let tank = f.catalog.get("tank").unwrap();
        let capless = f.catalog.get("capless").unwrap();
        let mut nodes = AttachNodes::new();
        nodes.attach("top", "probe");
        nodes.attach("body2", "strut");
        assert!(m.can_switch_to(&tank, &nodes, &["body1", "body2"], Some("top"), Some("bottom")));
        assert!(!m.can_switch_to(&capless, &nodes, &["body1", "body2"], None, None));
        assert!(!m.can_switch_to(&capless, &nodes, &["x"; 0], Some("top"), None));
        nodes.detach("top");
        assert!(m.can_switch_to(&capless, &nodes, &["x"; 0], Some("top"), None));
    }

    #[test]
    fn texture_fallback_adopts_authored_colours() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        assert_eq!(m.texture_set(), "white");
        m.setup_model(&mut f.scene, f.parent);
        m.select_texture_set(&mut f.scene, "missing");
        assert_eq!(m.texture_set(), "white");
        assert_eq!(m.colors().main, Color::new(1.0, 0.0, 0.0, 1.0));

        let custom = RecoloringData {
            main: Color::new(0.0, 0.0, 1.0, 1.0),
            ..Default::default()
        };
        m.set_colors(&mut f.scene, custom);
        m.select_texture_set(&mut f.scene, "black");
        assert_eq!(m.texture_set(), "black");
        assert_eq!(m.colors(), custom);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.select_layout(&mut f.scene, "quad");
        m.set_scale(1.5, 2.0);
        m.set_position(3.0);
        let colors = RecoloringData {
            detail: Color::new(0.2, 0.4, 0.6, 0.8),
            ..Default::default()
        };
        m.set_colors(&mut f.scene, colors);
        m.select_texture_set(&mut f.scene, "black");

        let state = m.state();
        assert_eq!(state.colors, Some(encode_colors(&colors)));
        let json = state.to_json().unwrap();
        let parsed = ModuleState::from_json(&json).unwrap();
        assert_eq!(parsed, state);

        let mut restored = module(&f, ModelOrientation::Top);
        restored.restore_logical(&parsed);
        assert_eq!(restored.state(), state);
        restored.setup_model(&mut f.scene, f.parent);
        assert_eq!(
            f.scene
                .find_descendants(restored.root().unwrap(), "TankBody")
                .len(),
            4
        );
    }

    #[test]
    fn restore_tolerates_stale_names() {
        let mut f = fixture();
        let mut m = module(&f, ModelOrientation::Top);
        m.setup_model(&mut f.scene, f.parent);
        let state = ModuleState::from_json(
            r#"{"definition":"gone","layout":"quad","horizontal_scale":1.0,"vertical_scale":9.0}"#,
        )
        .unwrap();
        m.restore(&mut f.scene, &state);
        assert_eq!(m.definition().name, "tank");
        assert_eq!(m.layout().name, "quad");
        assert_relative_eq!(m.vertical_scale(), 2.0);
        assert_eq!(m.texture_set(), "white");
    }
}
