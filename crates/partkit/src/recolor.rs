//! Texture sets and user mask colours.

use crate::definition::ModelDefinition;
use crate::error::{ModelError, Result};
use crate::fields::{read_bool, read_string, read_strings};
use crate::scene::{MaterialValue, NodeId, SceneHost};
use partkit_cfg::{parse_csv_f64, ConfigNode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Material parameter names for the three mask colours.
pub const MASK_COLOR_PARAMS: [&str; 3] = ["_MaskColor1", "_MaskColor2", "_MaskColor3"];

/// An RGBA colour with components in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha (specular/metallic weight for mask colours).
    pub a: f32,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    /// Create a colour.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `r,g,b` or `r,g,b,a`. Alpha defaults to 1.
    pub fn parse(raw: &str) -> Option<Self> {
        let vals = parse_csv_f64(raw)?;
        match vals.as_slice() {
            [r, g, b] => Some(Self::new(*r as f32, *g as f32, *b as f32, 1.0)),
            [r, g, b, a] => Some(Self::new(*r as f32, *g as f32, *b as f32, *a as f32)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
    }
}

/// The three user-overridable mask colours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoloringData {
    /// Main mask colour.
    pub main: Color,
    /// Secondary mask colour.
    pub second: Color,
    /// Detail mask colour.
    pub detail: Color,
}

impl Default for RecoloringData {
    fn default() -> Self {
        Self {
            main: Color::WHITE,
            second: Color::WHITE,
            detail: Color::WHITE,
        }
    }
}

impl RecoloringData {
    /// Colours in mask order.
    pub fn as_array(&self) -> [Color; 3] {
        [self.main, self.second, self.detail]
    }

    /// Parse a `COLORS { mainColor, secondColor, detailColor }` record.
    /// Missing or malformed entries are white.
    pub fn from_config(node: &ConfigNode, context: &str) -> Self {
        let read = |key: &str| match node.value(key) {
            Some(raw) => Color::parse(raw).unwrap_or_else(|| {
                warn!("{}: malformed colour '{}' for {}", context, raw, key);
                Color::WHITE
            }),
            None => Color::WHITE,
        };
        Self {
            main: read("mainColor"),
            second: read("secondColor"),
            detail: read("detailColor"),
        }
    }
}

/// Encode mask colours as `R,G,B,A;R,G,B,A;R,G,B,A`.
pub fn encode_colors(colors: &RecoloringData) -> String {
    colors
        .as_array()
        .iter()
        .map(Color::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// Decode a persisted colour string. One to three entries are accepted;
/// missing trailing entries are white.
pub fn decode_colors(raw: &str) -> Result<RecoloringData> {
    let parts: Vec<&str> = raw.split(';').map(str::trim).collect();
    if raw.trim().is_empty() || parts.len() > 3 {
        return Err(ModelError::invalid_colors(raw, "expected one to three colours"));
    }
    let mut colors = [Color::WHITE; 3];
    for (slot, part) in colors.iter_mut().zip(&parts) {
        *slot = Color::parse(part)
            .ok_or_else(|| ModelError::invalid_colors(raw, format!("bad colour '{}'", part)))?;
    }
    Ok(RecoloringData {
        main: colors[0],
        second: colors[1],
        detail: colors[2],
    })
}

/// Texture bindings for one group of meshes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureSetMaterial {
    /// Shader name, if the set overrides it.
    pub shader: Option<String>,
    /// Mesh names the material applies to; empty means every node.
    pub meshes: Vec<String>,
    /// `(slot, asset path)` texture bindings.
    pub textures: Vec<(String, String)>,
}

impl TextureSetMaterial {
    fn from_config(node: &ConfigNode, context: &str) -> Self {
        let textures = node
            .values_of("texture")
            .into_iter()
            .filter_map(|raw| match raw.split_once(',') {
                Some((slot, path)) => Some((slot.trim().to_string(), path.trim().to_string())),
                None => {
                    warn!("{}: texture binding '{}' is not 'slot,path'", context, raw);
                    None
                }
            })
            .collect();
        Self {
            shader: read_string(node, "shader"),
            meshes: read_strings(node, "mesh"),
            textures,
        }
    }
}

/// A named material variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureSet {
    /// Unique name.
    pub name: String,
    /// Display title.
    pub title: String,
    /// Authored mask colours, if the set declares them.
    pub mask_colors: Option<RecoloringData>,
    /// Whether mask colours are applied at all.
    pub supports_recoloring: bool,
    /// Material bindings.
    pub materials: Vec<TextureSetMaterial>,
}

impl TextureSet {
    /// Parse a `TEXTURESET` record.
    pub fn from_config(node: &ConfigNode) -> Self {
        let name = read_string(node, "name").unwrap_or_default();
        let context = format!("TEXTURESET '{}'", name);
        let mask_colors = node
            .node("COLORS")
            .map(|c| RecoloringData::from_config(c, &context));
        Self {
            title: read_string(node, "title").unwrap_or_else(|| name.clone()),
            supports_recoloring: read_bool(node, "recolorable", mask_colors.is_some(), &context),
            mask_colors,
            materials: node
                .nodes_named("MATERIAL")
                .map(|m| TextureSetMaterial::from_config(m, &context))
                .collect(),
            name,
        }
    }

    /// Write the set's material bindings (and `colors`, when recolourable)
    /// onto every matching node under `root`.
    pub fn apply(&self, scene: &mut dyn SceneHost, root: NodeId, colors: &RecoloringData) {
        for material in &self.materials {
            let targets: Vec<NodeId> = if material.meshes.is_empty() {
                scene.descendants(root)
            } else {
                material
                    .meshes
                    .iter()
                    .flat_map(|m| scene.find_descendants(root, m))
                    .collect()
            };
            for node in targets {
                if let Some(shader) = &material.shader {
                    scene.set_material_param(node, "shader", MaterialValue::Text(shader.clone()));
                }
                for (slot, path) in &material.textures {
                    scene.set_material_param(node, slot, MaterialValue::Texture(path.clone()));
                }
                if self.supports_recoloring {
                    for (param, color) in MASK_COLOR_PARAMS.iter().zip(colors.as_array()) {
                        scene.set_material_param(node, param, MaterialValue::Color(color));
                    }
                }
            }
        }
    }
}

/// Per-instance texture-set selection and mask colours.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureState {
    /// Current texture-set name (empty when the definition has none).
    pub current: String,
    /// Current mask colours.
    pub colors: RecoloringData,
    /// Whether the user has customised (and persisted) colours.
    pub custom_colors: bool,
}

impl TextureState {
    /// Select `name` for `definition`. An unknown name falls back to the
    /// definition's default set. The set's authored colours are adopted
    /// unless the user has customised colours.
    pub fn select<'d>(&mut self, name: &str, definition: &'d ModelDefinition) -> Option<&'d TextureSet> {
        let set = match definition.texture_set(name) {
            Some(set) => Some(set),
            None => {
                let fallback = definition.default_texture_set();
                if !name.is_empty() || fallback.is_none() {
                    warn!(
                        "texture set '{}' is not valid for model '{}', using '{}'",
                        name,
                        definition.name,
                        fallback.map(|s| s.name.as_str()).unwrap_or("")
                    );
                }
                fallback
            }
        };
        match set {
            Some(set) => {
                self.current = set.name.clone();
                if !self.custom_colors {
                    if let Some(mask) = set.mask_colors {
                        debug!("adopting authored colours of texture set '{}'", set.name);
                        self.colors = mask;
                    }
                }
            }
            None => self.current.clear(),
        }
        set
    }

    /// Override the mask colours.
    pub fn set_colors(&mut self, colors: RecoloringData) {
        self.colors = colors;
        self.custom_colors = true;
    }

    /// Persisted form of the colours (`None` when not customised).
    pub fn persisted_colors(&self) -> Option<String> {
        self.custom_colors.then(|| encode_colors(&self.colors))
    }

    /// Restore persisted colours. Malformed text is logged and ignored.
    pub fn restore_colors(&mut self, raw: &str) {
        match decode_colors(raw) {
            Ok(colors) => self.set_colors(colors),
            Err(e) => warn!("ignoring persisted colours: {}", e),
        }
    }
}
