//! Scene-graph boundary.
//!
//! partkit never owns rendering objects. It drives whatever scene the host
//! engine provides through [`SceneHost`]; [`SceneGraph`] is a self-contained
//! implementation used by tools and tests.

use crate::recolor::Color;
use partkit_math::LocalTransform;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::collections::{BTreeMap, HashMap};

new_key_type! {
    /// Handle to a scene node.
    pub struct NodeId;
}

/// A material parameter written to a renderable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialValue {
    /// Colour parameter (mask colours).
    Color(Color),
    /// Texture slot bound to an asset path.
    Texture(String),
    /// Scalar parameter.
    Float(f64),
    /// Free text (shader name).
    Text(String),
}

/// Capabilities partkit needs from the host scene graph.
pub trait SceneHost {
    /// Clone a named geometry asset under `parent`. `None` when the asset is unknown.
    fn clone_asset(&mut self, asset: &str, parent: NodeId) -> Option<NodeId>;

    /// Create an empty transform node.
    fn create_empty(&mut self, name: &str, parent: Option<NodeId>) -> NodeId;

    /// Every node named `name` in the subtree of `root` (including `root`),
    /// in depth-first order.
    fn find_descendants(&self, root: NodeId, name: &str) -> Vec<NodeId>;

    /// Every node in the subtree of `root`, including `root`, depth-first.
    fn descendants(&self, root: NodeId) -> Vec<NodeId>;

    /// Destroy a node and its subtree.
    fn destroy(&mut self, node: NodeId);

    /// Node name.
    fn name(&self, node: NodeId) -> Option<String>;

    /// Rename a node.
    fn rename(&mut self, node: NodeId, name: &str);

    /// Whether the node carries renderable geometry.
    fn is_mesh(&self, node: NodeId) -> bool;

    /// Current local transform.
    fn local_transform(&self, node: NodeId) -> Option<LocalTransform>;

    /// Replace the local transform.
    fn set_local_transform(&mut self, node: NodeId, transform: LocalTransform);

    /// Combine `sources` into one renderable named `target` under `parent`.
    /// The sources are consumed.
    fn merge_meshes(&mut self, sources: &[NodeId], target: &str, parent: NodeId) -> Option<NodeId>;

    /// Write a material parameter on a renderable.
    fn set_material_param(&mut self, node: NodeId, key: &str, value: MaterialValue);
}

/// Geometry asset template registered with a [`SceneGraph`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetNode {
    /// Node name.
    pub name: String,
    /// Whether the node is renderable.
    pub mesh: bool,
    /// Local transform inside the asset.
    pub transform: LocalTransform,
    /// Child nodes.
    pub children: Vec<AssetNode>,
}

impl AssetNode {
    /// A renderable leaf.
    pub fn mesh(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mesh: true,
            ..Default::default()
        }
    }

    /// A non-renderable group with children.
    pub fn group(name: impl Into<String>, children: Vec<AssetNode>) -> Self {
        Self {
            name: name.into(),
            mesh: false,
            children,
            ..Default::default()
        }
    }
}

/// A node in a [`SceneGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Node name.
    pub name: String,
    /// Parent node.
    pub parent: Option<NodeId>,
    /// Children in creation order.
    pub children: Vec<NodeId>,
    /// Local transform.
    pub transform: LocalTransform,
    /// Renderable flag.
    pub mesh: bool,
    /// Material parameters.
    pub material: BTreeMap<String, MaterialValue>,
}

/// In-memory scene graph.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    assets: HashMap<String, AssetNode>,
}

impl SceneGraph {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geometry asset under `name`.
    pub fn register_asset(&mut self, name: impl Into<String>, template: AssetNode) {
        self.assets.insert(name.into(), template);
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the scene holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Path of names from the scene root down to `id`, joined by `/`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            match self.nodes.get(c) {
                Some(n) => {
                    parts.push(n.name.clone());
                    cursor = n.parent;
                }
                None => break,
            }
        }
        parts.reverse();
        parts.join("/")
    }

    fn insert(&mut self, node: SceneNode) -> NodeId {
        let parent = node.parent;
        let id = self.nodes.insert(node);
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.push(id);
        }
        id
    }

    fn instantiate(&mut self, template: &AssetNode, parent: Option<NodeId>) -> NodeId {
        let id = self.insert(SceneNode {
            name: template.name.clone(),
            parent,
            children: Vec::new(),
            transform: template.transform,
            mesh: template.mesh,
            material: BTreeMap::new(),
        });
        for child in &template.children {
            self.instantiate(child, Some(id));
        }
        id
    }
}

impl SceneHost for SceneGraph {
    fn clone_asset(&mut self, asset: &str, parent: NodeId) -> Option<NodeId> {
        let template = self.assets.get(asset)?.clone();
        Some(self.instantiate(&template, Some(parent)))
    }

    fn create_empty(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        self.insert(SceneNode {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            transform: LocalTransform::identity(),
            mesh: false,
            material: BTreeMap::new(),
        })
    }

    fn find_descendants(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.name == name))
            .collect()
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get(id) {
                out.push(id);
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn destroy(&mut self, node: NodeId) {
        let subtree = self.descendants(node);
        if let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != node);
            }
        }
        for id in subtree {
            self.nodes.remove(id);
        }
    }

    fn name(&self, node: NodeId) -> Option<String> {
        self.nodes.get(node).map(|n| n.name.clone())
    }

    fn rename(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.name = name.to_string();
        }
    }

    fn is_mesh(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.mesh)
    }

    fn local_transform(&self, node: NodeId) -> Option<LocalTransform> {
        self.nodes.get(node).map(|n| n.transform)
    }

    fn set_local_transform(&mut self, node: NodeId, transform: LocalTransform) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.transform = transform;
        }
    }

    fn merge_meshes(&mut self, sources: &[NodeId], target: &str, parent: NodeId) -> Option<NodeId> {
        if sources.is_empty() || !self.nodes.contains_key(parent) {
            return None;
        }
        let merged = self.insert(SceneNode {
            name: target.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            transform: LocalTransform::identity(),
            mesh: true,
            material: BTreeMap::new(),
        });
        for src in sources {
            if *src != merged {
                self.destroy(*src);
            }
        }
        Some(merged)
    }

    fn set_material_param(&mut self, node: NodeId, key: &str, value: MaterialValue) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.material.insert(key.to_string(), value);
        }
    }
}
