//! Attach-node boundary.
//!
//! Attach nodes live on the structural element that owns the slot, not on
//! the model geometry. [`AttachNodeHost`] is what partkit needs from that
//! element; [`AttachNodes`] is an in-memory implementation.

use partkit_math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live attach node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachPoint {
    /// Node name.
    pub name: String,
    /// Position in the element's space.
    pub position: Vec3,
    /// Facing direction.
    pub orientation: Vec3,
    /// Size class.
    pub size: i32,
}

impl AttachPoint {
    /// Create an attach point.
    pub fn new(name: impl Into<String>, position: Vec3, orientation: Vec3, size: i32) -> Self {
        Self {
            name: name.into(),
            position,
            orientation,
            size,
        }
    }
}

/// Capabilities partkit needs from the element owning the attach nodes.
pub trait AttachNodeHost {
    /// Current state of a node.
    fn node(&self, name: &str) -> Option<AttachPoint>;

    /// Create a node.
    fn create_node(&mut self, point: AttachPoint);

    /// Move an existing node.
    fn move_node(&mut self, name: &str, position: Vec3, orientation: Vec3, size: i32);

    /// Destroy a node. Unknown names are ignored.
    fn destroy_node(&mut self, name: &str);

    /// Name of the part mated to a node, if any.
    fn attached_part(&self, name: &str) -> Option<String>;

    /// Relocate the part mated to `name` by `delta`.
    fn translate_attached(&mut self, name: &str, delta: Vec3);
}

/// A part mated to a node, with the accumulated relocation applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatedPart {
    /// Part identifier.
    pub part: String,
    /// Sum of every relocation applied.
    pub offset: Vec3,
}

/// In-memory [`AttachNodeHost`].
#[derive(Debug, Clone, Default)]
pub struct AttachNodes {
    nodes: BTreeMap<String, AttachPoint>,
    mated: BTreeMap<String, MatedPart>,
}

impl AttachNodes {
    /// Empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mate `part` to node `name`.
    pub fn attach(&mut self, name: impl Into<String>, part: impl Into<String>) {
        self.mated.insert(
            name.into(),
            MatedPart {
                part: part.into(),
                offset: Vec3::zeros(),
            },
        );
    }

    /// Remove whatever is mated to `name`.
    pub fn detach(&mut self, name: &str) -> Option<MatedPart> {
        self.mated.remove(name)
    }

    /// The part mated to `name`, with its accumulated offset.
    pub fn mated(&self, name: &str) -> Option<&MatedPart> {
        self.mated.get(name)
    }

    /// Names of nodes that have a part mated to them.
    pub fn occupied(&self) -> Vec<String> {
        self.mated.keys().cloned().collect()
    }

    /// All nodes, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &AttachPoint> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl AttachNodeHost for AttachNodes {
    fn node(&self, name: &str) -> Option<AttachPoint> {
        self.nodes.get(name).cloned()
    }

    fn create_node(&mut self, point: AttachPoint) {
        self.nodes.insert(point.name.clone(), point);
    }

    fn move_node(&mut self, name: &str, position: Vec3, orientation: Vec3, size: i32) {
        if let Some(n) = self.nodes.get_mut(name) {
            n.position = position;
            n.orientation = orientation;
            n.size = size;
        }
    }

    fn destroy_node(&mut self, name: &str) {
        self.nodes.remove(name);
    }

    fn attached_part(&self, name: &str) -> Option<String> {
        self.mated.get(name).map(|m| m.part.clone())
    }

    fn translate_attached(&mut self, name: &str, delta: Vec3) {
        if let Some(m) = self.mated.get_mut(name) {
            m.offset += delta;
        }
    }
}
