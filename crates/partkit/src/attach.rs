//! Authored attach-node descriptors.

use crate::orientation::ModelOrientation;
use partkit_cfg::parse_csv_f64;
use partkit_math::{half_turn, Vec3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Authored value that disables an end node.
pub const NODE_DISABLED: &str = "none";

/// Position, direction, and size of an attach node in model space (scale 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttachNodeBaseData {
    /// Node position.
    pub position: Vec3,
    /// Node facing direction.
    pub orientation: Vec3,
    /// Node size class.
    pub size: i32,
}

impl AttachNodeBaseData {
    /// Create a descriptor.
    pub fn new(position: Vec3, orientation: Vec3, size: i32) -> Self {
        Self {
            position,
            orientation,
            size,
        }
    }

    /// Parse `x,y,z,rx,ry,rz[,size]`. A missing size uses `default_size`.
    pub fn parse(raw: &str, default_size: i32) -> Option<Self> {
        let vals = parse_csv_f64(raw)?;
        if vals.len() != 6 && vals.len() != 7 {
            return None;
        }
        let size = vals.get(6).map(|s| s.round() as i32).unwrap_or(default_size);
        Some(Self::new(
            Vec3::new(vals[0], vals[1], vals[2]),
            Vec3::new(vals[3], vals[4], vals[5]),
            size,
        ))
    }

    /// Parse an authored node, falling back to `default` (with a warning) when
    /// the text is malformed.
    pub fn parse_or(raw: &str, default: Self, context: &str) -> Self {
        Self::parse(raw, default.size).unwrap_or_else(|| {
            warn!("{}: malformed attach node '{}', using default", context, raw);
            default
        })
    }

    /// Default top node for a model of the given size and authored orientation.
    pub fn default_top(height: f64, diameter: f64, orientation: ModelOrientation) -> Self {
        let y = height * orientation.top_fraction();
        Self::new(Vec3::new(0.0, y, 0.0), Vec3::y(), default_node_size(diameter))
    }

    /// Default bottom node for a model of the given size and authored orientation.
    pub fn default_bottom(height: f64, diameter: f64, orientation: ModelOrientation) -> Self {
        let y = height * (orientation.top_fraction() - 1.0);
        Self::new(Vec3::new(0.0, y, 0.0), -Vec3::y(), default_node_size(diameter))
    }

    /// Default surface node: on the outer radius at mid-height, facing +X.
    pub fn default_surface(height: f64, diameter: f64, orientation: ModelOrientation) -> Self {
        let center = height * (orientation.top_fraction() - 0.5);
        Self::new(
            Vec3::new(diameter * 0.5, center, 0.0),
            Vec3::x(),
            default_node_size(diameter),
        )
    }

    /// Node placement for an instance at the given scales, before the slot
    /// origin is added. Positions scale by `(h, v, h)`; an inverted instance
    /// is turned half a revolution about `invert_axis`.
    pub fn placement(
        &self,
        horizontal: f64,
        vertical: f64,
        invert: Option<&Vec3>,
    ) -> (Vec3, Vec3, i32) {
        let mut pos = Vec3::new(
            self.position.x * horizontal,
            self.position.y * vertical,
            self.position.z * horizontal,
        );
        let mut dir = self.orientation;
        if let Some(axis) = invert {
            let flip = half_turn(axis);
            pos = flip * pos;
            dir = flip * dir;
        }
        let size = ((self.size as f64) * horizontal).round().max(0.0) as i32;
        (pos, dir, size)
    }
}

/// Size class for a node on a model of `diameter`: `round(d / 1.25)`, at least 0.
pub fn default_node_size(diameter: f64) -> i32 {
    (diameter / 1.25).round().max(0.0) as i32
}
