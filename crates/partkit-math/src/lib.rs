#![warn(missing_docs)]

//! Math types for partkit.
//!
//! Thin wrappers around nalgebra providing the vocabulary used by model
//! definitions and instances: vectors, rotations, and node-local
//! transforms.

use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A vector (or point) in 3D model space. `y` is the mounting axis.
pub type Vec3 = Vector3<f64>;

/// A rotation in 3D space.
pub type Rotation = UnitQuaternion<f64>;

/// Blend a scale so the components selected by `axis` get `along` and the
/// remaining components get `across`: `axis * along + (1 - axis) * across`.
///
/// `axis` is expected to be a 0/1 mask such as `(0, 1, 0)`.
pub fn axis_blend(axis: &Vec3, along: f64, across: f64) -> Vec3 {
    axis * along + (Vec3::repeat(1.0) - axis) * across
}

/// Rotation from Euler angles in degrees (applied as X, then Y, then Z).
pub fn rotation_from_euler_degrees(angles: &Vec3) -> Rotation {
    UnitQuaternion::from_euler_angles(
        angles.x.to_radians(),
        angles.y.to_radians(),
        angles.z.to_radians(),
    )
}

/// Half-turn about `axis`, used to flip geometry end-over-end.
///
/// A zero-length axis yields the identity rotation.
pub fn half_turn(axis: &Vec3) -> Rotation {
    match Unit::try_new(*axis, 1e-12) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, PI),
        None => UnitQuaternion::identity(),
    }
}

/// Position / rotation / scale of a scene node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    /// Translation relative to the parent.
    pub position: Vec3,
    /// Rotation relative to the parent.
    pub rotation: Rotation,
    /// Non-uniform scale.
    pub scale: Vec3,
}

impl LocalTransform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Rotation::identity(),
            scale: Vec3::repeat(1.0),
        }
    }

    /// Build from position, Euler rotation in degrees, and scale.
    pub fn from_parts(position: Vec3, euler_deg: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation: rotation_from_euler_degrees(&euler_deg),
            scale,
        }
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::identity()
    }
}
