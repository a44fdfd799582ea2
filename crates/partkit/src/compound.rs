//! Compound (non-uniform) height distribution.
//!
//! A compound model is a stack of named segments. Stretchable segments share
//! whatever height is left once the aspect-locked segments have taken their
//! share at the horizontal scale. Authored order is stacking order.

use crate::fields::{read_bool, read_f64, read_i64, read_vec3};
use partkit_cfg::ConfigNode;
use partkit_math::{axis_blend, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One stacked segment of a compound model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundTransformDescriptor {
    /// Name of the scene node this segment drives.
    pub name: String,
    /// Segment height at scale 1.
    pub height: f64,
    /// Whether the segment may stretch independently of horizontal scale.
    pub can_scale_height: bool,
    /// Offset from the running cursor, in unscaled units.
    pub offset: f64,
    /// 0/1 mask selecting the vertical axis.
    pub vertical_axis: Vec3,
    /// Authored ordering key.
    pub order: i64,
}

impl CompoundTransformDescriptor {
    /// Parse a `TRANSFORM` record; `index` is the default ordering key.
    pub fn from_config(node: &ConfigNode, index: usize, context: &str) -> Self {
        Self {
            name: node.value("name").unwrap_or_default().trim().to_string(),
            height: read_f64(node, "height", 0.0, context),
            can_scale_height: read_bool(node, "canScale", false, context),
            offset: read_f64(node, "offset", 0.0, context),
            vertical_axis: read_vec3(node, "axis", Vec3::y(), context),
            order: read_i64(node, "order", index as i64, context),
        }
    }
}

/// Computed transform for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPlacement {
    /// Segment (scene node) name.
    pub name: String,
    /// Local position of the segment transform.
    pub position: Vec3,
    /// Local scale of the segment transform.
    pub scale: Vec3,
    /// Height the segment occupies after scaling.
    pub segment_height: f64,
    /// Scale applied along the vertical axis.
    pub height_scale: f64,
}

/// Segment list of a compound model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompoundModelData {
    /// Segments in stacking order.
    pub transforms: Vec<CompoundTransformDescriptor>,
}

impl CompoundModelData {
    /// Parse a `COMPOUNDMODEL` record. Segments are stably sorted by `order`.
    pub fn from_config(node: &ConfigNode, context: &str) -> Self {
        let mut transforms: Vec<_> = node
            .nodes_named("TRANSFORM")
            .enumerate()
            .map(|(i, n)| CompoundTransformDescriptor::from_config(n, i, context))
            .collect();
        transforms.sort_by_key(|t| t.order);
        Self { transforms }
    }

    /// Sum of aspect-locked segment heights at the given horizontal scale.
    pub fn static_height(&self, horizontal_scale: f64) -> f64 {
        self.transforms
            .iter()
            .filter(|t| !t.can_scale_height)
            .map(|t| t.height)
            .sum::<f64>()
            * horizontal_scale
    }

    /// Sum of stretchable segment heights at scale 1.
    pub fn scalable_base_height(&self) -> f64 {
        self.transforms
            .iter()
            .filter(|t| t.can_scale_height)
            .map(|t| t.height)
            .sum()
    }

    /// Distribute `desired_height` across the segments.
    ///
    /// `direction` is `+1` to stack upward from the origin, `-1` downward.
    /// When the aspect-locked segments alone exceed `desired_height` the
    /// remaining budget is clamped to zero and stretchable segments collapse.
    pub fn distribute(
        &self,
        desired_height: f64,
        horizontal_scale: f64,
        direction: f64,
    ) -> Vec<SegmentPlacement> {
        let static_height = self.static_height(horizontal_scale);
        let mut needed = desired_height - static_height;
        if needed < 0.0 {
            warn!(
                "compound height {:.4} is below the fixed segment height {:.4}; collapsing stretchable segments",
                desired_height, static_height
            );
            needed = 0.0;
        }
        let scalable_total = self.scalable_base_height();
        debug!(
            desired_height,
            static_height, needed, scalable_total, "distributing compound height"
        );

        let mut cursor = 0.0;
        let mut out = Vec::with_capacity(self.transforms.len());
        for t in &self.transforms {
            let (segment_height, height_scale) = if t.can_scale_height {
                let share = if scalable_total > 0.0 {
                    t.height / scalable_total
                } else {
                    0.0
                };
                let segment = share * needed;
                let scale = if t.height > 0.0 {
                    segment / t.height
                } else {
                    0.0
                };
                (segment, scale)
            } else {
                (horizontal_scale * t.height, horizontal_scale)
            };

            let position = t.vertical_axis * (cursor + t.offset * horizontal_scale);
            cursor += direction * segment_height;
            out.push(SegmentPlacement {
                name: t.name.clone(),
                position,
                scale: axis_blend(&t.vertical_axis, height_scale, horizontal_scale),
                segment_height,
                height_scale,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seg(name: &str, height: f64, can_scale: bool) -> CompoundTransformDescriptor {
        CompoundTransformDescriptor {
            name: name.into(),
            height,
            can_scale_height: can_scale,
            offset: 0.0,
            vertical_axis: Vec3::y(),
            order: 0,
        }
    }

    #[test]
    fn fixed_cap_and_stretched_body() {
        let data = CompoundModelData {
            transforms: vec![seg("A", 1.0, false), seg("B", 3.0, true)],
        };
        // height 4 at vertical scale 1.5
        let out = data.distribute(6.0, 1.0, 1.0);
        assert_relative_eq!(data.static_height(1.0), 1.0);

        assert_relative_eq!(out[0].position.y, 0.0);
        assert_relative_eq!(out[0].height_scale, 1.0);
        assert_relative_eq!(out[0].segment_height, 1.0);

        assert_relative_eq!(out[1].segment_height, 5.0);
        assert_relative_eq!(out[1].height_scale, 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(out[1].position.y, 1.0);
        assert_relative_eq!(out[1].scale.x, 1.0);
        assert_relative_eq!(out[1].scale.y, 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn segment_heights_sum_to_desired_height() {
        let data = CompoundModelData {
            transforms: vec![
                seg("a", 0.5, false),
                seg("b", 2.0, true),
                seg("c", 0.25, false),
                seg("d", 1.0, true),
            ],
        };
        for (desired, h) in [(5.0, 1.0), (9.0, 2.0), (1.5, 2.0), (3.75, 0.5)] {
            let total: f64 = data
                .distribute(desired, h, 1.0)
                .iter()
                .map(|p| p.segment_height)
                .sum();
            assert_relative_eq!(total, desired, epsilon = 1e-9);
        }
    }

    #[test]
    fn fixed_segments_follow_horizontal_scale() {
        let data = CompoundModelData {
            transforms: vec![seg("cap", 1.0, false), seg("body", 2.0, true)],
        };
        let out = data.distribute(6.0, 2.0, 1.0);
        assert_relative_eq!(out[0].segment_height, 2.0);
        assert_relative_eq!(out[0].scale.y, 2.0);
        assert_relative_eq!(out[1].segment_height, 4.0);
        assert_relative_eq!(out[1].height_scale, 2.0);
        assert_relative_eq!(out[1].scale.x, 2.0);
    }

    #[test]
    fn bottom_stacks_downward() {
        let data = CompoundModelData {
            transforms: vec![seg("a", 1.0, false), seg("b", 1.0, false)],
        };
        let out = data.distribute(2.0, 1.0, -1.0);
        assert_relative_eq!(out[1].position.y, -1.0);
    }

    #[test]
    fn offset_scales_with_horizontal_scale() {
        let mut a = seg("a", 1.0, false);
        a.offset = 0.5;
        let data = CompoundModelData { transforms: vec![a] };
        let out = data.distribute(2.0, 2.0, 1.0);
        assert_relative_eq!(out[0].position.y, 1.0);
    }

    #[test]
    fn overfull_static_height_collapses_stretchable_segments() {
        let data = CompoundModelData {
            transforms: vec![seg("a", 3.0, false), seg("b", 1.0, true)],
        };
        let out = data.distribute(2.0, 1.0, 1.0);
        assert_relative_eq!(out[1].segment_height, 0.0);
        assert_relative_eq!(out[1].height_scale, 0.0);
        assert!(out.iter().all(|p| p.height_scale >= 0.0));
    }

    #[test]
    fn parses_and_orders_transforms() {
        let node = partkit_cfg::parse(
            r#"
COMPOUNDMODEL
{
    TRANSFORM
    {
        name = top
        height = 1
        order = 2
    }
    TRANSFORM
    {
        name = body
        canScale = true
        height = 3
        order = 1
        axis = 0,0,1
    }
}
"#,
        )
        .unwrap();
        let data = CompoundModelData::from_config(node.node("COMPOUNDMODEL").unwrap(), "test");
        assert_eq!(data.transforms[0].name, "body");
        assert!(data.transforms[0].can_scale_height);
        assert_relative_eq!(data.transforms[0].vertical_axis.z, 1.0);
        assert_eq!(data.transforms[1].name, "top");
        assert_relative_eq!(data.scalable_base_height(), 3.0);
    }
}
