//! Which end of a model's authored geometry sits at its local origin.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Orientation of a model, either as authored or as used in a slot.
///
/// - `Top`: geometry extends upward from the origin (`[0, h]`).
/// - `Central`: geometry is centred on the origin (`[-h/2, h/2]`).
/// - `Bottom`: geometry extends downward from the origin (`[-h, 0]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelOrientation {
    /// Mounted on top of the slot origin.
    #[default]
    Top,
    /// Centred on the slot origin.
    Central,
    /// Hanging below the slot origin.
    Bottom,
}

impl ModelOrientation {
    /// Parse `TOP`, `CENTRAL` or `BOTTOM` (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TOP" => Some(Self::Top),
            "CENTRAL" => Some(Self::Central),
            "BOTTOM" => Some(Self::Bottom),
            _ => None,
        }
    }

    /// Parse an authored value, logging and falling back to `Top`.
    pub fn parse_or_default(raw: &str, context: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            warn!("{}: unknown orientation '{}', using TOP", context, raw);
            Self::Top
        })
    }

    /// Direction segments stack in from the origin: `-1` for `Bottom`, else `+1`.
    pub fn stack_direction(self) -> f64 {
        match self {
            Self::Bottom => -1.0,
            Self::Top | Self::Central => 1.0,
        }
    }

    /// Whether a model authored as `self` must be flipped end-over-end when
    /// used as `use_orientation`. `Central` on either side never flips.
    pub fn inverts_for(self, use_orientation: ModelOrientation) -> bool {
        matches!(
            (self, use_orientation),
            (Self::Top, Self::Bottom) | (Self::Bottom, Self::Top)
        )
    }

    /// Offset of the top end from the origin, as a fraction of height.
    pub fn top_fraction(self) -> f64 {
        match self {
            Self::Top => 1.0,
            Self::Central => 0.5,
            Self::Bottom => 0.0,
        }
    }
}

impl fmt::Display for ModelOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "TOP",
            Self::Central => "CENTRAL",
            Self::Bottom => "BOTTOM",
        })
    }
}
