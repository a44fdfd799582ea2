//! Engine-wide settings, parsed from `partkit.toml`.
//!
//! ```toml
//! default_layout = "default"
//! log_filter = "partkit=debug"
//!
//! [scale_powers]
//! mass = 3.0
//! cost = 2.0
//! volume = 3.0
//! ```
//!
//! Every field is optional.

use crate::error::Result;
use crate::layout::DEFAULT_LAYOUT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Exponents for stat scaling.
    #[serde(default)]
    pub scale_powers: ScalePowers,
    /// Layout used when a slot names none.
    #[serde(default = "default_layout")]
    pub default_layout: String,
    /// `tracing` filter directive used by tools.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

/// Exponent applied to the average scale for each derived stat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalePowers {
    /// Mass exponent.
    #[serde(default = "default_power")]
    pub mass: f64,
    /// Cost exponent.
    #[serde(default = "default_power")]
    pub cost: f64,
    /// Volume exponent.
    #[serde(default = "default_power")]
    pub volume: f64,
}

fn default_power() -> f64 {
    3.0
}

fn default_layout() -> String {
    DEFAULT_LAYOUT.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ScalePowers {
    fn default() -> Self {
        Self {
            mass: default_power(),
            cost: default_power(),
            volume: default_power(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scale_powers: ScalePowers::default(),
            default_layout: default_layout(),
            log_filter: default_log_filter(),
        }
    }
}

impl EngineSettings {
    /// Parse settings text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let s = EngineSettings::from_toml("").unwrap();
        assert_eq!(s, EngineSettings::default());
        assert_eq!(s.scale_powers.mass, 3.0);
        assert_eq!(s.default_layout, "default");
        assert_eq!(s.log_filter, "info");
    }

    #[test]
    fn partial_tables_fill_in() {
        let s = EngineSettings::from_toml("[scale_powers]\ncost = 2.0\n").unwrap();
        assert_eq!(s.scale_powers.cost, 2.0);
        assert_eq!(s.scale_powers.volume, 3.0);
    }

    #[test]
    fn malformed_settings_error() {
        assert!(EngineSettings::from_toml("scale_powers = 3").is_err());
    }
}
