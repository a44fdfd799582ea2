//! Error types for definition loading and instance management.

use partkit_cfg::CfgError;
use thiserror::Error;

/// Errors surfaced by partkit.
///
/// Configuration problems inside individual records are logged and replaced
/// by defaults rather than returned; these variants cover the cases that
/// callers must handle (file access, zero-layout option sets, malformed
/// persisted state).
#[derive(Error, Debug)]
pub enum ModelError {
    /// Record text could not be read or parsed.
    #[error("Record error: {0}")]
    Cfg(#[from] CfgError),

    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing model definition.
    #[error("Model definition not found: {0}")]
    UnknownDefinition(String),

    /// Missing model layout.
    #[error("Model layout not found: {0}")]
    UnknownLayout(String),

    /// A definition was offered with no layout that resolves.
    #[error("Model definition '{0}' has no valid layouts")]
    NoLayouts(String),

    /// A slot was created with an empty option list.
    #[error("Slot '{0}' has no model definitions to choose from")]
    NoDefinitions(String),

    /// Persisted mask-colour string is malformed.
    #[error("Invalid color string '{value}': {reason}")]
    InvalidColors {
        /// The offending text.
        value: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Engine settings file failed to parse.
    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    /// Persisted module state failed to (de)serialize.
    #[error("State error: {0}")]
    State(#[from] serde_json::Error),

    /// An operation failed on one member of a symmetry group.
    #[error("Symmetry member {index} failed: {source}")]
    Counterpart {
        /// Position of the failing member (0 = primary).
        index: usize,
        /// The member's error.
        source: Box<ModelError>,
    },
}

impl ModelError {
    /// Create an invalid-colours error.
    pub fn invalid_colors(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidColors {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for partkit operations.
pub type Result<T> = std::result::Result<T, ModelError>;
