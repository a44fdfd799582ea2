//! Error types for record parsing.

use thiserror::Error;

/// Errors that can occur while reading content records.
#[derive(Error, Debug)]
pub enum CfgError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Lexer error: a line could not be tokenized.
    #[error("Lexer error at line {line}, column {col}: {message}")]
    Lexer {
        /// Line number (1-indexed).
        line: usize,
        /// Column number (1-indexed).
        col: usize,
        /// Error message.
        message: String,
    },

    /// Parser error: braces or record names out of place.
    #[error("Parser error at line {line}: {message}")]
    Parser {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },

    /// A value exists but does not parse as the requested type.
    #[error("Invalid value for '{key}': '{value}' is not a valid {expected}")]
    InvalidValue {
        /// Key of the offending value.
        key: String,
        /// Raw text of the value.
        value: String,
        /// Name of the expected type.
        expected: &'static str,
    },
}

impl CfgError {
    /// Create a lexer error.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(line: usize, message: impl Into<String>) -> Self {
        Self::Parser {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid(key: &str, value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}
