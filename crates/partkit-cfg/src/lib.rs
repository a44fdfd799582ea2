#![warn(missing_docs)]

//! Hierarchical key/value record format for partkit content.
//!
//! Content files are trees of named records. Each record holds an ordered
//! list of `key = value` pairs (keys may repeat) and an ordered list of
//! child records:
//!
//! ```text
//! // comments run to end of line
//! MODEL_DEFINITION
//! {
//!     name = tank-2.5
//!     height = 4
//!     upperProfile = size2
//!     upperProfile = size2-slim
//!     SUBMODEL { modelName = Assets/Tank }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use partkit_cfg::parse;
//!
//! let root = parse("PART\n{\n  name = a\n  height = 2.5\n}\n").unwrap();
//! let part = root.node("PART").unwrap();
//! assert_eq!(part.value("name"), Some("a"));
//! assert_eq!(part.parse_f64("height").unwrap(), Some(2.5));
//! ```

mod error;
mod lexer;
mod node;
mod parser;

pub use error::CfgError;
pub use lexer::{Lexer, Position, SpannedToken, Token};
pub use node::{parse_bool, parse_csv_f64, parse_vec3, ConfigNode, ConfigValue};
pub use parser::{parse, parse_file, Parser};
