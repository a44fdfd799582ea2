//! The record tree and its typed accessors.

use crate::error::CfgError;
use crate::parser::ROOT_NAME;
use partkit_math::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as FmtWrite};

/// A single `key = value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    /// Key text.
    pub key: String,
    /// Raw value text.
    pub value: String,
}

/// A named record with ordered values and child records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigNode {
    /// Record name (`MODEL_DEFINITION`, `SUBMODEL`, ...).
    pub name: String,
    /// Values in authored order; keys may repeat.
    pub values: Vec<ConfigValue>,
    /// Child records in authored order.
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    /// Create an empty record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Append a value.
    pub fn add_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.push(ConfigValue {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Builder-style [`add_value`](Self::add_value).
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_value(key, value);
        self
    }

    /// Append a child record.
    pub fn add_node(&mut self, node: ConfigNode) {
        self.nodes.push(node);
    }

    /// Builder-style [`add_node`](Self::add_node).
    pub fn with_node(mut self, node: ConfigNode) -> Self {
        self.add_node(node);
        self
    }

    /// True when the record has neither values nor children.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.nodes.is_empty()
    }

    /// Whether at least one value with `key` exists.
    pub fn has_value(&self, key: &str) -> bool {
        self.values.iter().any(|v| v.key == key)
    }

    /// First value with `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    /// All values with `key`, in authored order.
    pub fn values_of(&self, key: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|v| v.key == key)
            .map(|v| v.value.as_str())
            .collect()
    }

    /// First child record named `name`.
    pub fn node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// All child records named `name`, in authored order.
    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    /// First value with `key` parsed as a float.
    pub fn parse_f64(&self, key: &str) -> Result<Option<f64>, CfgError> {
        self.value(key)
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| CfgError::invalid(key, raw, "number"))
            })
            .transpose()
    }

    /// First value with `key` parsed as an integer.
    pub fn parse_i64(&self, key: &str) -> Result<Option<i64>, CfgError> {
        self.value(key)
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| CfgError::invalid(key, raw, "integer"))
            })
            .transpose()
    }

    /// First value with `key` parsed as a boolean.
    pub fn parse_bool(&self, key: &str) -> Result<Option<bool>, CfgError> {
        self.value(key)
            .map(|raw| parse_bool(raw).ok_or_else(|| CfgError::invalid(key, raw, "boolean")))
            .transpose()
    }

    /// First value with `key` parsed as an `x,y,z` vector.
    pub fn parse_vec3(&self, key: &str) -> Result<Option<Vec3>, CfgError> {
        self.value(key)
            .map(|raw| parse_vec3(raw).ok_or_else(|| CfgError::invalid(key, raw, "vector")))
            .transpose()
    }

    /// First value with `key` parsed as a comma-separated float list.
    pub fn parse_csv_f64(&self, key: &str) -> Result<Option<Vec<f64>>, CfgError> {
        self.value(key)
            .map(|raw| parse_csv_f64(raw).ok_or_else(|| CfgError::invalid(key, raw, "number list")))
            .transpose()
    }

    /// Render the record back to text. The root record is written without
    /// its own braces.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.name == ROOT_NAME {
            for v in &self.values {
                let _ = writeln!(out, "{} = {}", v.key, v.value);
            }
            for n in &self.nodes {
                n.write_indented(&mut out, 0);
            }
        } else {
            self.write_indented(&mut out, 0);
        }
        out
    }

    fn write_indented(&self, out: &mut String, depth: usize) {
        let pad = "\t".repeat(depth);
        let _ = writeln!(out, "{pad}{}", self.name);
        let _ = writeln!(out, "{pad}{{");
        for v in &self.values {
            let _ = writeln!(out, "{pad}\t{} = {}", v.key, v.value);
        }
        for n in &self.nodes {
            n.write_indented(out, depth + 1);
        }
        let _ = writeln!(out, "{pad}}}");
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Parse `true/false/yes/no/1/0` (case-insensitive).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a comma-separated list of floats. Empty input yields `None`.
pub fn parse_csv_f64(raw: &str) -> Option<Vec<f64>> {
    if raw.trim().is_empty() {
        return None;
    }
    raw.split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// Parse an `x,y,z` vector.
pub fn parse_vec3(raw: &str) -> Option<Vec3> {
    match parse_csv_f64(raw)?.as_slice() {
        [x, y, z] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> ConfigNode {
        ConfigNode::new("PART")
            .with_value("height", "2.5")
            .with_value("count", "3")
            .with_value("flag", "True")
            .with_value("axis", "0, 1, 0")
            .with_value("bad", "two")
            .with_node(ConfigNode::new("CHILD").with_value("k", "v"))
    }

    #[test]
    fn typed_accessors() {
        let n = sample();
        assert_relative_eq!(n.parse_f64("height").unwrap().unwrap(), 2.5);
        assert_eq!(n.parse_i64("count").unwrap(), Some(3));
        assert_eq!(n.parse_bool("flag").unwrap(), Some(true));
        let axis = n.parse_vec3("axis").unwrap().unwrap();
        assert_relative_eq!(axis.y, 1.0);
        assert_eq!(n.parse_f64("missing").unwrap(), None);
    }

    #[test]
    fn malformed_value_reports_key_and_text() {
        let err = sample().parse_f64("bad").unwrap_err();
        match err {
            CfgError::InvalidValue {
                key,
                value,
                expected,
            } => {
                assert_eq!(key, "bad");
                assert_eq!(value, "two");
                assert_eq!(expected, "number");
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn vec3_requires_three_components() {
        assert!(parse_vec3("1,2").is_none());
        assert!(parse_vec3("1,2,3,4").is_none());
        assert!(parse_vec3("").is_none());
        assert!(parse_vec3("1,x,3").is_none());
    }

    #[test]
    fn to_text_nests_children() {
        let text = sample().to_text();
        assert!(text.starts_with("PART\n{\n"));
        assert!(text.contains("\tCHILD\n\t{\n\t\tk = v\n\t}\n"));
        assert!(text.ends_with("}\n"));
    }
}
