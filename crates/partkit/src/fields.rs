//! Lenient typed reads from content records.
//!
//! A malformed value is a configuration error: it is logged against the
//! record being parsed and the default is used, so one bad field never
//! aborts loading the rest of the record.

use partkit_cfg::ConfigNode;
use partkit_math::Vec3;
use tracing::warn;

pub(crate) fn read_f64(node: &ConfigNode, key: &str, default: f64, context: &str) -> f64 {
    read_opt_f64(node, key, context).unwrap_or(default)
}

pub(crate) fn read_opt_f64(node: &ConfigNode, key: &str, context: &str) -> Option<f64> {
    match node.parse_f64(key) {
        Ok(v) => v,
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}

pub(crate) fn read_i64(node: &ConfigNode, key: &str, default: i64, context: &str) -> i64 {
    match node.parse_i64(key) {
        Ok(v) => v.unwrap_or(default),
        Err(e) => {
            warn!("{}: {}", context, e);
            default
        }
    }
}

pub(crate) fn read_bool(node: &ConfigNode, key: &str, default: bool, context: &str) -> bool {
    match node.parse_bool(key) {
        Ok(v) => v.unwrap_or(default),
        Err(e) => {
            warn!("{}: {}", context, e);
            default
        }
    }
}

pub(crate) fn read_vec3(node: &ConfigNode, key: &str, default: Vec3, context: &str) -> Vec3 {
    match node.parse_vec3(key) {
        Ok(v) => v.unwrap_or(default),
        Err(e) => {
            warn!("{}: {}", context, e);
            default
        }
    }
}

pub(crate) fn read_string(node: &ConfigNode, key: &str) -> Option<String> {
    node.value(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn read_strings(node: &ConfigNode, key: &str) -> Vec<String> {
    node.values_of(key)
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
