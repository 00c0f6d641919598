//! Operations on YAML value trees: deep merge, dotted-path access, and the
//! `???` mandatory marker.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};

/// Marker for a value that must be supplied before the config is usable
pub const MISSING: &str = "???";

/// Whether `value` is the mandatory marker
pub fn is_missing(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == MISSING)
}

/// Merge `overlay` into `base`.
///
/// Mappings merge key by key, recursively. Any other overlay value (scalar,
/// sequence, null) replaces what `base` holds.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|s| !s.is_empty())
}

/// Look up a dotted key such as `dataset.train.mix_p`
pub fn get_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(key) {
        current = current.as_mapping()?.get(segment)?;
    }
    Some(current)
}

/// Set a dotted key, creating intermediate mappings as needed.
///
/// Null intermediates are replaced with mappings; any other non-mapping
/// intermediate is an error.
pub fn set_path(root: &mut Value, key: &str, value: Value) -> Result<()> {
    let parts: Vec<&str> = segments(key).collect();
    let Some((last, parents)) = parts.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        let map = current.as_mapping_mut().ok_or_else(|| {
            Error::ConfigError(format!(
                "cannot set '{key}': '{}' is not a mapping",
                parts[..depth].join(".")
            ))
        })?;
        current = map
            .entry(Value::String((*segment).to_string()))
            .or_insert(Value::Null);
    }

    if current.is_null() {
        *current = Value::Mapping(Mapping::new());
    }
    let map = current.as_mapping_mut().ok_or_else(|| {
        Error::ConfigError(format!(
            "cannot set '{key}': '{}' is not a mapping",
            parents.join(".")
        ))
    })?;
    map.insert(Value::String((*last).to_string()), value);
    Ok(())
}

/// Remove a dotted key, returning the removed value
pub fn remove_path(root: &mut Value, key: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(key).collect();
    let (last, parents) = parts.split_last()?;

    let mut current = root;
    for segment in parents {
        current = current.as_mapping_mut()?.get_mut(*segment)?;
    }
    current.as_mapping_mut()?.remove(*last)
}

/// Nest `body` under a dotted package. The empty package is the root.
pub fn place_at_package(body: Value, package: &str) -> Value {
    segments(package)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .fold(body, |inner, segment| {
            let mut map = Mapping::new();
            map.insert(Value::String(segment.to_string()), inner);
            Value::Mapping(map)
        })
}

/// Dotted paths of every value still set to `???`, in document order
pub fn missing_keys(root: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_missing(root, &mut String::new(), &mut out);
    out
}

fn collect_missing(value: &Value, prefix: &mut String, out: &mut Vec<String>) {
    if is_missing(value) {
        out.push(prefix.clone());
        return;
    }
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let len = prefix.len();
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(&key_to_string(key));
                collect_missing(child, prefix, out);
                prefix.truncate(len);
            }
        }
        Value::Sequence(items) => {
            for (i, child) in items.iter().enumerate() {
                let len = prefix.len();
                prefix.push_str(&format!("[{i}]"));
                collect_missing(child, prefix, out);
                prefix.truncate(len);
            }
        }
        _ => {}
    }
}

/// Replace every `???` with null so optional typed fields read as `None`
pub fn strip_missing(value: &mut Value) {
    if is_missing(value) {
        *value = Value::Null;
        return;
    }
    match value {
        Value::Mapping(map) => map.iter_mut().for_each(|(_, v)| strip_missing(v)),
        Value::Sequence(items) => items.iter_mut().for_each(strip_missing),
        _ => {}
    }
}

pub(crate) fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
