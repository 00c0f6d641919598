//! `${dotted.key}` interpolation over a composed tree

use super::merge::{get_path, is_missing, MISSING};
use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};

/// Resolve every interpolation in `root` against `root` itself
pub fn resolve_interpolations(root: &mut Value) -> Result<()> {
    let snapshot = root.clone();
    let mut stack = Vec::new();
    *root = resolve_node(&snapshot, &snapshot, "", &mut stack)?;
    Ok(())
}

fn child_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn resolve_node(root: &Value, node: &Value, key: &str, stack: &mut Vec<String>) -> Result<Value> {
    match node {
        Value::String(s) if s.contains("${") => resolve_string(root, s, key, stack),
        Value::Mapping(map) => {
            let mut out = Mapping::new();
            for (k, v) in map {
                let name = super::merge::key_to_string(k);
                out.insert(k.clone(), resolve_node(root, v, &child_key(key, &name), stack)?);
            }
            Ok(Value::Mapping(out))
        }
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| resolve_node(root, v, &format!("{key}[{i}]"), stack))
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        other => Ok(other.clone()),
    }
}

/// A parsed piece of an interpolated string
enum Piece<'a> {
    Text(&'a str),
    Ref(&'a str),
}

fn split_pieces<'a>(s: &'a str, key: &str) -> Result<Vec<Piece<'a>>> {
    let mut pieces = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            pieces.push(Piece::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| Error::Interpolation {
            key: key.to_string(),
            reason: format!("unterminated reference in '{s}'"),
        })?;
        let reference = after[..end].trim();
        if reference.is_empty() || reference.contains("${") {
            return Err(Error::Interpolation {
                key: key.to_string(),
                reason: format!("malformed reference in '{s}'"),
            });
        }
        if reference.contains(':') {
            return Err(Error::Interpolation {
                key: key.to_string(),
                reason: format!("resolvers are not supported: '{reference}'"),
            });
        }
        pieces.push(Piece::Ref(reference));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

fn resolve_string(root: &Value, s: &str, key: &str, stack: &mut Vec<String>) -> Result<Value> {
    let pieces = split_pieces(s, key)?;

    if let [Piece::Ref(reference)] = pieces.as_slice() {
        return resolve_reference(root, reference, key, stack);
    }

    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Ref(reference) => {
                let value = resolve_reference(root, reference, key, stack)?;
                if is_missing(&value) {
                    return Ok(Value::String(MISSING.to_string()));
                }
                out.push_str(&scalar_to_string(&value).ok_or_else(|| Error::Interpolation {
                    key: key.to_string(),
                    reason: format!("'{reference}' is not a scalar and cannot be embedded in a string"),
                })?);
            }
        }
    }
    Ok(Value::String(out))
}

fn resolve_reference(
    root: &Value,
    reference: &str,
    key: &str,
    stack: &mut Vec<String>,
) -> Result<Value> {
    if stack.iter().any(|k| k == reference) || reference == key {
        let mut chain = stack.clone();
        chain.push(reference.to_string());
        return Err(Error::Interpolation {
            key: key.to_string(),
            reason: format!("reference cycle: {}", chain.join(" -> ")),
        });
    }

    let target = get_path(root, reference).ok_or_else(|| Error::Interpolation {
        key: key.to_string(),
        reason: format!("'{reference}' is not in the config"),
    })?;

    stack.push(reference.to_string());
    let resolved = resolve_node(root, target, reference, stack);
    stack.pop();
    resolved
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        _ => None,
    }
}
