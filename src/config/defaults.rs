//! Defaults-list parsing
//!
//! A fragment may open with a `defaults:` list naming the fragments merged
//! before (or after, around `_self_`) its own body:
//!
//! ```yaml
//! # @package __global__
//! defaults:
//!   - audiogen/default
//!   - /model: lm/audiogen_lm
//!   - override /dset: audio/default
//!   - _self_
//! ```

use crate::error::{Error, Result};
use serde_yaml::Value;

const SELF_KEYWORD: &str = "_self_";
const GLOBAL_PACKAGES: &[&str] = &["_global_", "__global__"];
const GROUP_PACKAGE: &str = "_group_";

/// One entry of a defaults list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsEntry {
    /// `_self_`: the fragment's own body
    SelfRef,

    /// `name`, `dir/name` or `/abs/name`
    Config { path: String, absolute: bool },

    /// `group: option`, optionally prefixed with `override` or `optional`
    Group {
        group: String,
        absolute: bool,
        /// `None` for `group: null`
        option: Option<String>,
        optional: bool,
        is_override: bool,
    },
}

impl DefaultsEntry {
    /// Absolute path of the referenced config or group, given the group of
    /// the fragment that declares the entry
    pub fn resolve(&self, parent_group: &str) -> Option<String> {
        match self {
            DefaultsEntry::SelfRef => None,
            DefaultsEntry::Config { path, absolute } => {
                Some(join_group(parent_group, path, *absolute))
            }
            DefaultsEntry::Group {
                group, absolute, ..
            } => Some(join_group(parent_group, group, *absolute)),
        }
    }
}

fn join_group(parent: &str, name: &str, absolute: bool) -> String {
    let name = name.trim_start_matches('/');
    if absolute || parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// A fragment split into its parts
#[derive(Debug, Clone)]
pub struct ParsedFragment {
    /// Value of a `# @package` header, if any
    pub package_header: Option<String>,
    pub defaults: Vec<DefaultsEntry>,
    /// Everything except `defaults`
    pub body: Value,
}

impl ParsedFragment {
    /// Position of `_self_` in the defaults list; implied at the end
    pub fn self_position(&self) -> usize {
        self.defaults
            .iter()
            .position(|e| *e == DefaultsEntry::SelfRef)
            .unwrap_or(self.defaults.len())
    }
}

/// Parse a fragment's header, defaults list and body
pub fn parse_fragment(path: &str, content: &str) -> Result<ParsedFragment> {
    let package_header = package_header(content);

    let mut body: Value = if content.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(content).map_err(|e| {
            Error::ConfigError(format!("Failed to parse YAML config '{path}': {e}"))
        })?
    };
    if body.is_null() {
        body = Value::Mapping(Default::default());
    }

    let map = body.as_mapping_mut().ok_or_else(|| {
        Error::ConfigError(format!("Config '{path}' must be a mapping at the top level"))
    })?;

    let defaults = match map.remove("defaults") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| parse_entry(path, item))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(Error::Compose(format!(
                "'{path}': defaults must be a list"
            )))
        }
    };

    let self_count = defaults
        .iter()
        .filter(|e| **e == DefaultsEntry::SelfRef)
        .count();
    if self_count > 1 {
        return Err(Error::Compose(format!(
            "'{path}': _self_ appears {self_count} times in the defaults list"
        )));
    }

    Ok(ParsedFragment {
        package_header,
        defaults,
        body,
    })
}

fn parse_entry(path: &str, item: &Value) -> Result<DefaultsEntry> {
    match item {
        Value::String(s) if s == SELF_KEYWORD => Ok(DefaultsEntry::SelfRef),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(Error::Compose(format!("'{path}': empty defaults entry")));
            }
            Ok(DefaultsEntry::Config {
                path: s.trim_start_matches('/').to_string(),
                absolute: s.starts_with('/'),
            })
        }
        Value::Mapping(map) if map.len() == 1 => {
            let (key, value) = map
                .iter()
                .next()
                .ok_or_else(|| Error::Compose(format!("'{path}': empty defaults entry")))?;
            let key = key
                .as_str()
                .ok_or_else(|| Error::Compose(format!("'{path}': group names must be strings")))?;

            let (is_override, optional, group) = split_keyword(key.trim());
            if group.is_empty() {
                return Err(Error::Compose(format!(
                    "'{path}': missing group name in '{key}'"
                )));
            }

            let option = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => {
                    return Err(Error::Compose(format!(
                        "'{path}': option for group '{group}' must be a name or null"
                    )))
                }
            };

            Ok(DefaultsEntry::Group {
                group: group.trim_start_matches('/').to_string(),
                absolute: group.starts_with('/'),
                option,
                optional,
                is_override,
            })
        }
        other => Err(Error::Compose(format!(
            "'{path}': unsupported defaults entry {other:?}"
        ))),
    }
}

fn split_keyword(key: &str) -> (bool, bool, &str) {
    if let Some(rest) = key.strip_prefix("override ") {
        (true, false, rest.trim())
    } else if let Some(rest) = key.strip_prefix("optional ") {
        (false, true, rest.trim())
    } else {
        (false, false, key)
    }
}

/// The `# @package` header among the leading comment lines
pub fn package_header(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with('#'))
        .find_map(|line| {
            line.trim_start_matches('#')
                .trim()
                .strip_prefix("@package")
                .map(|rest| rest.trim().to_string())
        })
}

/// Dotted package a fragment body is merged under.
///
/// `default_group` is the group the fragment was selected from; without a
/// header the body lands under that group.
pub fn resolve_package(header: Option<&str>, default_group: &str) -> String {
    let group_package = default_group.trim_matches('/').replace('/', ".");
    match header {
        None => group_package,
        Some(h) if GLOBAL_PACKAGES.contains(&h) => String::new(),
        Some(h) if h == GROUP_PACKAGE => group_package,
        Some(h) => h
            .split('.')
            .map(|part| {
                if part == GROUP_PACKAGE {
                    group_package.clone()
                } else {
                    part.to_string()
                }
            })
            .filter(|part| !part.is_empty() && !GLOBAL_PACKAGES.contains(&part.as_str()))
            .collect::<Vec<_>>()
            .join("."),
    }
}
