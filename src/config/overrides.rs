//! Command-line overrides
//!
//! ```text
//! optim.lr=0.0001            set an existing key
//! +dataset.train.seed=1      add a key that does not exist yet
//! ++logging.level=DEBUG      add or replace
//! ~metrics.kld               delete
//! solver=audiogen/other      select another option for a config group
//! ```

use super::merge::{get_path, remove_path, set_path};
use crate::error::{Error, Result};
use serde_yaml::Value;

/// How an override treats its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// `key=value`
    Set,
    /// `+key=value`
    Add,
    /// `++key=value`
    ForceAdd,
    /// `~key` or `~key=value`
    Delete,
}

/// A parsed `key=value` override
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub kind: OverrideKind,
    pub key: String,
    pub value: Option<Value>,
    pub text: String,
}

impl Override {
    /// Apply to a composed tree as a value override
    pub fn apply(&self, root: &mut Value) -> Result<()> {
        let exists = get_path(root, &self.key).is_some();
        match self.kind {
            OverrideKind::Set => {
                if !exists {
                    return Err(self.error(format!(
                        "key '{}' is not in the config, use +{} to add it",
                        self.key, self.text
                    )));
                }
                set_path(root, &self.key, self.value_or_null())
            }
            OverrideKind::Add => {
                if exists {
                    return Err(self.error(format!(
                        "key '{}' already exists, use ++{} to replace it",
                        self.key,
                        self.text.trim_start_matches('+')
                    )));
                }
                set_path(root, &self.key, self.value_or_null())
            }
            OverrideKind::ForceAdd => set_path(root, &self.key, self.value_or_null()),
            OverrideKind::Delete => {
                let current = get_path(root, &self.key)
                    .ok_or_else(|| self.error(format!("key '{}' is not in the config", self.key)))?;
                if let Some(expected) = &self.value {
                    if current != expected {
                        return Err(self.error(format!(
                            "key '{}' holds {}, not the given value",
                            self.key,
                            render(current)
                        )));
                    }
                }
                remove_path(root, &self.key);
                Ok(())
            }
        }
    }

    /// The value read as a config-group option name
    pub fn option_name(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(render(other)),
        }
    }

    fn value_or_null(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }

    fn error(&self, reason: String) -> Error {
        Error::InvalidOverride {
            text: self.text.clone(),
            reason,
        }
    }
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

/// Parse one override string
pub fn parse_override(text: &str) -> Result<Override> {
    let invalid = |reason: &str| Error::InvalidOverride {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = text.trim();
    let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("++") {
        (OverrideKind::ForceAdd, rest)
    } else if let Some(rest) = trimmed.strip_prefix('+') {
        (OverrideKind::Add, rest)
    } else if let Some(rest) = trimmed.strip_prefix('~') {
        (OverrideKind::Delete, rest)
    } else {
        (OverrideKind::Set, trimmed)
    };

    let (key, raw_value) = match rest.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (rest.trim(), None),
    };

    if key.is_empty() {
        return Err(invalid("missing key"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | '@'))
    {
        return Err(invalid("keys may only contain letters, digits, '_', '-', '.', '/' and '@'"));
    }
    if raw_value.is_none() && kind != OverrideKind::Delete {
        return Err(invalid("expected key=value"));
    }

    Ok(Override {
        kind,
        key: key.to_string(),
        value: raw_value.map(parse_value),
        text: trimmed.to_string(),
    })
}

/// Parse every override, stopping at the first bad one
pub fn parse_overrides<I, S>(texts: I) -> Result<Vec<Override>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .map(|t| parse_override(t.as_ref()))
        .collect()
}

fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
