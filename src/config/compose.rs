//! Composition of a config from its defaults tree and overrides
//!
//! The primary config is expanded depth-first through its defaults list.
//! Every fragment body is merged at its `_self_` position under its package,
//! later fragments winning. `override` entries anywhere in the tree change
//! which option a group selects; since an override may target a group that
//! was expanded before it, expansion is repeated until the set of overrides
//! no longer changes.

use super::defaults::{parse_fragment, resolve_package, DefaultsEntry};
use super::interpolate::resolve_interpolations;
use super::merge::{deep_merge, get_path, missing_keys, place_at_package, strip_missing};
use super::overrides::{parse_overrides, Override, OverrideKind};
use super::schema::SolverConfig;
use super::source::SearchPath;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Expansion passes before giving up on overrides that keep changing
const MAX_PASSES: usize = 8;

const COMMAND_LINE: &str = "command line";

/// One fragment merged into the composed config
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentTrace {
    /// Fragment path in the search path
    pub path: String,
    /// Dotted package the body was merged under, empty for the root
    pub package: String,
    /// Source the fragment was read from
    pub source: String,
}

/// Option picked for a config group, and who picked it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Choice {
    option: Option<String>,
    origin: String,
}

enum Item {
    Body(Value, FragmentTrace),
    Node(Node),
}

struct Node {
    items: Vec<Item>,
}

impl Node {
    fn merge_into(self, acc: &mut Value, traces: &mut Vec<FragmentTrace>) {
        for item in self.items {
            match item {
                Item::Body(body, trace) => {
                    deep_merge(acc, body);
                    traces.push(trace);
                }
                Item::Node(node) => node.merge_into(acc, traces),
            }
        }
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// One pass over the defaults tree
struct Expansion<'a> {
    search_path: &'a SearchPath,
    /// Choices in force for this pass
    choices: BTreeMap<String, Choice>,
    /// Overrides declared by fragments, found during this pass
    discovered: BTreeMap<String, Choice>,
    /// Groups selected somewhere in the tree
    used: BTreeSet<String>,
    stack: Vec<String>,
}

impl<'a> Expansion<'a> {
    fn discover_override(&mut self, group: String, option: Option<String>, origin: &str) -> Result<()> {
        if let Some(choice) = self.choices.get(&group) {
            if choice.origin == COMMAND_LINE {
                return Ok(());
            }
        }
        match self.discovered.get(&group) {
            Some(existing) if existing.option != option => Err(Error::Compose(format!(
                "conflicting overrides for '{group}': {:?} in '{}' and {:?} in '{origin}'",
                existing.option, existing.origin, option
            ))),
            Some(_) => Ok(()),
            None => {
                self.discovered.insert(
                    group,
                    Choice {
                        option,
                        origin: origin.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Load `path` and expand its defaults list.
    ///
    /// `group` is the group the fragment belongs to: relative entries
    /// resolve against it and the body lands under it without a header.
    fn load(&mut self, path: &str, group: &str) -> Result<Node> {
        if self.stack.iter().any(|p| p == path) {
            return Err(Error::Compose(format!(
                "defaults cycle: {} -> {path}",
                self.stack.join(" -> ")
            )));
        }

        let fragment = self.search_path.require(path)?;
        let parsed = parse_fragment(path, &fragment.content)?;
        let package = resolve_package(parsed.package_header.as_deref(), group);
        tracing::debug!(path, package = %package, source = %fragment.source, "loading fragment");

        for entry in &parsed.defaults {
            if let DefaultsEntry::Group {
                option,
                is_override: true,
                ..
            } = entry
            {
                if let Some(target) = entry.resolve(group) {
                    self.discover_override(target, option.clone(), path)?;
                }
            }
        }

        let trace = FragmentTrace {
            path: path.to_string(),
            package: package.clone(),
            source: fragment.source,
        };
        let mut body = Some(place_at_package(parsed.body, &package));
        let mut items = Vec::new();

        self.stack.push(path.to_string());
        for entry in &parsed.defaults {
            match entry {
                DefaultsEntry::SelfRef => {
                    if let Some(body) = body.take() {
                        items.push(Item::Body(body, trace.clone()));
                    }
                }
                DefaultsEntry::Config { .. } => {
                    if let Some(target) = entry.resolve(group) {
                        let node = self.load(&target, parent_dir(&target))?;
                        items.push(Item::Node(node));
                    }
                }
                DefaultsEntry::Group {
                    is_override: true, ..
                } => {}
                DefaultsEntry::Group {
                    option, optional, ..
                } => {
                    let Some(target_group) = entry.resolve(group) else {
                        continue;
                    };
                    if let Some(node) = self.select(&target_group, option.clone(), *optional)? {
                        items.push(Item::Node(node));
                    }
                }
            }
        }
        self.stack.pop();

        if let Some(body) = body {
            items.push(Item::Body(body, trace));
        }
        Ok(Node { items })
    }

    fn select(&mut self, group: &str, declared: Option<String>, optional: bool) -> Result<Option<Node>> {
        self.used.insert(group.to_string());
        let option = match self.choices.get(group) {
            Some(choice) => choice.option.clone(),
            None => declared,
        };
        let Some(option) = option else {
            return Ok(None);
        };

        let path = format!("{group}/{option}");
        if optional && self.search_path.load(&path)?.is_none() {
            tracing::debug!(group, option = %option, "optional option not found, skipping");
            return Ok(None);
        }
        self.load(&path, group).map(Some)
    }
}

/// Composes configs from a [`SearchPath`]
pub struct Composer {
    search_path: SearchPath,
}

impl Composer {
    pub fn new(search_path: SearchPath) -> Self {
        Self { search_path }
    }

    /// Composer over the shipped tree only
    pub fn builtin() -> Self {
        Self::new(SearchPath::builtin())
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Compose `config_name` with command-line `overrides`
    pub fn compose<S: AsRef<str>>(&self, config_name: &str, overrides: &[S]) -> Result<ComposedConfig> {
        let parsed = parse_overrides(overrides)?;
        let (group_overrides, value_overrides): (Vec<Override>, Vec<Override>) = parsed
            .into_iter()
            .partition(|o| self.search_path.is_group(&o.key));

        let mut cli_choices = BTreeMap::new();
        let mut appended = Vec::new();
        for o in &group_overrides {
            let group = o.key.trim_matches('/').to_string();
            match o.kind {
                OverrideKind::Set | OverrideKind::ForceAdd => {
                    cli_choices.insert(
                        group,
                        Choice {
                            option: o.option_name(),
                            origin: COMMAND_LINE.to_string(),
                        },
                    );
                }
                OverrideKind::Delete => {
                    cli_choices.insert(
                        group,
                        Choice {
                            option: None,
                            origin: COMMAND_LINE.to_string(),
                        },
                    );
                }
                OverrideKind::Add => appended.push((group, o)),
            }
        }

        let config_name = config_name.trim_matches('/');
        let mut fragment_overrides: BTreeMap<String, Choice> = BTreeMap::new();

        for pass in 0..MAX_PASSES {
            let mut choices = fragment_overrides.clone();
            choices.extend(cli_choices.clone());

            let mut expansion = Expansion {
                search_path: &self.search_path,
                choices,
                discovered: BTreeMap::new(),
                used: BTreeSet::new(),
                stack: Vec::new(),
            };
            let mut root = expansion.load(config_name, parent_dir(config_name))?;

            if expansion.discovered != fragment_overrides {
                tracing::debug!(
                    pass,
                    overrides = expansion.discovered.len(),
                    "defaults overrides changed, expanding again"
                );
                fragment_overrides = expansion.discovered;
                continue;
            }

            for (group, o) in &appended {
                if expansion.used.contains(group) {
                    return Err(Error::InvalidOverride {
                        text: o.text.clone(),
                        reason: format!("group '{group}' is already selected, drop the leading '+'"),
                    });
                }
                if let Some(node) = expansion.select(group, o.option_name(), false)? {
                    root.items.push(Item::Node(node));
                }
            }

            for (group, choice) in cli_choices.iter().chain(fragment_overrides.iter()) {
                if !expansion.used.contains(group) {
                    return Err(Error::Compose(format!(
                        "could not override '{group}' (from {}): no match in the defaults list",
                        choice.origin
                    )));
                }
            }

            let mut tree = Value::Mapping(Mapping::new());
            let mut fragments = Vec::new();
            root.merge_into(&mut tree, &mut fragments);

            for o in &value_overrides {
                tracing::debug!(text = %o.text, "applying override");
                o.apply(&mut tree)?;
            }

            resolve_interpolations(&mut tree)?;

            tracing::info!(
                config = config_name,
                fragments = fragments.len(),
                overrides = overrides.len(),
                "composed config"
            );

            return Ok(ComposedConfig {
                config_name: config_name.to_string(),
                tree,
                fragments,
                overrides: overrides.iter().map(|o| o.as_ref().to_string()).collect(),
            });
        }

        Err(Error::Compose(format!(
            "defaults-list overrides did not settle after {MAX_PASSES} passes"
        )))
    }
}

/// Result of a composition
#[derive(Debug, Clone)]
pub struct ComposedConfig {
    config_name: String,
    tree: Value,
    fragments: Vec<FragmentTrace>,
    overrides: Vec<String>,
}

impl ComposedConfig {
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn into_tree(self) -> Value {
        self.tree
    }

    /// Fragments in merge order
    pub fn fragments(&self) -> &[FragmentTrace] {
        &self.fragments
    }

    pub fn overrides(&self) -> &[String] {
        &self.overrides
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        get_path(&self.tree, key)
    }

    /// Keys still set to `???`
    pub fn missing_keys(&self) -> Vec<String> {
        missing_keys(&self.tree)
    }

    /// Fail when any mandatory value is unset
    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing_keys();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingMandatory(missing))
        }
    }

    /// Typed view; unset mandatory values read as absent
    pub fn typed(&self) -> Result<SolverConfig> {
        let mut tree = self.tree.clone();
        strip_missing(&mut tree);
        serde_yaml::from_value(tree).map_err(|e| {
            let missing = self.missing_keys();
            if missing.is_empty() {
                Error::ConfigError(format!("Failed to read composed config: {e}"))
            } else {
                Error::ConfigError(format!(
                    "Failed to read composed config: {e} (unset: {})",
                    missing.join(", ")
                ))
            }
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.tree)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }
}
