//! Where config fragments are read from

use super::builtin::builtin_fragments;
use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// A tree of YAML fragments addressed by slash-separated paths
/// (`solver/audiogen/default`), without the `.yaml` extension.
pub trait ConfigSource: Send + Sync {
    /// Human-readable origin, used in traces and error messages
    fn name(&self) -> String;

    /// Read a fragment, `Ok(None)` when this source does not have it
    fn load(&self, path: &str) -> Result<Option<String>>;

    /// Whether `path` is a config group (a directory of options)
    fn is_group(&self, path: &str) -> bool;
}

/// Fragments stored as `<root>/<path>.yaml` on disk
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ConfigSource for DirSource {
    fn name(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn load(&self, path: &str) -> Result<Option<String>> {
        let file = self.root.join(format!("{path}.yaml"));
        if !file.is_file() {
            return Ok(None);
        }
        fs::read_to_string(&file).map(Some).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {e}", file.display()))
        })
    }

    fn is_group(&self, path: &str) -> bool {
        !path.is_empty() && self.root.join(path).is_dir()
    }
}

/// The tree embedded in the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl ConfigSource for BuiltinSource {
    fn name(&self) -> String {
        "builtin".to_string()
    }

    fn load(&self, path: &str) -> Result<Option<String>> {
        Ok(builtin_fragments()
            .iter()
            .find(|(name, _)| *name == path)
            .map(|(_, content)| (*content).to_string()))
    }

    fn is_group(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        !path.is_empty()
            && builtin_fragments()
                .iter()
                .any(|(name, _)| name.starts_with(&prefix))
    }
}

/// A fragment together with the source it came from
#[derive(Debug, Clone)]
pub struct LoadedFragment {
    pub path: String,
    pub source: String,
    pub content: String,
}

/// Ordered list of sources; the first one that has a fragment wins
#[derive(Default)]
pub struct SearchPath {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// User directories in order, then the builtin tree
    pub fn with_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut search_path = Self::new();
        for dir in dirs {
            search_path.push(DirSource::new(dir));
        }
        search_path.push(BuiltinSource);
        search_path
    }

    /// Only the builtin tree
    pub fn builtin() -> Self {
        Self::with_dirs(Vec::<PathBuf>::new())
    }

    pub fn push(&mut self, source: impl ConfigSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn load(&self, path: &str) -> Result<Option<LoadedFragment>> {
        for source in &self.sources {
            if let Some(content) = source.load(path)? {
                return Ok(Some(LoadedFragment {
                    path: path.to_string(),
                    source: source.name(),
                    content,
                }));
            }
        }
        Ok(None)
    }

    /// Like [`SearchPath::load`] but a missing fragment is an error
    pub fn require(&self, path: &str) -> Result<LoadedFragment> {
        self.load(path)?.ok_or_else(|| Error::ConfigNotFound {
            name: path.to_string(),
            searched: self.to_string(),
        })
    }

    pub fn is_group(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        self.sources.iter().any(|s| s.is_group(path))
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.sources.iter().map(|s| s.name()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
