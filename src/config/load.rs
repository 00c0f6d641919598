//! Entry points: compose, type, validate

use super::builtin::{DEFAULT_SOLVER, ROOT_CONFIG};
use super::compose::{ComposedConfig, Composer};
use super::schema::SolverConfig;
use super::source::SearchPath;
use super::validate::validate_config;
use crate::error::Result;
use std::path::PathBuf;

/// What to compose: search directories, primary config, overrides
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// User config directories, searched before the shipped tree
    pub config_dirs: Vec<PathBuf>,
    pub config_name: String,
    /// Solver option, prepended as `solver=<name>`
    pub solver: Option<String>,
    pub overrides: Vec<String>,
}

impl Default for LoadRequest {
    fn default() -> Self {
        Self {
            config_dirs: Vec::new(),
            config_name: ROOT_CONFIG.to_string(),
            solver: Some(DEFAULT_SOLVER.to_string()),
            overrides: Vec::new(),
        }
    }
}

impl LoadRequest {
    /// The shipped AudioGen solver with `overrides`
    pub fn audiogen<I, S>(overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            overrides: overrides.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    fn all_overrides(&self) -> Vec<String> {
        self.solver
            .iter()
            .map(|s| format!("solver={s}"))
            .chain(self.overrides.iter().cloned())
            .collect()
    }
}

/// Compose the config without checking completeness
pub fn compose_config(request: &LoadRequest) -> Result<ComposedConfig> {
    let composer = Composer::new(SearchPath::with_dirs(request.config_dirs.iter().cloned()));
    composer.compose(&request.config_name, &request.all_overrides())
}

/// Compose and read the typed view; unset mandatory values are allowed
pub fn load_config(request: &LoadRequest) -> Result<SolverConfig> {
    compose_config(request)?.typed()
}

/// Compose, then apply every check a trainer needs before starting:
/// no `???` left, every key well typed, every value in range.
pub fn prepare_training(request: &LoadRequest) -> Result<(ComposedConfig, SolverConfig)> {
    let composed = compose_config(request)?;
    composed.ensure_complete()?;
    let config = composed.typed()?;
    validate_config(&config)?;
    tracing::info!(
        solver = config.solver.as_deref().unwrap_or("?"),
        sample_rate = config.sample_rate,
        epochs = config.optim.epochs,
        "config ready for training"
    );
    Ok((composed, config))
}
