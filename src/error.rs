//! Error types for soundlm

use thiserror::Error;

use crate::config::ValidationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Config not found: {name} (searched: {searched})")]
    ConfigNotFound { name: String, searched: String },

    #[error("Composition error: {0}")]
    Compose(String),

    #[error("Invalid override '{text}': {reason}")]
    InvalidOverride { text: String, reason: String },

    #[error("Interpolation error at '{key}': {reason}")]
    Interpolation { key: String, reason: String },

    #[error("Missing mandatory value(s), supply them before training: {}", .0.join(", "))]
    MissingMandatory(Vec<String>),

    #[error("Invalid config: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
