//! # soundlm: training configuration for text-to-sound language models
//!
//! soundlm composes the declarative configuration of a text-to-sound LM
//! (AudioGen-style) training run from YAML fragments, checks it before
//! training starts, and derives the learning-rate schedule it describes.
//!
//! ## Architecture
//!
//! - **config**: Composition, overrides, interpolation, typed view, validation
//! - **optim**: Learning rate schedulers built from the composed config
//! - **error**: Crate error type

pub mod config;
pub mod optim;

pub mod error;

// Re-export commonly used types
pub use config::{prepare_training, ComposedConfig, Composer, LoadRequest, SolverConfig};
pub use error::{Error, Result};
