//! Declarative, composable YAML configuration
//!
//! A training run is described by fragments arranged in config groups
//! (`dset`, `solver`, `model`, ...). A primary config lists its defaults:
//!
//! ```yaml
//! # @package __global__
//! defaults:
//!   - audiogen/default
//!   - /model: lm/audiogen_lm
//!   - override /dset: audio/default
//!   - _self_
//!
//! compression_model_checkpoint: ???
//! sample_rate: 16000
//! ```
//!
//! Composition merges the fragments in defaults order, applies command-line
//! overrides (`key=value`, `+key=value`, `++key=value`, `~key`), resolves
//! `${dotted.path}` references and yields a [`ComposedConfig`]. Values set
//! to `???` must be supplied before training starts.

mod builtin;
mod cli;
mod codec;
mod compose;
mod defaults;
mod interpolate;
mod load;
mod merge;
mod overrides;
mod schema;
mod source;
mod validate;


#[cfg(test)]
mod property_tests;

pub use builtin::{builtin_fragments, write_builtin_tree, DEFAULT_SOLVER, ROOT_CONFIG};
pub use cli::{
    apply_overrides, parse_args, Cli, Command, ComposeArgs, ComposeCommandArgs, InfoArgs,
    InitArgs, OutputFormat, ValidateArgs,
};
pub use codec::{
    reference_dir_from_env, CodecSpec, CompressionSource, PretrainedCodec, REFERENCE_DIR_ENV,
};
pub use compose::{ComposedConfig, Composer, FragmentTrace};
pub use defaults::{parse_fragment, DefaultsEntry, ParsedFragment};
pub use interpolate::resolve_interpolations;
pub use load::{compose_config, load_config, prepare_training, LoadRequest};
pub use merge::{deep_merge, get_path, is_missing, missing_keys, set_path, MISSING};
pub use overrides::{parse_override, parse_overrides, Override, OverrideKind};
pub use schema::{
    AdamParams, AutocastDtype, ConditionerConfig, CosineParams, DataSourceConfig, DatasetConfig,
    DeadlockConfig, EmaConfig, ExponentialParams, FadConfig, FadTfConfig, GenerateConfig,
    LmSamplingConfig, LoggingConfig, MetricsConfig, OptimConfig, OptimizerKind,
    PolynomialDecayParams, SamplingStrategy, ScheduleConfig, SchedulerKind, SolverConfig,
    SplitConfig, StepParams, TrainSplitConfig, WarmupParams,
};
pub use source::{BuiltinSource, ConfigSource, DirSource, LoadedFragment, SearchPath};
pub use validate::{validate_config, ValidationError};
