//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! soundlm compose compression_model_checkpoint=//pretrained/audiogen_encodec_16khz
//! soundlm compose --config-dir ./conf dataset.batch_size=64 --format json
//! soundlm validate --allow-missing
//! soundlm info --solver audiogen/audiogen_base_16khz
//! soundlm init ./conf
//! ```

use super::builtin::{DEFAULT_SOLVER, ROOT_CONFIG};
use super::load::LoadRequest;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// soundlm: compose and check text-to-sound LM training configs
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "soundlm")]
#[command(version)]
#[command(about = "Compose, validate and inspect text-to-sound LM training configs")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the composed configuration
    Compose(ComposeCommandArgs),

    /// Check that a configuration is complete and in range
    Validate(ValidateArgs),

    /// Summarize a configuration
    Info(InfoArgs),

    /// Write the shipped config tree to a directory
    Init(InitArgs),
}

/// Where to compose from, and what to override
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ComposeArgs {
    /// Extra config directory, searched before the shipped tree (repeatable)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dirs: Vec<PathBuf>,

    /// Primary config to compose
    #[arg(short = 'n', long, default_value = ROOT_CONFIG)]
    pub config_name: String,

    /// Solver option; defaults to the AudioGen base solver for the root config
    #[arg(short, long)]
    pub solver: Option<String>,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override dataset batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f64>,

    /// Overrides: key=value, +key=value, ++key=value, ~key
    #[arg(value_name = "OVERRIDE")]
    pub overrides: Vec<String>,
}

impl ComposeArgs {
    /// Request for the loader, shortcut flags included
    pub fn to_request(&self) -> LoadRequest {
        let solver = self.solver.clone().or_else(|| {
            (self.config_name.trim_matches('/') == ROOT_CONFIG).then(|| DEFAULT_SOLVER.to_string())
        });
        LoadRequest {
            config_dirs: self.config_dirs.clone(),
            config_name: self.config_name.clone(),
            solver,
            overrides: apply_overrides(self),
        }
    }
}

/// Arguments for the compose command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ComposeCommandArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Arguments for the validate command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    /// Accept `???` values and only check what is set
    #[arg(long)]
    pub allow_missing: bool,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the init command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct InitArgs {
    /// Target directory
    #[arg(value_name = "DIR", default_value = "conf")]
    pub dir: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

/// Output format for compose and info
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Positional overrides followed by the shortcut flags as overrides
pub fn apply_overrides(args: &ComposeArgs) -> Vec<String> {
    let mut overrides = args.overrides.clone();
    if let Some(epochs) = args.epochs {
        overrides.push(format!("optim.epochs={epochs}"));
    }
    if let Some(batch_size) = args.batch_size {
        overrides.push(format!("dataset.batch_size={batch_size}"));
    }
    if let Some(lr) = args.lr {
        overrides.push(format!("optim.lr={lr:?}"));
    }
    overrides
}
