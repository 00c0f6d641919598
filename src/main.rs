//! soundlm CLI
//!
//! Composes text-to-sound LM training configs from the shipped config tree
//! and user directories.
//!
//! # Usage
//!
//! ```bash
//! # Print the composed config
//! soundlm compose compression_model_checkpoint=//pretrained/audiogen_encodec_16khz
//!
//! # Check that it is ready for training
//! soundlm validate compression_model_checkpoint=/ckpt/encodec.th datasource.train=egs/train
//!
//! # Summarize it, unset values allowed
//! soundlm info --lr 0.0003
//!
//! # Copy the shipped tree to edit it
//! soundlm init ./conf
//! ```

use clap::Parser;
use soundlm::config::{
    compose_config, prepare_training, reference_dir_from_env, validate_config, write_builtin_tree,
    Cli, Command, ComposeCommandArgs, CompressionSource, InfoArgs, InitArgs, OutputFormat,
    SolverConfig, ValidateArgs, ValidationError,
};
use soundlm::optim::schedule_preview;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };
    init_tracing(log_level);

    let result = match cli.command {
        Command::Compose(args) => run_compose(args, log_level),
        Command::Validate(args) => run_validate(args, log_level),
        Command::Info(args) => run_info(args, log_level),
        Command::Init(args) => run_init(args, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

/// Diagnostics go to stderr; `RUST_LOG` wins over the flags
fn init_tracing(level: LogLevel) {
    let default = match level {
        LogLevel::Quiet => "error",
        LogLevel::Normal => "warn",
        LogLevel::Verbose => "soundlm=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

fn run_compose(args: ComposeCommandArgs, level: LogLevel) -> Result<(), String> {
    let composed =
        compose_config(&args.compose.to_request()).map_err(|e| format!("Config error: {e}"))?;

    let output = match args.format {
        OutputFormat::Json => composed.to_json(),
        OutputFormat::Text | OutputFormat::Yaml => composed.to_yaml(),
    }
    .map_err(|e| format!("Serialization error: {e}"))?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }

    let missing = composed.missing_keys();
    if !missing.is_empty() && level != LogLevel::Quiet {
        eprintln!("note: unset values (???): {}", missing.join(", "));
    }
    Ok(())
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    let request = args.compose.to_request();
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Validating config: {} (solver {})",
            request.config_name,
            request.solver.as_deref().unwrap_or("from defaults")
        ),
    );

    let config = if args.allow_missing {
        let composed = compose_config(&request).map_err(|e| format!("Config error: {e}"))?;
        let missing = composed.missing_keys();
        let config = composed.typed().map_err(|e| format!("Config error: {e}"))?;
        match validate_config(&config) {
            Ok(()) | Err(ValidationError::MissingCheckpoint) => {}
            Err(e) => return Err(format!("Validation failed: {e}")),
        }
        if !missing.is_empty() {
            log(
                level,
                LogLevel::Normal,
                &format!("Unset values (allowed): {}", missing.join(", ")),
            );
        }
        config
    } else {
        let (_, config) = prepare_training(&request).map_err(|e| format!("Validation failed: {e}"))?;
        config
    };

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        println!();
        print_summary(&config);
    }

    Ok(())
}

fn print_summary(config: &SolverConfig) {
    println!("Configuration Summary:");
    println!("  Solver: {}", config.solver.as_deref().unwrap_or("-"));
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!("  Channels: {}", config.channels);
    if config.autocast {
        println!("  Autocast: {:?}", config.autocast_dtype);
    }
    match config.compression_model_checkpoint.as_deref() {
        Some(checkpoint) => {
            let source = CompressionSource::parse(checkpoint);
            println!("  Compression model: {source}");
            if let Some(path) = source.local_path(reference_dir_from_env().as_deref()) {
                println!("    Path: {}", path.display());
            }
            if let CompressionSource::Pretrained(codec) = &source {
                if let Some(spec) = codec.spec() {
                    println!(
                        "    Frame rate: {} Hz, {} codebooks of {}",
                        spec.frame_rate, spec.total_codebooks, spec.cardinality
                    );
                    println!(
                        "    Tokens per second: {}",
                        spec.tokens_per_second(spec.total_codebooks)
                    );
                }
            }
        }
        None => println!("  Compression model: (unset)"),
    }

    let dataset = &config.dataset;
    println!();
    println!("  Batch size: {}", dataset.batch_size);
    println!(
        "  Effective train batch: {}",
        dataset.effective_train_batch_size()
    );
    if let Some(duration) = dataset.segment_duration {
        println!(
            "  Segments: {duration} s (min ratio {})",
            dataset.min_segment_ratio
        );
    }
    let train = &dataset.train;
    if train.aug_p > 0.0 {
        println!(
            "  Mixing: aug_p {} mix_p {} SNR [{}, {}] dB, overlap >= {}",
            train.aug_p, train.mix_p, train.mix_snr_low, train.mix_snr_high, train.mix_min_overlap
        );
    }

    let optim = &config.optim;
    println!();
    println!("  Optimizer: {:?} (lr={})", optim.optimizer, optim.lr);
    println!("  Epochs: {}", optim.epochs);
    if let Some(total) = optim.total_updates() {
        println!("  Total updates: {total}");
    }
    if optim.max_norm > 0.0 {
        println!("  Gradient clipping: {}", optim.max_norm);
    }
    if optim.ema.enabled {
        println!(
            "  EMA: every {} updates, decay {}",
            optim.ema.updates.unwrap_or(1),
            optim.ema.decay
        );
    }
    println!(
        "  Scheduler: {}",
        config
            .schedule
            .lr_scheduler
            .map(|k| k.as_str())
            .unwrap_or("constant")
    );
    println!("  Sampling: {:?}", config.generate.lm.strategy());
    for (name, conditioner) in &config.conditioners {
        println!("  Conditioner {name}: {}", conditioner.model);
    }
}

fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let composed =
        compose_config(&args.compose.to_request()).map_err(|e| format!("Config error: {e}"))?;
    let config = composed.typed().map_err(|e| format!("Config error: {e}"))?;
    let missing = composed.missing_keys();

    let preview = match schedule_preview(&config, &[0, 1000, 10_000, 100_000]) {
        Ok(preview) => preview,
        Err(e) => {
            if level != LogLevel::Quiet {
                eprintln!("note: no learning rate preview: {e}");
            }
            Vec::new()
        }
    };

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!("Fragments:");
            for fragment in composed.fragments() {
                let package = if fragment.package.is_empty() {
                    "<root>"
                } else {
                    fragment.package.as_str()
                };
                println!("  {} -> {} ({})", fragment.path, package, fragment.source);
            }
            println!();
            print_summary(&config);
            if !preview.is_empty() {
                println!();
                println!("Learning rate:");
                for (step, lr) in &preview {
                    println!("  step {step:>7}: {lr:.3e}");
                }
            }
            if !missing.is_empty() {
                println!();
                println!("Unset values: {}", missing.join(", "));
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => {
            let report = serde_json::json!({
                "config_name": composed.config_name(),
                "fragments": composed.fragments(),
                "missing": missing,
                "effective_train_batch_size": config.dataset.effective_train_batch_size(),
                "lr_preview": preview,
                "config": config,
            });
            let text = if args.format == OutputFormat::Json {
                serde_json::to_string_pretty(&report)
                    .map_err(|e| format!("JSON serialization error: {e}"))?
            } else {
                serde_yaml::to_string(&report)
                    .map_err(|e| format!("YAML serialization error: {e}"))?
            };
            println!("{text}");
        }
    }

    Ok(())
}

fn run_init(args: InitArgs, level: LogLevel) -> Result<(), String> {
    let written =
        write_builtin_tree(&args.dir, args.force).map_err(|e| format!("Init error: {e}"))?;
    log(
        level,
        LogLevel::Normal,
        &format!("Wrote {written} config files to {}", args.dir.display()),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!("Compose from it with --config-dir {}", args.dir.display()),
    );
    Ok(())
}
