//! End-to-end composition through the public API and the CLI arguments

use soundlm::config::{
    compose_config, parse_args, prepare_training, write_builtin_tree, Command, LoadRequest,
    OutputFormat, ValidationError,
};
use soundlm::optim::build_scheduler;
use soundlm::Error;
use std::fs;
use tempfile::TempDir;

const CHECKPOINT: &str = "compression_model_checkpoint=//pretrained/audiogen_encodec_16khz";

fn datasource() -> Vec<String> {
    ["train", "valid", "evaluate", "generate"]
        .iter()
        .map(|split| format!("datasource.{split}=egs/audiocaps/{split}"))
        .collect()
}

#[test]
fn test_cli_arguments_compose_ready_config() {
    let mut argv = vec![
        "soundlm".to_string(),
        "validate".to_string(),
        "--epochs".to_string(),
        "20".to_string(),
        CHECKPOINT.to_string(),
    ];
    argv.extend(datasource());

    let cli = parse_args(argv).unwrap();
    let Command::Validate(args) = cli.command else {
        panic!("Expected Validate command");
    };
    let (_, config) = prepare_training(&args.compose.to_request()).unwrap();
    assert_eq!(config.optim.epochs, 20);
    assert_eq!(config.sample_rate, 16000);
}

#[test]
fn test_init_tree_round_trips() {
    let dir = TempDir::new().unwrap();
    let written = write_builtin_tree(dir.path(), false).unwrap();
    assert!(written > 0);

    // Edit the copied solver and compose from the directory
    let solver = dir.path().join("solver/audiogen/audiogen_base_16khz.yaml");
    let content = fs::read_to_string(&solver).unwrap();
    fs::write(&solver, content.replace("top_k: 250", "top_k: 100")).unwrap();

    let request = LoadRequest {
        config_dirs: vec![dir.path().to_path_buf()],
        ..LoadRequest::default()
    };
    let composed = compose_config(&request).unwrap();
    let config = composed.typed().unwrap();
    assert_eq!(config.generate.lm.top_k, 100);
    assert!(composed
        .fragments()
        .iter()
        .all(|f| f.source.starts_with("file://")));
}

#[test]
fn test_missing_checkpoint_reported_before_training() {
    let request = LoadRequest::audiogen(datasource());
    match prepare_training(&request).unwrap_err() {
        Error::MissingMandatory(keys) => {
            assert_eq!(keys, vec!["compression_model_checkpoint".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_explicit_null_checkpoint_fails_validation() {
    let mut overrides = datasource();
    overrides.push("compression_model_checkpoint=null".to_string());
    let err = prepare_training(&LoadRequest::audiogen(overrides)).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::MissingCheckpoint)
    ));
}

#[test]
fn test_fragment_override_and_interpolation_follow_sample_rate() {
    let mut overrides = datasource();
    overrides.extend([
        "compression_model_checkpoint=/ckpt/encodec_24k.th".to_string(),
        "sample_rate=24000".to_string(),
    ]);
    let (composed, config) = prepare_training(&LoadRequest::audiogen(overrides)).unwrap();
    assert_eq!(config.sample_rate, 24000);
    assert_eq!(
        config.datasource.as_ref().and_then(|d| d.max_sample_rate),
        Some(24000)
    );
    assert!(composed
        .fragments()
        .iter()
        .any(|f| f.path == "dset/audio/default"));
}

#[test]
fn test_schedule_from_composed_config() {
    let mut overrides = datasource();
    overrides.extend([
        CHECKPOINT.to_string(),
        "schedule.lr_scheduler=cosine".to_string(),
        "schedule.cosine.warmup=100".to_string(),
        "schedule.cosine.lr_min_ratio=0.1".to_string(),
    ]);
    let (_, config) = prepare_training(&LoadRequest::audiogen(overrides)).unwrap();
    let scheduler = build_scheduler(&config).unwrap();
    let total = config.optim.total_updates().unwrap();
    assert_eq!(total, 200_000);
    assert!((scheduler.lr_at(100) - 0.0005).abs() < 1e-12);
    assert!((scheduler.lr_at(total) - 0.00005).abs() < 1e-12);
}

#[test]
fn test_info_format_flag() {
    let cli = parse_args(["soundlm", "info", "-f", "yaml", "--config-dir", "conf"]).unwrap();
    let Command::Info(args) = cli.command else {
        panic!("Expected Info command");
    };
    assert_eq!(args.format, OutputFormat::Yaml);
    assert_eq!(args.compose.to_request().config_dirs.len(), 1);
}
