//! Configuration validation

use super::codec::{CompressionSource, PretrainedCodec};
use super::schema::{SchedulerKind, SolverConfig};

/// Validation error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("compression_model_checkpoint is not set (pass compression_model_checkpoint=<path or //pretrained/name>)")]
    MissingCheckpoint,

    #[error("Invalid sample rate: {0} (must be > 0)")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0} (must be 1 or 2)")]
    InvalidChannels(u32),

    #[error("Invalid batch size for {field}: {value} (must be > 0)")]
    InvalidBatchSize { field: String, value: usize },

    #[error("Invalid segment duration: {0} (must be finite and > 0.0)")]
    InvalidSegmentDuration(f64),

    #[error("Invalid probability for {field}: {value} (must be in [0, 1])")]
    InvalidProbability { field: String, value: f64 },

    #[error("Invalid mixing SNR range: [{low}, {high}] (must be finite with mix_snr_low <= mix_snr_high)")]
    InvalidSnrRange { low: f64, high: f64 },

    #[error("Invalid learning rate: {0} (must be finite and > 0.0)")]
    InvalidLearningRate(f64),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid gradient clip value: {0} (must be finite and >= 0.0)")]
    InvalidMaxNorm(f64),

    #[error("Invalid EMA setting {field}: {value}")]
    InvalidEma { field: String, value: String },

    #[error("Invalid {scheduler} schedule: {reason}")]
    InvalidSchedule { scheduler: String, reason: String },

    #[error("Invalid sampling temperature: {0} (must be finite and > 0.0)")]
    InvalidTemperature(f64),

    #[error("Compression model {codec} produces {codec_value} {what}, config expects {config_value}")]
    CodecMismatch {
        codec: String,
        what: String,
        codec_value: u32,
        config_value: u32,
    },
}

/// Validate a solver configuration before training starts
///
/// Checks:
/// - the compression model checkpoint is supplied
/// - numeric values are in valid ranges, probabilities in [0, 1]
/// - `mix_snr_low <= mix_snr_high`
/// - scheduler parameters fit the chosen scheduler
/// - known pretrained codecs match `sample_rate` and `channels`
pub fn validate_config(config: &SolverConfig) -> Result<(), ValidationError> {
    if config.sample_rate == 0 {
        return Err(ValidationError::InvalidSampleRate(config.sample_rate));
    }
    if !(1..=2).contains(&config.channels) {
        return Err(ValidationError::InvalidChannels(config.channels));
    }

    validate_dataset(config)?;
    validate_optim(config)?;
    validate_schedule(config)?;
    validate_generate(config)?;

    for (name, conditioner) in &config.conditioners {
        if let Some(dropout) = conditioner.word_dropout() {
            check_probability(&format!("conditioners.{name}.word_dropout"), dropout)?;
        }
    }

    let checkpoint = config
        .compression_model_checkpoint
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or(ValidationError::MissingCheckpoint)?;

    if let CompressionSource::Pretrained(codec) = CompressionSource::parse(checkpoint) {
        check_codec(config, &codec)?;
    }

    Ok(())
}

fn is_positive(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}

fn check_probability(field: &str, value: f64) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::InvalidProbability {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn check_batch(field: &str, value: usize) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidBatchSize {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn validate_dataset(config: &SolverConfig) -> Result<(), ValidationError> {
    let dataset = &config.dataset;

    check_batch("dataset.batch_size", dataset.batch_size)?;
    if let Some(batch) = dataset.train.batch_size {
        check_batch("dataset.train.batch_size", batch)?;
    }
    for (split, cfg) in [
        ("valid", &dataset.valid),
        ("evaluate", &dataset.evaluate),
        ("generate", &dataset.generate),
    ] {
        if let Some(batch) = cfg.batch_size {
            check_batch(&format!("dataset.{split}.batch_size"), batch)?;
        }
    }

    if let Some(duration) = dataset.segment_duration {
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(ValidationError::InvalidSegmentDuration(duration));
        }
    }

    check_probability("dataset.min_segment_ratio", dataset.min_segment_ratio)?;

    let train = &dataset.train;
    check_probability("dataset.train.aug_p", train.aug_p)?;
    check_probability("dataset.train.mix_p", train.mix_p)?;
    check_probability("dataset.train.mix_min_overlap", train.mix_min_overlap)?;
    for (field, value) in [
        ("dataset.train.merge_text_p", train.merge_text_p),
        ("dataset.train.drop_desc_p", train.drop_desc_p),
        ("dataset.train.drop_other_p", train.drop_other_p),
    ] {
        if let Some(p) = value {
            check_probability(field, p)?;
        }
    }

    let (low, high) = (train.mix_snr_low, train.mix_snr_high);
    if !(low.is_finite() && high.is_finite() && low <= high) {
        return Err(ValidationError::InvalidSnrRange {
            low: train.mix_snr_low,
            high: train.mix_snr_high,
        });
    }

    if train.aug_p > 0.0 && train.mix_p > 0.0 && dataset.effective_train_batch_size() == 0 {
        return Err(ValidationError::InvalidBatchSize {
            field: "dataset.train.batch_size * mix_p".to_string(),
            value: 0,
        });
    }

    Ok(())
}

fn validate_optim(config: &SolverConfig) -> Result<(), ValidationError> {
    let optim = &config.optim;

    if !(optim.lr > 0.0 && optim.lr.is_finite()) {
        return Err(ValidationError::InvalidLearningRate(optim.lr));
    }
    if optim.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(optim.epochs));
    }
    if !(optim.max_norm >= 0.0 && optim.max_norm.is_finite()) {
        return Err(ValidationError::InvalidMaxNorm(optim.max_norm));
    }

    for (i, beta) in optim.adam.betas.iter().enumerate() {
        if !(0.0..1.0).contains(beta) {
            return Err(ValidationError::InvalidProbability {
                field: format!("optim.adam.betas[{i}]"),
                value: *beta,
            });
        }
    }

    if optim.ema.enabled {
        match optim.ema.updates {
            Some(0) | None => {
                return Err(ValidationError::InvalidEma {
                    field: "optim.ema.updates".to_string(),
                    value: format!("{:?} (must be > 0 when EMA is used)", optim.ema.updates),
                })
            }
            Some(_) => {}
        }
        if !(0.0 < optim.ema.decay && optim.ema.decay < 1.0) {
            return Err(ValidationError::InvalidEma {
                field: "optim.ema.decay".to_string(),
                value: format!("{} (must be in (0, 1))", optim.ema.decay),
            });
        }
    }

    Ok(())
}

fn schedule_error(kind: SchedulerKind, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidSchedule {
        scheduler: kind.as_str().to_string(),
        reason: reason.into(),
    }
}

fn validate_schedule(config: &SolverConfig) -> Result<(), ValidationError> {
    let Some(kind) = config.schedule.lr_scheduler else {
        return Ok(());
    };
    let schedule = &config.schedule;
    let lr = config.optim.lr;

    match kind {
        SchedulerKind::Step => {
            if schedule.step.step_size.unwrap_or(0) == 0 {
                return Err(schedule_error(kind, "step.step_size must be > 0"));
            }
            if !schedule.step.gamma.is_some_and(is_positive) {
                return Err(schedule_error(kind, "step.gamma must be > 0"));
            }
        }
        SchedulerKind::Exponential => {
            if !schedule.exponential.lr_decay.is_some_and(is_positive) {
                return Err(schedule_error(kind, "exponential.lr_decay must be > 0"));
            }
        }
        SchedulerKind::Cosine => {
            check_total_updates(config, kind)?;
            let cosine = &schedule.cosine;
            if !(0.0..=1.0).contains(&cosine.lr_min_ratio) {
                return Err(schedule_error(kind, "cosine.lr_min_ratio must be in [0, 1]"));
            }
            if !is_positive(cosine.cycle_length) {
                return Err(schedule_error(kind, "cosine.cycle_length must be > 0"));
            }
        }
        SchedulerKind::PolynomialDecay => {
            check_total_updates(config, kind)?;
            let poly = &schedule.polynomial_decay;
            if !is_positive(poly.power) {
                return Err(schedule_error(kind, "polynomial_decay.power must be > 0"));
            }
            if !(0.0..=lr).contains(&poly.end_lr) {
                return Err(schedule_error(
                    kind,
                    format!("polynomial_decay.end_lr must be in [0, lr={lr}]"),
                ));
            }
        }
        SchedulerKind::InverseSqrt | SchedulerKind::LinearWarmup => {
            let params = if kind == SchedulerKind::InverseSqrt {
                &schedule.inverse_sqrt
            } else {
                &schedule.linear_warmup
            };
            if !(0.0..=lr).contains(&params.warmup_init_lr) {
                return Err(schedule_error(
                    kind,
                    format!("warmup_init_lr must be in [0, lr={lr}]"),
                ));
            }
            if kind == SchedulerKind::InverseSqrt && params.warmup.unwrap_or(0) == 0 {
                return Err(schedule_error(kind, "inverse_sqrt.warmup must be > 0"));
            }
        }
    }

    Ok(())
}

fn check_total_updates(config: &SolverConfig, kind: SchedulerKind) -> Result<(), ValidationError> {
    let optim = &config.optim;
    match (optim.updates_per_epoch, optim.total_updates()) {
        (None, _) | (_, Some(0)) => Err(schedule_error(
            kind,
            "needs optim.updates_per_epoch to know the total number of updates",
        )),
        (Some(per_epoch), None) => Err(schedule_error(
            kind,
            format!(
                "optim.updates_per_epoch ({per_epoch}) * optim.epochs ({}) overflows",
                optim.epochs
            ),
        )),
        (Some(_), Some(_)) => Ok(()),
    }
}

fn validate_generate(config: &SolverConfig) -> Result<(), ValidationError> {
    let lm = &config.generate.lm;
    check_probability("generate.lm.top_p", lm.top_p)?;
    if !lm.temp.is_finite() || (lm.use_sampling && lm.temp <= 0.0) {
        return Err(ValidationError::InvalidTemperature(lm.temp));
    }
    Ok(())
}

fn check_codec(config: &SolverConfig, codec: &PretrainedCodec) -> Result<(), ValidationError> {
    let Some(spec) = codec.spec() else {
        return Ok(());
    };
    if spec.sample_rate != config.sample_rate {
        return Err(ValidationError::CodecMismatch {
            codec: codec.name().to_string(),
            what: "sample rate".to_string(),
            codec_value: spec.sample_rate,
            config_value: config.sample_rate,
        });
    }
    if spec.channels != config.channels {
        return Err(ValidationError::CodecMismatch {
            codec: codec.name().to_string(),
            what: "channels".to_string(),
            codec_value: spec.channels,
            config_value: config.channels,
        });
    }
    Ok(())
}
