//! Typed view of a composed solver configuration

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Complete solver configuration as read by a trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Solver family (`audiogen`, `musicgen`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<String>,

    /// Mixed-precision training
    #[serde(default)]
    pub autocast: bool,

    #[serde(default)]
    pub autocast_dtype: AutocastDtype,

    /// Audio sample rate in Hz
    pub sample_rate: u32,

    /// Number of audio channels
    pub channels: u32,

    /// Compression model the LM is trained on; must be supplied
    #[serde(default)]
    pub compression_model_checkpoint: Option<String>,

    #[serde(default)]
    pub deadlock: DeadlockConfig,

    pub dataset: DatasetConfig,

    pub optim: OptimConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Conditioners by attribute name (`description`, ...)
    #[serde(default)]
    pub conditioners: BTreeMap<String, ConditionerConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<DataSourceConfig>,

    /// Keys consumed by other subsystems (transformer_lm, fuser, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Autocast precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocastDtype {
    Float16,
    #[default]
    Bfloat16,
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockConfig {
    #[serde(rename = "use", default)]
    pub enabled: bool,

    /// Seconds without progress before the watchdog fires
    #[serde(default = "default_deadlock_timeout")]
    pub timeout: u64,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: default_deadlock_timeout(),
        }
    }
}

/// Paths of the audio manifests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default)]
    pub max_sample_rate: Option<u32>,
    #[serde(default)]
    pub max_channels: Option<u32>,
    #[serde(default)]
    pub train: Option<String>,
    #[serde(default)]
    pub valid: Option<String>,
    #[serde(default)]
    pub evaluate: Option<String>,
    #[serde(default)]
    pub generate: Option<String>,
}

/// Data loading and train-time augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Batch size the model sees
    pub batch_size: usize,

    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Segment length in seconds, whole files when unset
    #[serde(default)]
    pub segment_duration: Option<f64>,

    /// Shortest accepted segment as a share of `segment_duration`
    #[serde(default = "default_min_segment_ratio")]
    pub min_segment_ratio: f64,

    #[serde(default = "default_true")]
    pub sample_on_weight: bool,

    #[serde(default = "default_true")]
    pub sample_on_duration: bool,

    #[serde(default = "default_true")]
    pub shuffle: bool,

    #[serde(default)]
    pub return_info: bool,

    #[serde(default)]
    pub external_metadata_source: Option<String>,

    #[serde(default)]
    pub train: TrainSplitConfig,

    #[serde(default)]
    pub valid: SplitConfig,

    #[serde(default)]
    pub evaluate: SplitConfig,

    #[serde(default)]
    pub generate: SplitConfig,
}

impl DatasetConfig {
    /// Items per train batch after mixing.
    ///
    /// Mixing pairs items of the loaded batch, so the model sees
    /// `floor(batch * mix_p)` items whenever `mix_p > 0`.
    pub fn effective_train_batch_size(&self) -> usize {
        let loaded = self.train.batch_size.unwrap_or(self.batch_size);
        if self.train.mix_p > 0.0 {
            (loaded as f64 * self.train.mix_p).floor() as usize
        } else {
            loaded
        }
    }
}

/// Per-split overrides of the dataset settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub num_samples: Option<usize>,
    #[serde(default)]
    pub shuffle: Option<bool>,
    #[serde(default)]
    pub segment_duration: Option<f64>,
}

/// Train split, with the sample-mixing augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSplitConfig {
    /// Batch size loaded before mixing
    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub num_samples: Option<usize>,

    #[serde(default)]
    pub shuffle: Option<bool>,

    /// Probability of mixing a batch
    #[serde(default)]
    pub aug_p: f64,

    /// Share of batch items mixed together
    #[serde(default)]
    pub mix_p: f64,

    /// Lowest SNR (dB) between mixed items
    #[serde(default = "default_mix_snr_low")]
    pub mix_snr_low: f64,

    /// Highest SNR (dB) between mixed items
    #[serde(default = "default_mix_snr_high")]
    pub mix_snr_high: f64,

    /// Minimum overlap of mixed items, as a share of the segment
    #[serde(default = "default_mix_min_overlap")]
    pub mix_min_overlap: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_text_p: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_desc_p: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_other_p: Option<f64>,
}

impl Default for TrainSplitConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            num_samples: None,
            shuffle: None,
            aug_p: 0.0,
            mix_p: 0.0,
            mix_snr_low: default_mix_snr_low(),
            mix_snr_high: default_mix_snr_high(),
            mix_min_overlap: default_mix_min_overlap(),
            merge_text_p: None,
            drop_desc_p: None,
            drop_other_p: None,
        }
    }
}

/// Optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Adamw,
    /// D-Adaptation Adam
    Dadam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimConfig {
    pub epochs: usize,

    #[serde(default)]
    pub updates_per_epoch: Option<usize>,

    /// Base learning rate
    pub lr: f64,

    pub optimizer: OptimizerKind,

    #[serde(default)]
    pub adam: AdamParams,

    #[serde(default)]
    pub ema: EmaConfig,

    /// Gradient norm clipping, disabled at 0
    #[serde(default)]
    pub max_norm: f64,

    #[serde(default = "default_true")]
    pub eager_sync: bool,
}

impl OptimConfig {
    /// Total optimizer updates, when the epoch length is known and the
    /// product fits in `usize`
    pub fn total_updates(&self) -> Option<usize> {
        self.updates_per_epoch
            .and_then(|u| u.checked_mul(self.epochs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamParams {
    #[serde(default = "default_betas")]
    pub betas: Vec<f64>,
    #[serde(default)]
    pub weight_decay: f64,
    #[serde(default = "default_eps")]
    pub eps: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            betas: default_betas(),
            weight_decay: 0.0,
            eps: default_eps(),
        }
    }
}

/// Exponential moving average of the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmaConfig {
    #[serde(rename = "use", default)]
    pub enabled: bool,

    /// Updates between two EMA steps
    #[serde(default)]
    pub updates: Option<usize>,

    #[serde(default)]
    pub device: Option<String>,

    #[serde(default = "default_ema_decay")]
    pub decay: f64,
}

impl Default for EmaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            updates: None,
            device: None,
            decay: default_ema_decay(),
        }
    }
}

/// Learning-rate scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    Step,
    Exponential,
    Cosine,
    PolynomialDecay,
    InverseSqrt,
    LinearWarmup,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Step => "step",
            SchedulerKind::Exponential => "exponential",
            SchedulerKind::Cosine => "cosine",
            SchedulerKind::PolynomialDecay => "polynomial_decay",
            SchedulerKind::InverseSqrt => "inverse_sqrt",
            SchedulerKind::LinearWarmup => "linear_warmup",
        }
    }
}

/// Scheduler choice and the parameters of every scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Constant learning rate when unset
    #[serde(default)]
    pub lr_scheduler: Option<SchedulerKind>,
    #[serde(default)]
    pub step: StepParams,
    #[serde(default)]
    pub exponential: ExponentialParams,
    #[serde(default)]
    pub cosine: CosineParams,
    #[serde(default)]
    pub polynomial_decay: PolynomialDecayParams,
    #[serde(default)]
    pub inverse_sqrt: WarmupParams,
    #[serde(default)]
    pub linear_warmup: WarmupParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepParams {
    #[serde(default)]
    pub step_size: Option<usize>,
    #[serde(default)]
    pub gamma: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExponentialParams {
    #[serde(default)]
    pub lr_decay: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosineParams {
    #[serde(default)]
    pub warmup: Option<usize>,
    #[serde(default)]
    pub lr_min_ratio: f64,
    #[serde(default = "default_one")]
    pub cycle_length: f64,
}

impl Default for CosineParams {
    fn default() -> Self {
        Self {
            warmup: None,
            lr_min_ratio: 0.0,
            cycle_length: default_one(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolynomialDecayParams {
    #[serde(default)]
    pub warmup: Option<usize>,
    #[serde(default)]
    pub zero_lr_warmup_steps: usize,
    #[serde(default)]
    pub end_lr: f64,
    #[serde(default = "default_one")]
    pub power: f64,
}

impl Default for PolynomialDecayParams {
    fn default() -> Self {
        Self {
            warmup: None,
            zero_lr_warmup_steps: 0,
            end_lr: 0.0,
            power: default_one(),
        }
    }
}

/// Linear warmup from `warmup_init_lr` over `warmup` steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarmupParams {
    #[serde(default)]
    pub warmup: Option<usize>,
    #[serde(default)]
    pub warmup_init_lr: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Generate samples every N epochs
    #[serde(default)]
    pub every: Option<usize>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub lm: LmSamplingConfig,
}

/// Inference-time sampling of the LM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmSamplingConfig {
    #[serde(default)]
    pub use_sampling: bool,

    #[serde(default = "default_one")]
    pub temp: f64,

    /// Top-k sampling, disabled at 0
    #[serde(default)]
    pub top_k: usize,

    /// Nucleus sampling, disabled at 0.0; takes precedence over top-k
    #[serde(default)]
    pub top_p: f64,

    #[serde(default = "default_true")]
    pub prompted_samples: bool,

    #[serde(default = "default_true")]
    pub unprompted_samples: bool,

    #[serde(default)]
    pub gen_gt_samples: bool,

    #[serde(default)]
    pub prompt_duration: Option<f64>,

    #[serde(default)]
    pub gen_duration: Option<f64>,

    #[serde(default)]
    pub remove_prompts: bool,
}

impl Default for LmSamplingConfig {
    fn default() -> Self {
        Self {
            use_sampling: false,
            temp: default_one(),
            top_k: 0,
            top_p: 0.0,
            prompted_samples: true,
            unprompted_samples: true,
            gen_gt_samples: false,
            prompt_duration: None,
            gen_duration: None,
            remove_prompts: false,
        }
    }
}

/// Token selection rule derived from the sampling settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingStrategy {
    Greedy,
    TopP(f64),
    TopK(usize),
    /// Sample from the full distribution
    Multinomial,
}

impl LmSamplingConfig {
    pub fn strategy(&self) -> SamplingStrategy {
        if !self.use_sampling {
            SamplingStrategy::Greedy
        } else if self.top_p > 0.0 {
            SamplingStrategy::TopP(self.top_p)
        } else if self.top_k > 0 {
            SamplingStrategy::TopK(self.top_k)
        } else {
            SamplingStrategy::Multinomial
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Fréchet Audio Distance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fad: Option<FadConfig>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadConfig {
    /// Compare against reconstructed ground truth instead of the reference set
    #[serde(default)]
    pub use_gt: bool,

    /// Embedding backend (`tf` for VGGish)
    #[serde(default = "default_fad_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tf: Option<FadTfConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FadTfConfig {
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
}

/// Conditioner of one attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionerConfig {
    /// Conditioner type (`t5`, `clap`, ...)
    pub model: String,

    /// Type-specific blocks, keyed by type name
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl ConditionerConfig {
    /// `word_dropout` of the active conditioner type, if set
    pub fn word_dropout(&self) -> Option<f64> {
        self.params
            .get(&self.model)?
            .get("word_dropout")?
            .as_f64()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log every N updates
    #[serde(default = "default_log_updates")]
    pub log_updates: usize,

    #[serde(default)]
    pub log_tensorboard: bool,

    #[serde(default)]
    pub log_wandb: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_updates: default_log_updates(),
            log_tensorboard: false,
            log_wandb: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

fn default_deadlock_timeout() -> u64 {
    600
}

fn default_num_workers() -> usize {
    10
}

fn default_min_segment_ratio() -> f64 {
    0.5
}

fn default_mix_snr_low() -> f64 {
    -5.0
}

fn default_mix_snr_high() -> f64 {
    5.0
}

fn default_mix_min_overlap() -> f64 {
    0.5
}

fn default_betas() -> Vec<f64> {
    vec![0.9, 0.999]
}

fn default_eps() -> f64 {
    1e-8
}

fn default_ema_decay() -> f64 {
    0.99
}

fn default_fad_model() -> String {
    "tf".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_updates() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
sample_rate: 16000
channels: 1

dataset:
  batch_size: 64

optim:
  epochs: 10
  lr: 0.001
  optimizer: adam
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: SolverConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.dataset.batch_size, 64);
        assert_eq!(config.optim.optimizer, OptimizerKind::Adam);
        assert!(config.compression_model_checkpoint.is_none());
        assert!(config.schedule.lr_scheduler.is_none());
        assert_eq!(config.autocast_dtype, AutocastDtype::Bfloat16);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_defaults_applied() {
        let config: SolverConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.dataset.num_workers, 10);
        assert_eq!(config.dataset.min_segment_ratio, 0.5);
        assert_eq!(config.dataset.train.mix_snr_low, -5.0);
        assert_eq!(config.dataset.train.mix_snr_high, 5.0);
        assert_eq!(config.optim.adam.betas, vec![0.9, 0.999]);
        assert!(!config.optim.ema.enabled);
        assert_eq!(config.logging.level, "INFO");
        assert_eq!(config.generate.lm.temp, 1.0);
    }

    #[test]
    fn test_unknown_keys_kept_in_extra() {
        let yaml = format!("{MINIMAL}\ntransformer_lm:\n  n_q: 4\n  card: 2048\n");
        let config: SolverConfig = serde_yaml::from_str(&yaml).unwrap();
        let lm = config.extra.get("transformer_lm").unwrap();
        assert_eq!(lm.get("card").and_then(Value::as_u64), Some(2048));
    }

    #[test]
    fn test_unknown_scheduler_rejected() {
        let yaml = format!("{MINIMAL}\nschedule:\n  lr_scheduler: warp_speed\n");
        let err = serde_yaml::from_str::<SolverConfig>(&yaml).unwrap_err();
        assert!(err.to_string().contains("warp_speed"));
    }

    #[test]
    fn test_unknown_dtype_rejected() {
        let yaml = format!("{MINIMAL}\nautocast_dtype: float8\n");
        assert!(serde_yaml::from_str::<SolverConfig>(&yaml).is_err());
    }

    #[test]
    fn test_effective_train_batch_size() {
        let mut config: SolverConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.dataset.effective_train_batch_size(), 64);

        config.dataset.train.batch_size = Some(256);
        config.dataset.train.mix_p = 0.5;
        assert_eq!(config.dataset.effective_train_batch_size(), 128);

        config.dataset.train.mix_p = 0.3;
        assert_eq!(config.dataset.effective_train_batch_size(), 76);
    }

    #[test]
    fn test_sampling_strategy() {
        let mut lm = LmSamplingConfig::default();
        assert_eq!(lm.strategy(), SamplingStrategy::Greedy);

        lm.use_sampling = true;
        assert_eq!(lm.strategy(), SamplingStrategy::Multinomial);

        lm.top_k = 250;
        assert_eq!(lm.strategy(), SamplingStrategy::TopK(250));

        lm.top_p = 0.9;
        assert_eq!(lm.strategy(), SamplingStrategy::TopP(0.9));
    }

    #[test]
    fn test_total_updates() {
        let config: SolverConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.optim.total_updates(), None);

        let mut optim = config.optim;
        optim.updates_per_epoch = Some(2000);
        assert_eq!(optim.total_updates(), Some(20000));
    }

    #[test]
    fn test_conditioner_word_dropout() {
        let yaml = "model: t5\nt5:\n  name: t5-large\n  word_dropout: 0.2\n";
        let conditioner: ConditionerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(conditioner.word_dropout(), Some(0.2));
    }
}
