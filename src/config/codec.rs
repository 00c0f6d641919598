//! Compression model checkpoint references
//!
//! `compression_model_checkpoint` accepts:
//!
//! - `//pretrained/<name>`: a released codec (`facebook/encodec_32khz`,
//!   `dac_44khz`, ...) or any Hugging Face EnCodec repository
//! - `//reference/<path>`: a file under the reference directory
//!   (`SOUNDLM_REFERENCE_DIR`)
//! - `//sig/<signature>`: the checkpoint of an earlier experiment
//! - anything else: a local path

use std::fmt;
use std::path::{Path, PathBuf};

const PRETRAINED_PREFIX: &str = "//pretrained/";
const REFERENCE_PREFIX: &str = "//reference/";
const SIGNATURE_PREFIX: &str = "//sig/";

/// Environment variable holding the reference directory
pub const REFERENCE_DIR_ENV: &str = "SOUNDLM_REFERENCE_DIR";

/// Where a compression model comes from
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionSource {
    Pretrained(PretrainedCodec),
    Reference(String),
    Signature(String),
    Local(PathBuf),
}

impl CompressionSource {
    pub fn parse(checkpoint: &str) -> Self {
        let checkpoint = checkpoint.trim();
        if let Some(name) = checkpoint.strip_prefix(PRETRAINED_PREFIX) {
            CompressionSource::Pretrained(PretrainedCodec::from_name(name))
        } else if let Some(rel) = checkpoint.strip_prefix(REFERENCE_PREFIX) {
            CompressionSource::Reference(rel.to_string())
        } else if let Some(sig) = checkpoint.strip_prefix(SIGNATURE_PREFIX) {
            CompressionSource::Signature(sig.trim_matches('/').to_string())
        } else {
            CompressionSource::Local(PathBuf::from(checkpoint))
        }
    }

    /// Path on disk, when the source is a file we can locate
    pub fn local_path(&self, reference_dir: Option<&Path>) -> Option<PathBuf> {
        match self {
            CompressionSource::Local(path) => Some(path.clone()),
            CompressionSource::Reference(rel) => reference_dir.map(|dir| dir.join(rel)),
            CompressionSource::Pretrained(_) | CompressionSource::Signature(_) => None,
        }
    }
}

impl fmt::Display for CompressionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionSource::Pretrained(codec) => write!(f, "pretrained {}", codec.name()),
            CompressionSource::Reference(rel) => write!(f, "reference file {rel}"),
            CompressionSource::Signature(sig) => write!(f, "experiment {sig}"),
            CompressionSource::Local(path) => write!(f, "local file {}", path.display()),
        }
    }
}

/// Reference directory from the environment
pub fn reference_dir_from_env() -> Option<PathBuf> {
    std::env::var_os(REFERENCE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Released compression models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PretrainedCodec {
    Dac44khz,
    Dac24khz,
    SqCodec,
    WavTokenizer,
    DebugCompressionModel,
    AudiogenEncodec16khz,
    Encodec24khz,
    Encodec32khz,
    /// Any other Hugging Face EnCodec repository
    Hub(String),
}

/// Static properties of a codec
#[derive(Debug, Clone, PartialEq)]
pub struct CodecSpec {
    pub sample_rate: u32,
    pub channels: u32,
    /// Latent frames per second
    pub frame_rate: f64,
    /// Entries per codebook
    pub cardinality: u32,
    pub total_codebooks: u32,
    /// Target bandwidths in kbps, for codecs with variable bandwidth
    pub target_bandwidths: &'static [f64],
}

impl CodecSpec {
    /// Number of codebooks for each target bandwidth:
    /// `bw * 1000 / (frame_rate * log2(cardinality))`
    pub fn possible_num_codebooks(&self) -> Vec<u32> {
        let bits_per_step = self.frame_rate * f64::from(self.cardinality).log2();
        self.target_bandwidths
            .iter()
            .map(|bw| (bw * 1000.0 / bits_per_step).round() as u32)
            .collect()
    }

    /// Token rate the LM models, in tokens per second across codebooks
    pub fn tokens_per_second(&self, num_codebooks: u32) -> f64 {
        self.frame_rate * f64::from(num_codebooks)
    }
}

impl PretrainedCodec {
    pub fn from_name(name: &str) -> Self {
        match name {
            "dac_44khz" => PretrainedCodec::Dac44khz,
            "dac_24khz" => PretrainedCodec::Dac24khz,
            "sqcodec" => PretrainedCodec::SqCodec,
            "wavtokenizer" => PretrainedCodec::WavTokenizer,
            "debug_compression_model" => PretrainedCodec::DebugCompressionModel,
            "audiogen_encodec_16khz" => PretrainedCodec::AudiogenEncodec16khz,
            "facebook/encodec_24khz" => PretrainedCodec::Encodec24khz,
            "facebook/encodec_32khz" => PretrainedCodec::Encodec32khz,
            other => PretrainedCodec::Hub(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PretrainedCodec::Dac44khz => "dac_44khz",
            PretrainedCodec::Dac24khz => "dac_24khz",
            PretrainedCodec::SqCodec => "sqcodec",
            PretrainedCodec::WavTokenizer => "wavtokenizer",
            PretrainedCodec::DebugCompressionModel => "debug_compression_model",
            PretrainedCodec::AudiogenEncodec16khz => "audiogen_encodec_16khz",
            PretrainedCodec::Encodec24khz => "facebook/encodec_24khz",
            PretrainedCodec::Encodec32khz => "facebook/encodec_32khz",
            PretrainedCodec::Hub(name) => name,
        }
    }

    /// Known properties; `None` for codecs whose geometry depends on the
    /// checkpoint
    pub fn spec(&self) -> Option<CodecSpec> {
        let spec = match self {
            PretrainedCodec::Dac44khz => CodecSpec {
                sample_rate: 44100,
                channels: 1,
                frame_rate: 44100.0 / 512.0,
                cardinality: 1024,
                total_codebooks: 9,
                target_bandwidths: &[],
            },
            PretrainedCodec::Dac24khz => CodecSpec {
                sample_rate: 24000,
                channels: 1,
                frame_rate: 24000.0 / 320.0,
                cardinality: 1024,
                total_codebooks: 32,
                target_bandwidths: &[],
            },
            PretrainedCodec::WavTokenizer => CodecSpec {
                sample_rate: 24000,
                channels: 1,
                frame_rate: 75.0,
                cardinality: 4096,
                total_codebooks: 1,
                target_bandwidths: &[],
            },
            PretrainedCodec::AudiogenEncodec16khz => CodecSpec {
                sample_rate: 16000,
                channels: 1,
                frame_rate: 50.0,
                cardinality: 2048,
                total_codebooks: 4,
                target_bandwidths: &[],
            },
            PretrainedCodec::Encodec24khz => CodecSpec {
                sample_rate: 24000,
                channels: 1,
                frame_rate: 75.0,
                cardinality: 1024,
                total_codebooks: 32,
                target_bandwidths: &[1.5, 3.0, 6.0, 12.0, 24.0],
            },
            PretrainedCodec::Encodec32khz => CodecSpec {
                sample_rate: 32000,
                channels: 1,
                frame_rate: 50.0,
                cardinality: 2048,
                total_codebooks: 4,
                target_bandwidths: &[2.2],
            },
            PretrainedCodec::SqCodec => CodecSpec {
                sample_rate: 16000,
                channels: 1,
                frame_rate: 50.0,
                cardinality: 19683,
                total_codebooks: 4,
                target_bandwidths: &[],
            },
            PretrainedCodec::DebugCompressionModel | PretrainedCodec::Hub(_) => return None,
        };
        Some(spec)
    }
}
