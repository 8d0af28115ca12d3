use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    error::{VramError, VramResult},
    file_encoding_type::GgmlFileType,
};

/// Transformer blocks carry roughly `12 · embedding²` weights each (attention + FFN).
pub const STRUCTURAL_MULTIPLIER: u64 = 12;

/// Parameter counts further than this factor from the structural estimate are reported.
pub const PLAUSIBLE_PARAMETER_RATIO: f64 = 4.0;

/// Model family from `general.architecture`. Lowercase in metadata; unknown names are kept,
/// lowercased, in `Other`.
///
/// Selects a per-family activation coefficient from the estimator config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum Architecture {
    Llama,
    Mpt,
    GptNeoX,
    GptJ,
    Gpt2,
    Bloom,
    Falcon,
    Mamba,
    Rwkv,
    Other(String),
}

impl Architecture {
    /// Case-insensitive; never fails.
    pub fn from_str(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "llama" => Self::Llama,
            "mpt" => Self::Mpt,
            "gptneox" => Self::GptNeoX,
            "gptj" => Self::GptJ,
            "gpt2" => Self::Gpt2,
            "bloom" => Self::Bloom,
            "falcon" => Self::Falcon,
            "mamba" => Self::Mamba,
            "rwkv" => Self::Rwkv,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Llama => "llama",
            Self::Mpt => "mpt",
            Self::GptNeoX => "gptneox",
            Self::GptJ => "gptj",
            Self::Gpt2 => "gpt2",
            Self::Bloom => "bloom",
            Self::Falcon => "falcon",
            Self::Mamba => "mamba",
            Self::Rwkv => "rwkv",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Architecture {
    fn from(raw: String) -> Self {
        Self::from_str(&raw)
    }
}

impl From<Architecture> for String {
    fn from(arch: Architecture) -> Self {
        arch.as_str().to_owned()
    }
}

impl core::fmt::Display for Architecture {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural dimensions of a model, as resolved by the metadata parser.
///
/// Every dimension is optional because the parser may fail to resolve a key; the memory model
/// rejects absent and zero values alike.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct ArchitectureDescriptor {
    /// Model name, e.g. `general.name`.
    #[builder(default)]
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub architecture: Option<Architecture>,

    /// Total trainable weights.
    #[serde(default)]
    pub parameter_count: Option<u64>,

    /// **Also known as** `n_embd`.
    #[serde(default)]
    pub embedding_length: Option<u64>,

    /// Transformer blocks, `n_layer`.
    #[serde(default)]
    pub block_count: Option<u64>,

    /// Attention heads per block, `n_head`.
    #[serde(default)]
    pub head_count: Option<u64>,

    /// Key/value heads for grouped-query attention, `n_head_kv`. Equal to `head_count` when
    /// absent.
    #[serde(default)]
    pub head_count_kv: Option<u64>,

    /// `n_ff`.
    #[serde(default)]
    pub feed_forward_length: Option<u64>,

    /// Maximum context length the model was trained on, `n_ctx`.
    #[serde(default)]
    pub context_length: Option<u64>,

    /// Quantization of the file the metadata came from (`general.file_type`).
    #[serde(default)]
    pub file_type: Option<GgmlFileType>,

    /// Measured bits per weight of that file. Overrides the nominal value for `file_type` only.
    #[serde(default)]
    pub reported_bits_per_weight: Option<f64>,
}

/// The validated dimensions the memory model works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub parameter_count: u64,
    pub embedding_length: u64,
    pub block_count: u64,
    pub head_count: u64,
    pub head_count_kv: u64,
    pub feed_forward_length: u64,
    pub context_length: u64,
}

impl Dimensions {
    /// Width of one layer's cached keys (or values): `n_embd / (n_head / n_head_kv)`, rounded
    /// up. At least 1.
    ///
    /// `None` if `n_embd · n_head_kv` overflows.
    pub fn kv_width(&self) -> Option<u64> {
        self.embedding_length
            .checked_mul(self.head_count_kv)
            .map(|width| width.div_ceil(self.head_count))
    }
}

impl ArchitectureDescriptor {
    /// Checks every required dimension is present and positive.
    pub fn validate(&self) -> VramResult<Dimensions> {
        let head_count = self.required("head_count", self.head_count)?;
        let head_count_kv = match self.head_count_kv {
            None => head_count,
            Some(0) => {
                return Err(VramError::invalid_architecture(
                    &self.name,
                    "head_count_kv",
                    "must be positive",
                ))
            }
            Some(kv) if kv > head_count => {
                return Err(VramError::invalid_architecture(
                    &self.name,
                    "head_count_kv",
                    format!("{kv} exceeds head_count {head_count}"),
                ))
            }
            Some(kv) => kv,
        };

        Ok(Dimensions {
            parameter_count: self.required("parameter_count", self.parameter_count)?,
            embedding_length: self.required("embedding_length", self.embedding_length)?,
            block_count: self.required("block_count", self.block_count)?,
            head_count,
            head_count_kv,
            feed_forward_length: self.required("feed_forward_length", self.feed_forward_length)?,
            context_length: self.required("context_length", self.context_length)?,
        })
    }

    fn required(&self, field: &'static str, value: Option<u64>) -> VramResult<u64> {
        match value {
            Some(v) if v > 0 => Ok(v),
            Some(_) => Err(VramError::invalid_architecture(
                &self.name,
                field,
                "must be positive",
            )),
            None => Err(VramError::invalid_architecture(
                &self.name,
                field,
                "is missing",
            )),
        }
    }

    /// Ratio of the declared parameter count to `embedding × blocks × 12 · embedding`.
    ///
    /// `None` when a dimension is missing. Architectures vary, so this is a hint, not a check.
    pub fn parameter_count_ratio(&self) -> Option<f64> {
        let params = self.parameter_count.filter(|v| *v > 0)?;
        let embd = self.embedding_length.filter(|v| *v > 0)?;
        let blocks = self.block_count.filter(|v| *v > 0)?;
        let structural = embd as f64 * blocks as f64 * STRUCTURAL_MULTIPLIER as f64 * embd as f64;
        Some(params as f64 / structural)
    }

    pub fn parameter_count_is_plausible(&self) -> bool {
        match self.parameter_count_ratio() {
            Some(ratio) => {
                (1.0 / PLAUSIBLE_PARAMETER_RATIO..=PLAUSIBLE_PARAMETER_RATIO).contains(&ratio)
            }
            None => true,
        }
    }

    /// The bits per weight reported by the parser, if it applies to `format`.
    pub fn reported_bits_for(&self, format: GgmlFileType) -> Option<f64> {
        match self.file_type {
            Some(ft) if ft == format => self.reported_bits_per_weight,
            _ => None,
        }
    }
}
