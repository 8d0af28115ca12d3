use std::{collections::BTreeMap, path::Path};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    architecture::Architecture,
    error::{VramError, VramResult},
    file_encoding_type::GgmlFileType,
};

pub const GIB: u64 = 1024 * 1024 * 1024;
pub const MIB: u64 = 1024 * 1024;

/// Context lengths every table row is populated for.
pub const DEFAULT_CONTEXT_LADDER: [u64; 7] = [2048, 4096, 8192, 16384, 32768, 65536, 131072];

/// Context length assumed when neither the caller nor the model says otherwise.
pub const DEFAULT_CONTEXT_LENGTH: u64 = 8192;

/// Which bits-per-weight value sizes the weights when the parser reported none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitsPerWeightMode {
    /// The format's bit level, e.g. `4.0` for `Q4_K_M`.
    #[default]
    Nominal,
    /// The format's block storage cost, e.g. `4.5` for `Q4_K_M`.
    Block,
}

impl BitsPerWeightMode {
    pub fn bits_for(self, format: GgmlFileType) -> f64 {
        match self {
            Self::Nominal => format.nominal_bits_per_weight(),
            Self::Block => format.bits_per_weight(),
        }
    }
}

/// Tunables of the memory model. Passed per call; the engine keeps no global configuration.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Context lengths the table generator populates. Sorted and de-duplicated before use.
    #[builder(default = DEFAULT_CONTEXT_LADDER.to_vec())]
    pub context_ladder: Vec<u64>,

    /// Sequences decoded in parallel, each holding its own KV-cache.
    #[builder(default = 1)]
    pub batch_size: u64,

    /// Precision of cached keys and values, independent of the weight format. *Default = F16*.
    #[builder(default = GgmlFileType::F16)]
    pub kv_cache_type: GgmlFileType,

    #[builder(default)]
    pub bits_per_weight_mode: BitsPerWeightMode,

    /// Transient forward-pass buffers as a fraction of the weights.
    #[builder(default = 0.05)]
    pub activation_coefficient: f64,

    /// Per-family replacements for `activation_coefficient`, keyed by `general.architecture`.
    #[builder(default)]
    pub activation_coefficients: BTreeMap<String, f64>,

    /// Runtime reservation (CUDA/Metal context, allocator slack) added to every estimate.
    #[builder(default = 512 * MIB)]
    pub overhead_fixed_bytes: u64,

    /// Fraction of weights + KV-cache + activations added on top of the fixed overhead.
    #[builder(default = 0.02)]
    pub overhead_fraction: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::builder().build()
    }
}

impl EstimatorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> VramResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| VramError::file_system("read config", path, e))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VramResult<()> {
        if self.context_ladder.is_empty() {
            return Err(invalid("context_ladder", "must not be empty"));
        }
        if self.context_ladder.contains(&0) {
            return Err(invalid("context_ladder", "context lengths must be positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        check_fraction("activation_coefficient", self.activation_coefficient)?;
        for coefficient in self.activation_coefficients.values() {
            check_fraction("activation_coefficients", *coefficient)?;
        }
        check_fraction("overhead_fraction", self.overhead_fraction)?;
        Ok(())
    }

    /// The ladder, ascending and without duplicates.
    pub fn sorted_ladder(&self) -> Vec<u64> {
        let mut ladder = self.context_ladder.clone();
        ladder.sort_unstable();
        ladder.dedup();
        ladder
    }

    pub fn activation_coefficient_for(&self, architecture: Option<&Architecture>) -> f64 {
        architecture
            .and_then(|arch| self.activation_coefficients.get(arch.as_str()))
            .copied()
            .unwrap_or(self.activation_coefficient)
    }
}

fn check_fraction(field: &'static str, value: f64) -> VramResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} is not a non-negative number")))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> VramError {
    VramError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

/// Converts a GiB figure, as users quote VRAM, to bytes.
pub fn gib_to_bytes(gib: f64) -> u64 {
    if gib.is_finite() && gib > 0.0 {
        (gib * GIB as f64).round() as u64
    } else {
        0
    }
}
