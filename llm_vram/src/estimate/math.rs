//! ## Memory model
//!
//! Pure, allocation-free helpers that size one configuration of a model:
//!
//! ```text
//! Weights     = ⌈P · bpw / 8⌉
//! KV          = ⌈2 · L · ⌈E / G⌉ · C · B · bits_kv / 8⌉      G = N_head / N_head_kv
//! Activations = ⌈Weights · a⌉
//! Overhead    = O_fixed + ⌈(Weights + KV + Activations) · o⌉
//! Total       = Weights + KV + Activations + Overhead
//!
//!   P  – parameter count            L – block count
//!   E  – embedding length           C – context length
//!   B  – batch size                 a – activation coefficient
//!   bpw – reported override, else nominal (or block) bits of the format
//!   bits_kv – bits of the KV-cache type (F16 ⇒ 2 bytes per element)
//! ```
//!
//! ### Design notes
//! * The KV term is exact integer arithmetic on the cache type's block layout, so it is linear
//!   in context length and batch size to the byte.
//! * Fractional terms are rounded **up** so the estimate never under-reports.
//! * Every helper returns `None` on `u64` overflow; [`estimate_memory`] turns that into
//!   [`VramError::EstimateOverflow`].

use crate::{
    architecture::ArchitectureDescriptor,
    error::{VramError, VramResult},
    estimate::{breakdown::MemoryBreakdown, config::EstimatorConfig},
    file_encoding_type::GgmlFileType,
};

/// Sizes `format` at `context_length` tokens for `batch_size` parallel sequences.
///
/// # Errors
/// * [`VramError::UnsupportedFormat`] if `format` is not one of the estimation formats.
/// * [`VramError::InvalidArchitecture`] if a required dimension is missing or non-positive, or
///   the reported bits per weight for `format` is not a positive number.
/// * [`VramError::InvalidConstraints`] for a zero context length or batch size.
/// * [`VramError::EstimateOverflow`] if a term does not fit in `u64`.
pub fn estimate_memory(
    architecture: &ArchitectureDescriptor,
    format: GgmlFileType,
    context_length: u64,
    batch_size: u64,
    config: &EstimatorConfig,
) -> VramResult<MemoryBreakdown> {
    let model = architecture.name.as_str();
    if !format.is_estimated() {
        return Err(VramError::UnsupportedFormat {
            model: model.to_owned(),
            format,
        });
    }
    if context_length == 0 {
        return Err(VramError::InvalidConstraints {
            field: "context_length",
            reason: "must be at least 1".to_string(),
        });
    }
    if batch_size == 0 {
        return Err(VramError::InvalidConstraints {
            field: "batch_size",
            reason: "must be at least 1".to_string(),
        });
    }
    let dims = architecture.validate()?;
    let bpw = effective_bits_per_weight(architecture, format, config)?;

    let weights = weights_bytes(dims.parameter_count, bpw)
        .ok_or_else(|| VramError::overflow(model, "weights"))?;
    let kv_width = dims
        .kv_width()
        .ok_or_else(|| VramError::overflow(model, "kv width"))?;
    let kv = kv_cache_bytes(
        dims.block_count,
        kv_width,
        context_length,
        batch_size,
        config.kv_cache_type,
    )
    .ok_or_else(|| VramError::overflow(model, "kv cache"))?;
    let activations = activation_bytes(
        weights,
        config.activation_coefficient_for(architecture.architecture.as_ref()),
    )
    .ok_or_else(|| VramError::overflow(model, "activations"))?;
    let overhead = weights
        .checked_add(kv)
        .and_then(|s| s.checked_add(activations))
        .and_then(|subtotal| {
            overhead_bytes(
                subtotal,
                config.overhead_fixed_bytes,
                config.overhead_fraction,
            )
        })
        .ok_or_else(|| VramError::overflow(model, "overhead"))?;

    let breakdown = MemoryBreakdown::new(weights, kv, activations, overhead)
        .ok_or_else(|| VramError::overflow(model, "total"))?;
    crate::trace!(
        model,
        format = format.as_str(),
        context_length,
        batch_size,
        total_bytes = breakdown.total_bytes,
        "estimated memory"
    );
    Ok(breakdown)
}

/// The bits per weight used for `format`: the parser's reported value when it describes this
/// format, else the configured view of the format's own bits.
pub fn effective_bits_per_weight(
    architecture: &ArchitectureDescriptor,
    format: GgmlFileType,
    config: &EstimatorConfig,
) -> VramResult<f64> {
    match architecture.reported_bits_for(format) {
        Some(bits) if bits.is_finite() && bits > 0.0 => Ok(bits),
        Some(bits) => Err(VramError::invalid_architecture(
            &architecture.name,
            "reported_bits_per_weight",
            format!("{bits} is not a positive number"),
        )),
        None => Ok(config.bits_per_weight_mode.bits_for(format)),
    }
}

pub fn weights_bytes(parameter_count: u64, bits_per_weight: f64) -> Option<u64> {
    ceil_to_u64(parameter_count as f64 * bits_per_weight / 8.0)
}

/// Keys and values for every block, token and sequence, stored as `kv_cache_type`.
pub fn kv_cache_bytes(
    block_count: u64,
    kv_width: u64,
    context_length: u64,
    batch_size: u64,
    kv_cache_type: GgmlFileType,
) -> Option<u64> {
    let elements = 2u64
        .checked_mul(block_count)?
        .checked_mul(kv_width)?
        .checked_mul(context_length)?
        .checked_mul(batch_size)?;
    let block = kv_cache_type.block();
    Some(
        elements
            .checked_mul(u64::from(block.bytes))?
            .div_ceil(u64::from(block.weights)),
    )
}

pub fn activation_bytes(weights_bytes: u64, coefficient: f64) -> Option<u64> {
    ceil_to_u64(weights_bytes as f64 * coefficient)
}

pub fn overhead_bytes(subtotal_bytes: u64, fixed_bytes: u64, fraction: f64) -> Option<u64> {
    fixed_bytes.checked_add(ceil_to_u64(subtotal_bytes as f64 * fraction)?)
}

fn ceil_to_u64(value: f64) -> Option<u64> {
    // u64::MAX as f64 rounds up to 2^64, so `>=` rejects everything that cannot be cast.
    if !value.is_finite() || value < 0.0 || value >= u64::MAX as f64 {
        return None;
    }
    Some(value.ceil() as u64)
}
