use serde::{Deserialize, Serialize};

use crate::estimate::config::GIB;

/// Memory footprint of one (format, context length, batch size) configuration, in bytes.
///
/// The memory model builds every breakdown through [`MemoryBreakdown::new`], which derives
/// `total_bytes` from the four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBreakdown {
    pub weights_bytes: u64,
    pub kv_cache_bytes: u64,
    pub activation_bytes: u64,
    pub overhead_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryComponent {
    Weights,
    KvCache,
    Activations,
    Overhead,
}

impl MemoryBreakdown {
    /// `None` when the sum does not fit in `u64`.
    pub fn new(
        weights_bytes: u64,
        kv_cache_bytes: u64,
        activation_bytes: u64,
        overhead_bytes: u64,
    ) -> Option<Self> {
        let total_bytes = weights_bytes
            .checked_add(kv_cache_bytes)?
            .checked_add(activation_bytes)?
            .checked_add(overhead_bytes)?;
        Some(Self {
            weights_bytes,
            kv_cache_bytes,
            activation_bytes,
            overhead_bytes,
            total_bytes,
        })
    }

    pub fn component_bytes(&self, component: MemoryComponent) -> u64 {
        match component {
            MemoryComponent::Weights => self.weights_bytes,
            MemoryComponent::KvCache => self.kv_cache_bytes,
            MemoryComponent::Activations => self.activation_bytes,
            MemoryComponent::Overhead => self.overhead_bytes,
        }
    }

    /// Fraction of the total taken by `component`, in `0.0..=1.0`.
    pub fn share_of_total(&self, component: MemoryComponent) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.component_bytes(component) as f64 / self.total_bytes as f64
    }

    pub fn fits_within(&self, available_bytes: Option<u64>) -> bool {
        available_bytes.map_or(true, |budget| self.total_bytes <= budget)
    }

    pub fn total_gib(&self) -> f64 {
        bytes_to_gib(self.total_bytes)
    }
}

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB as f64
}

impl std::fmt::Display for MemoryBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total: {:.2} GiB", self.total_gib())?;
        llm_logging::i_nlns(
            f,
            &[
                format_args!(
                    "weights: {:.2} GiB ({:.1}%)",
                    bytes_to_gib(self.weights_bytes),
                    self.share_of_total(MemoryComponent::Weights) * 100.0
                ),
                format_args!(
                    "kv cache: {:.2} GiB ({:.1}%)",
                    bytes_to_gib(self.kv_cache_bytes),
                    self.share_of_total(MemoryComponent::KvCache) * 100.0
                ),
                format_args!(
                    "activations: {:.2} GiB ({:.1}%)",
                    bytes_to_gib(self.activation_bytes),
                    self.share_of_total(MemoryComponent::Activations) * 100.0
                ),
            ],
        )?;
        llm_logging::i_ln(
            f,
            format_args!(
                "overhead: {:.2} GiB ({:.1}%)",
                bytes_to_gib(self.overhead_bytes),
                self.share_of_total(MemoryComponent::Overhead) * 100.0
            ),
        )
    }
}
