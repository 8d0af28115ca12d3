pub mod breakdown;
pub mod config;
pub mod math;

pub use breakdown::{bytes_to_gib, MemoryBreakdown, MemoryComponent};
pub use config::{
    gib_to_bytes, BitsPerWeightMode, EstimatorConfig, DEFAULT_CONTEXT_LADDER,
    DEFAULT_CONTEXT_LENGTH, GIB, MIB,
};
pub use math::{effective_bits_per_weight, estimate_memory};
