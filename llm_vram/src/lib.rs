//! # llm_vram
//!
//! Estimates the GPU memory a quantized GGUF model needs and picks the quantization and context
//! length that fit a memory budget.
//!
//! ```text
//! ArchitectureDescriptor ──► generate_quantization_table ──► QuantizationTable
//!                                   (estimate_memory × formats × ladder)
//!                                                                  │
//!                          VramConstraints ──► estimate_for_constraints ──► VramEstimation
//! ```
//!
//! ```rust
//! use llm_vram::*;
//!
//! let llama = ArchitectureDescriptor::builder()
//!     .name("llama-7b")
//!     .parameter_count(7_000_000_000)
//!     .embedding_length(4096)
//!     .block_count(32)
//!     .head_count(32)
//!     .feed_forward_length(11008)
//!     .context_length(4096)
//!     .build();
//!
//! let table = generate_quantization_table("llama-7b", &llama, None, None)?;
//! let constraints = VramConstraints::builder()
//!     .available_vram_bytes(gib_to_bytes(8.0))
//!     .desired_context_length(4096)
//!     .build();
//! let estimation = estimate_for_constraints(&table, &constraints)?;
//! assert!(estimation.fits);
//! # Ok::<(), VramError>(())
//! ```
//!
//! The engine is stateless; all tunables travel in an [`EstimatorConfig`].

pub mod architecture;
pub mod error;
pub mod estimate;
pub mod file_encoding_type;
pub mod solver;
pub mod table;

pub use architecture::{Architecture, ArchitectureDescriptor, Dimensions};
pub use error::{VramError, VramResult};
pub use estimate::{
    bytes_to_gib, estimate_memory, gib_to_bytes, BitsPerWeightMode, EstimatorConfig,
    MemoryBreakdown, MemoryComponent, DEFAULT_CONTEXT_LADDER, GIB,
};
pub use file_encoding_type::{BlockLayout, GgmlFileType, GgmlFileTypeError, ESTIMATION_FORMATS};
pub use solver::{estimate_for_constraints, Recommendation, VramConstraints, VramEstimation};
pub use table::{
    generate_quantization_table, generate_quantization_table_with_config, OmittedCell,
    QuantizationTable, QuantizationTableRow,
};

#[allow(unused_imports)]
use tracing::{debug, info, trace, warn};
