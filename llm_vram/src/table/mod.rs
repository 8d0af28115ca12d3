use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    architecture::ArchitectureDescriptor,
    error::{VramError, VramResult},
    estimate::{
        config::{EstimatorConfig, DEFAULT_CONTEXT_LENGTH},
        math::{effective_bits_per_weight, estimate_memory},
        MemoryBreakdown,
    },
    file_encoding_type::{GgmlFileType, ESTIMATION_FORMATS},
};

/// One estimation format sized at every context length of the ladder that could be estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationTableRow {
    pub format: GgmlFileType,
    pub bits_per_weight: f64,
    /// Context length → breakdown, ascending.
    pub estimates: BTreeMap<u64, MemoryBreakdown>,
}

impl QuantizationTableRow {
    pub fn estimate_at(&self, context_length: u64) -> Option<&MemoryBreakdown> {
        self.estimates.get(&context_length)
    }
}

/// A (format, context length) cell the memory model rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedCell {
    pub format: GgmlFileType,
    pub context_length: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationTable {
    pub model_id: String,
    pub architecture: ArchitectureDescriptor,
    pub config: EstimatorConfig,
    /// Sequences every cell was sized for.
    pub batch_size: u64,
    pub available_vram_hint: Option<u64>,
    pub context_length_hint: Option<u64>,
    /// Context length the solver targets when the caller names none.
    pub default_context_length: u64,
    pub rows: Vec<QuantizationTableRow>,
    pub omitted: Vec<OmittedCell>,
}

impl QuantizationTable {
    pub fn row(&self, format: GgmlFileType) -> Option<&QuantizationTableRow> {
        self.rows.iter().find(|row| row.format == format)
    }

    /// `true` when every cell of every estimation format was estimated.
    pub fn is_complete(&self) -> bool {
        self.omitted.is_empty()
    }

    /// The same model and config sized for `batch_size` parallel sequences.
    pub fn with_batch_size(&self, batch_size: u64) -> VramResult<QuantizationTable> {
        let mut config = self.config.clone();
        config.batch_size = batch_size;
        generate_quantization_table_with_config(
            self.model_id.clone(),
            &self.architecture,
            self.available_vram_hint,
            self.context_length_hint,
            &config,
        )
    }
}

/// Sizes every estimation format over the default context ladder.
///
/// See [`generate_quantization_table_with_config`].
pub fn generate_quantization_table(
    model_id: impl Into<String>,
    architecture: &ArchitectureDescriptor,
    available_vram_hint: Option<u64>,
    context_length_hint: Option<u64>,
) -> VramResult<QuantizationTable> {
    generate_quantization_table_with_config(
        model_id,
        architecture,
        available_vram_hint,
        context_length_hint,
        &EstimatorConfig::default(),
    )
}

/// Sizes every estimation format at every context length of `config.context_ladder`.
///
/// Cells the memory model rejects are left out and listed in [`QuantizationTable::omitted`];
/// a format without any estimated cell gets no row. Formats are estimated in parallel.
///
/// # Errors
/// * [`VramError::InvalidConfig`] if `config` does not validate.
/// * [`VramError::TableGenerationFailed`] if no cell at all could be estimated. The reason is
///   that of the first omitted cell.
pub fn generate_quantization_table_with_config(
    model_id: impl Into<String>,
    architecture: &ArchitectureDescriptor,
    available_vram_hint: Option<u64>,
    context_length_hint: Option<u64>,
    config: &EstimatorConfig,
) -> VramResult<QuantizationTable> {
    let model_id = model_id.into();
    config.validate()?;
    let ladder = config.sorted_ladder();

    let mut architecture = architecture.clone();
    if architecture.name.is_empty() {
        architecture.name = model_id.clone();
    }
    check_descriptor_hints(&architecture);

    let per_format: Vec<(Option<QuantizationTableRow>, Vec<OmittedCell>)> = ESTIMATION_FORMATS
        .par_iter()
        .map(|format| estimate_row(&architecture, *format, &ladder, config))
        .collect();

    let mut rows = Vec::with_capacity(per_format.len());
    let mut omitted = Vec::new();
    for (row, cells) in per_format {
        rows.extend(row);
        omitted.extend(cells);
    }
    for cell in &omitted {
        crate::debug!(
            model = model_id.as_str(),
            format = cell.format.as_str(),
            context_length = cell.context_length,
            reason = cell.reason.as_str(),
            "omitted table cell"
        );
    }

    if rows.is_empty() {
        let reason = omitted
            .first()
            .map(|cell| cell.reason.clone())
            .unwrap_or_else(|| "no formats were estimated".to_string());
        return Err(VramError::TableGenerationFailed {
            model: model_id,
            reason,
        });
    }

    let default_context_length = context_length_hint
        .filter(|ctx| *ctx > 0)
        .or_else(|| {
            architecture
                .context_length
                .filter(|ctx| *ctx > 0)
                .map(|ctx| ctx.min(DEFAULT_CONTEXT_LENGTH))
        })
        .unwrap_or(DEFAULT_CONTEXT_LENGTH);

    crate::info!(
        model = model_id.as_str(),
        rows = rows.len(),
        omitted = omitted.len(),
        batch_size = config.batch_size,
        default_context_length,
        "generated quantization table"
    );

    Ok(QuantizationTable {
        model_id,
        architecture,
        config: config.clone(),
        batch_size: config.batch_size,
        available_vram_hint: available_vram_hint.filter(|bytes| *bytes > 0),
        context_length_hint: context_length_hint.filter(|ctx| *ctx > 0),
        default_context_length,
        rows,
        omitted,
    })
}

fn estimate_row(
    architecture: &ArchitectureDescriptor,
    format: GgmlFileType,
    ladder: &[u64],
    config: &EstimatorConfig,
) -> (Option<QuantizationTableRow>, Vec<OmittedCell>) {
    let mut estimates = BTreeMap::new();
    let mut omitted = Vec::new();
    for &context_length in ladder {
        match estimate_memory(
            architecture,
            format,
            context_length,
            config.batch_size,
            config,
        ) {
            Ok(breakdown) => {
                estimates.insert(context_length, breakdown);
            }
            Err(e) => omitted.push(OmittedCell {
                format,
                context_length,
                reason: e.to_string(),
            }),
        }
    }
    if estimates.is_empty() {
        return (None, omitted);
    }
    match effective_bits_per_weight(architecture, format, config) {
        Ok(bits_per_weight) => (
            Some(QuantizationTableRow {
                format,
                bits_per_weight,
                estimates,
            }),
            omitted,
        ),
        // Unreachable once a cell succeeded, the model checks the same value.
        Err(_) => (None, omitted),
    }
}

fn check_descriptor_hints(architecture: &ArchitectureDescriptor) {
    if !architecture.parameter_count_is_plausible() {
        crate::warn!(
            model = architecture.name.as_str(),
            parameter_count = architecture.parameter_count,
            ratio = architecture.parameter_count_ratio(),
            "parameter count is far from the structural estimate"
        );
    }
    if architecture.reported_bits_per_weight.is_some()
        && !architecture.file_type.is_some_and(|ft| ft.is_estimated())
    {
        crate::warn!(
            model = architecture.name.as_str(),
            file_type = architecture.file_type.map(|ft| ft.as_str()),
            "reported bits per weight ignored, file type is not an estimation format"
        );
    }
}
