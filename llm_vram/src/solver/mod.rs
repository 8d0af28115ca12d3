//! Picks the (format, context length) configuration of a [`QuantizationTable`] that best fits a
//! set of constraints, and ranks the alternatives.

mod context;

pub use context::nearest_context_length;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    error::{VramError, VramResult},
    estimate::{bytes_to_gib, MemoryBreakdown},
    file_encoding_type::GgmlFileType,
    table::{QuantizationTable, QuantizationTableRow},
};

/// What the caller asks of a deployment. Every field is optional.
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VramConstraints {
    /// Memory available for the model. `None` or `0` is unconstrained.
    pub available_vram_bytes: Option<u64>,
    pub desired_context_length: Option<u64>,
    /// Restricts the answer to one format instead of the best fitting one.
    pub desired_format: Option<GgmlFileType>,
    /// Parallel sequences. Defaults to the batch size the table was generated at.
    pub batch_size: Option<u64>,
    /// Tokens of a single request; the context is never smaller than this.
    pub sequence_length: Option<u64>,
}

impl Default for VramConstraints {
    fn default() -> Self {
        VramConstraints::builder().build()
    }
}

impl VramConstraints {
    pub fn validate(&self) -> VramResult<()> {
        for (field, value) in [
            ("batch_size", self.batch_size),
            ("sequence_length", self.sequence_length),
            ("desired_context_length", self.desired_context_length),
        ] {
            if value == Some(0) {
                return Err(VramError::InvalidConstraints {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One alternative the caller could deploy instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub format: GgmlFileType,
    pub context_length: u64,
    pub bits_per_weight: f64,
    pub total_bytes: u64,
    pub fits: bool,
}

/// The solver's answer. `fits == false` means no format met the budget; the breakdown is then
/// the smallest configuration available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VramEstimation {
    pub model_id: String,
    pub format: GgmlFileType,
    pub bits_per_weight: f64,
    /// Ladder context length the breakdown was taken from.
    pub context_length: u64,
    pub requested_context_length: u64,
    pub exact_context_match: bool,
    /// The table has no cell for the selected format at the requested context because the
    /// memory model rejected it, so the breakdown comes from a neighbouring context length.
    #[serde(default)]
    pub requested_cell_omitted: bool,
    pub breakdown: MemoryBreakdown,
    pub fits: bool,
    /// The effective budget. `None` when unconstrained.
    pub available_vram_bytes: Option<u64>,
    /// The selected context is longer than the model was trained for.
    pub exceeds_model_context: bool,
    /// Ascending total, ties broken by higher fidelity.
    pub recommendations: Vec<Recommendation>,
    pub table: QuantizationTable,
}

struct Candidate<'a> {
    row: &'a QuantizationTableRow,
    context_length: u64,
    breakdown: &'a MemoryBreakdown,
}

impl Candidate<'_> {
    fn fits(&self, budget: Option<u64>) -> bool {
        self.breakdown.fits_within(budget)
    }
}

/// Resolves `constraints` against `table`.
///
/// # Errors
/// * [`VramError::InvalidConstraints`] for a zero batch size, sequence length or context.
/// * [`VramError::NoEstimatesForModel`] if the table has no rows.
/// * [`VramError::FormatNotAvailable`] if the desired format has no row.
/// * Any table generation error when the table is regenerated for another batch size.
///
/// Exceeding the budget is not an error: the result carries `fits == false`.
pub fn estimate_for_constraints(
    table: &QuantizationTable,
    constraints: &VramConstraints,
) -> VramResult<VramEstimation> {
    constraints.validate()?;
    if table.rows.is_empty() {
        return Err(VramError::NoEstimatesForModel {
            model: table.model_id.clone(),
        });
    }

    let regenerated;
    let table = match constraints.batch_size {
        Some(batch_size) if batch_size != table.batch_size => {
            crate::debug!(
                model = table.model_id.as_str(),
                from = table.batch_size,
                to = batch_size,
                "regenerating table for batch size"
            );
            regenerated = table.with_batch_size(batch_size)?;
            &regenerated
        }
        _ => table,
    };

    let requested_context_length = constraints
        .desired_context_length
        .unwrap_or(table.default_context_length)
        .max(constraints.sequence_length.unwrap_or(0));
    let budget = constraints
        .available_vram_bytes
        .filter(|bytes| *bytes > 0)
        .or(table.available_vram_hint.filter(|bytes| *bytes > 0));

    let mut candidates: Vec<Candidate<'_>> = table
        .rows
        .iter()
        .filter_map(|row| {
            let context_length =
                nearest_context_length(row.estimates.keys().copied(), requested_context_length)?;
            Some(Candidate {
                row,
                context_length,
                breakdown: row.estimates.get(&context_length)?,
            })
        })
        .collect();
    if candidates.is_empty() {
        return Err(VramError::NoEstimatesForModel {
            model: table.model_id.clone(),
        });
    }
    // Highest fidelity first.
    candidates.sort_by(|a, b| b.row.bits_per_weight.total_cmp(&a.row.bits_per_weight));

    let selected = match constraints.desired_format {
        Some(format) => candidates
            .iter()
            .find(|c| c.row.format == format)
            .ok_or_else(|| VramError::FormatNotAvailable {
                model: table.model_id.clone(),
                format,
            })?,
        None => match candidates.iter().find(|c| c.fits(budget)) {
            Some(candidate) => candidate,
            None => candidates
                .iter()
                .min_by(|a, b| {
                    a.breakdown
                        .total_bytes
                        .cmp(&b.breakdown.total_bytes)
                        .then_with(|| b.row.bits_per_weight.total_cmp(&a.row.bits_per_weight))
                })
                .ok_or_else(|| VramError::NoEstimatesForModel {
                    model: table.model_id.clone(),
                })?,
        },
    };
    let fits = selected.fits(budget);
    let requested_cell_omitted = table.omitted.iter().any(|cell| {
        cell.format == selected.row.format && cell.context_length == requested_context_length
    });
    if requested_cell_omitted {
        crate::warn!(
            model = table.model_id.as_str(),
            format = selected.row.format.as_str(),
            requested_context_length,
            context_length = selected.context_length,
            "requested cell was omitted from the table, using the nearest estimate"
        );
    }

    let mut recommendations: Vec<Recommendation> = candidates
        .iter()
        .map(|c| Recommendation {
            format: c.row.format,
            context_length: c.context_length,
            bits_per_weight: c.row.bits_per_weight,
            total_bytes: c.breakdown.total_bytes,
            fits: c.fits(budget),
        })
        .collect();
    recommendations.sort_by(|a, b| {
        a.total_bytes
            .cmp(&b.total_bytes)
            .then_with(|| b.bits_per_weight.total_cmp(&a.bits_per_weight))
    });

    crate::debug!(
        model = table.model_id.as_str(),
        format = selected.row.format.as_str(),
        context_length = selected.context_length,
        requested_context_length,
        total_bytes = selected.breakdown.total_bytes,
        budget,
        fits,
        "selected configuration"
    );

    Ok(VramEstimation {
        model_id: table.model_id.clone(),
        format: selected.row.format,
        bits_per_weight: selected.row.bits_per_weight,
        context_length: selected.context_length,
        requested_context_length,
        exact_context_match: selected.context_length == requested_context_length,
        requested_cell_omitted,
        breakdown: *selected.breakdown,
        fits,
        available_vram_bytes: budget,
        exceeds_model_context: table
            .architecture
            .context_length
            .is_some_and(|max| selected.context_length > max),
        recommendations,
        table: table.clone(),
    })
}

impl std::fmt::Display for VramEstimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "VramEstimation for {}:", self.model_id)?;
        llm_logging::i_nln(f, format_args!("format: {}", self.format))?;
        if self.exact_context_match {
            llm_logging::i_nln(f, format_args!("context length: {}", self.context_length))?;
        } else {
            llm_logging::i_nln(
                f,
                format_args!(
                    "context length: {} (nearest to requested {})",
                    self.context_length, self.requested_context_length
                ),
            )?;
        }
        if self.requested_cell_omitted {
            llm_logging::i_nln(
                f,
                format_args!("warning: no estimate at the requested context length"),
            )?;
        }
        if self.exceeds_model_context {
            llm_logging::i_nln(
                f,
                format_args!("warning: exceeds the model's maximum context length"),
            )?;
        }
        match self.available_vram_bytes {
            Some(budget) => llm_logging::i_nln(
                f,
                format_args!(
                    "fits: {} (budget {:.2} GiB)",
                    if self.fits { "yes" } else { "no" },
                    bytes_to_gib(budget)
                ),
            )?,
            None => llm_logging::i_nln(f, format_args!("fits: yes (unconstrained)"))?,
        }
        llm_logging::i_nln(f, format_args!("{}", self.breakdown))?;
        writeln!(f, "recommendations:")?;
        for rec in &self.recommendations {
            llm_logging::i_nln(
                f,
                format_args!(
                    "{:<8} ctx {:>6}: {:>7.2} GiB{}",
                    rec.format.as_str(),
                    rec.context_length,
                    bytes_to_gib(rec.total_bytes),
                    if rec.fits { "" } else { "  (exceeds budget)" }
                ),
            )?;
        }
        Ok(())
    }
}
