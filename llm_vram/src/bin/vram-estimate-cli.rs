//! VRAM Estimate CLI
//! =================
//!
//! Command-line wrapper around `llm_vram`: describe a model (a JSON descriptor or flags), state
//! the budget, and get the quantization and context length that fit.
//!
//! ## Typical usage
//! ```text
//! # A 7B llama on an 8 GiB card at 8K context
//! $ vram-estimate-cli --parameters 7000000000 --block-count 32 --embedding-length 4096 \
//!       --head-count 32 --feed-forward-length 11008 --context-length 4096 --vram-gb 8 --ctx 8192
//!
//! # Descriptor from the metadata parser, fixed quantization, JSON out
//! $ vram-estimate-cli --architecture-json mistral.json --quant 4-bit --json
//! ```

// cargo run --bin vram-estimate-cli -- --architecture-json model.json --vram-gb 8

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser};
use llm_logging::LoggingConfig;
use llm_vram::*;

#[derive(Debug, Parser)]
#[command(name = "vram-estimate-cli", version)]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    constraints: ConstraintArgs,

    /// Estimator config (JSON `EstimatorConfig`); missing keys take their defaults
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the estimation as JSON instead of a summary
    #[arg(long)]
    json: bool,

    #[arg(long, default_value_t = tracing::Level::WARN)]
    log_level: tracing::Level,

    /// Also write pretty, hourly rotated log files here
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ModelArgs {
    /// Descriptor JSON as produced by the metadata parser; flags below override its fields
    #[arg(long, value_name = "PATH")]
    architecture_json: Option<PathBuf>,

    /// Model id used in reports and errors
    #[arg(long)]
    model_id: Option<String>,

    #[arg(long)]
    parameters: Option<u64>,
    #[arg(long)]
    block_count: Option<u64>,
    #[arg(long)]
    embedding_length: Option<u64>,
    #[arg(long)]
    head_count: Option<u64>,
    #[arg(long)]
    head_count_kv: Option<u64>,
    #[arg(long)]
    feed_forward_length: Option<u64>,
    /// Maximum context length the model supports
    #[arg(long)]
    context_length: Option<u64>,
    /// Architecture family, e.g. `llama` or `falcon`
    #[arg(long)]
    architecture: Option<String>,
    /// Quantization of the file the descriptor came from, e.g. `Q4_K_M`
    #[arg(long, value_name = "LABEL")]
    file_type: Option<String>,
    /// Measured bits per weight of that file
    #[arg(long, value_name = "BPW")]
    reported_bpw: Option<f64>,
}

#[derive(Debug, Args)]
struct ConstraintArgs {
    /// Available VRAM in GiB; 0 or absent is unconstrained
    #[arg(long, value_name = "GIB")]
    vram_gb: Option<f64>,

    /// Desired context length in tokens
    #[arg(long)]
    ctx: Option<u64>,

    /// Desired quantization, e.g. `Q4_K_M`, `4-bit` or `q8`
    #[arg(long, value_name = "LABEL")]
    quant: Option<String>,

    #[arg(long)]
    batch: Option<u64>,

    /// Tokens of a single request
    #[arg(long)]
    seq_len: Option<u64>,
}

impl ModelArgs {
    fn descriptor(&self) -> anyhow::Result<ArchitectureDescriptor> {
        let mut descriptor = match &self.architecture_json {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| VramError::file_system("read architecture", path, e))?;
                serde_json::from_str::<ArchitectureDescriptor>(&raw)
                    .map_err(VramError::from)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => ArchitectureDescriptor::builder().build(),
        };

        if let Some(id) = &self.model_id {
            descriptor.name = id.clone();
        }
        override_field(&mut descriptor.parameter_count, self.parameters);
        override_field(&mut descriptor.block_count, self.block_count);
        override_field(&mut descriptor.embedding_length, self.embedding_length);
        override_field(&mut descriptor.head_count, self.head_count);
        override_field(&mut descriptor.head_count_kv, self.head_count_kv);
        override_field(&mut descriptor.feed_forward_length, self.feed_forward_length);
        override_field(&mut descriptor.context_length, self.context_length);
        override_field(&mut descriptor.reported_bits_per_weight, self.reported_bpw);
        if let Some(family) = &self.architecture {
            descriptor.architecture = Some(Architecture::from_str(family));
        }
        if let Some(label) = &self.file_type {
            descriptor.file_type = Some(GgmlFileType::parse_label(label).map_err(VramError::from)?);
        }
        if descriptor.name.is_empty() {
            descriptor.name = "model".to_string();
        }
        Ok(descriptor)
    }
}

fn override_field<T>(field: &mut Option<T>, flag: Option<T>) {
    if flag.is_some() {
        *field = flag;
    }
}

impl ConstraintArgs {
    fn constraints(&self) -> anyhow::Result<VramConstraints> {
        let desired_format = self
            .quant
            .as_deref()
            .map(GgmlFileType::parse_label)
            .transpose()
            .map_err(VramError::from)?;
        Ok(VramConstraints {
            available_vram_bytes: self.vram_gb.map(gib_to_bytes),
            desired_context_length: self.ctx,
            desired_format,
            batch_size: self.batch,
            sequence_length: self.seq_len,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    LoggingConfig::builder()
        .name("vram-estimate-cli")
        .level(cli.log_level)
        .maybe_log_dir(cli.log_dir.clone())
        .build()
        .install()?;

    let config = match &cli.config {
        Some(path) => EstimatorConfig::from_json_file(path)?,
        None => EstimatorConfig::default(),
    };
    let descriptor = cli.model.descriptor()?;
    let constraints = cli.constraints.constraints()?;

    let table = generate_quantization_table_with_config(
        descriptor.name.clone(),
        &descriptor,
        None,
        None,
        &config,
    )?;
    let estimation = estimate_for_constraints(&table, &constraints)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&estimation)?);
    } else {
        println!("{estimation}");
    }
    Ok(())
}
