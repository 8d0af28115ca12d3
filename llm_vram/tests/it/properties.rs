use llm_vram::*;

use crate::{llama_7b, mistral_7b, tiny_llama};

fn fixtures() -> Vec<ArchitectureDescriptor> {
    vec![llama_7b(), mistral_7b(), tiny_llama()]
}

#[test]
fn components_sum_to_total() {
    for arch in fixtures() {
        for batch_size in [1, 3, 8] {
            let config = EstimatorConfig::builder().batch_size(batch_size).build();
            let table =
                generate_quantization_table_with_config(arch.name.clone(), &arch, None, None, &config)
                    .unwrap();
            for row in &table.rows {
                for b in row.estimates.values() {
                    assert_eq!(
                        b.weights_bytes + b.kv_cache_bytes + b.activation_bytes + b.overhead_bytes,
                        b.total_bytes,
                        "{} {}",
                        arch.name,
                        row.format
                    );
                }
            }
        }
    }
}

#[test]
fn total_grows_with_context() {
    for arch in fixtures() {
        for batch_size in [1, 4] {
            let config = EstimatorConfig::builder().batch_size(batch_size).build();
            let table =
                generate_quantization_table_with_config(arch.name.clone(), &arch, None, None, &config)
                    .unwrap();
            for row in &table.rows {
                let totals: Vec<u64> = row.estimates.values().map(|b| b.total_bytes).collect();
                assert!(
                    totals.windows(2).all(|w| w[0] <= w[1]),
                    "{} {} {totals:?}",
                    arch.name,
                    row.format
                );
            }
        }
    }
}

#[test]
fn fewer_bits_never_weigh_more() {
    for arch in fixtures() {
        let table = generate_quantization_table(arch.name.clone(), &arch, None, None).unwrap();
        let mut rows: Vec<&QuantizationTableRow> = table.rows.iter().collect();
        rows.sort_by(|a, b| a.bits_per_weight.total_cmp(&b.bits_per_weight));
        for pair in rows.windows(2) {
            for (ctx, lower) in &pair[0].estimates {
                let higher = &pair[1].estimates[ctx];
                assert!(lower.weights_bytes <= higher.weights_bytes);
                assert!(lower.total_bytes <= higher.total_bytes);
                assert_eq!(lower.kv_cache_bytes, higher.kv_cache_bytes);
            }
        }
    }
}

#[test]
fn exact_ladder_context_returns_that_cell() {
    let table = generate_quantization_table("tinyllama", &tiny_llama(), None, None).unwrap();
    for &ctx in &DEFAULT_CONTEXT_LADDER {
        for &format in ESTIMATION_FORMATS {
            let estimation = estimate_for_constraints(
                &table,
                &VramConstraints::builder()
                    .desired_context_length(ctx)
                    .desired_format(format)
                    .build(),
            )
            .unwrap();
            assert!(estimation.exact_context_match);
            assert_eq!(
                &estimation.breakdown,
                table.row(format).unwrap().estimate_at(ctx).unwrap()
            );
        }
    }
}

#[test]
fn selection_is_consistent_with_budget() {
    let arch = mistral_7b();
    let table = generate_quantization_table("mistral-7b", &arch, None, None).unwrap();
    for gib in [1.0, 2.5, 4.0, 6.0, 8.0, 12.0, 16.0, 24.0] {
        let budget = gib_to_bytes(gib);
        let estimation = estimate_for_constraints(
            &table,
            &VramConstraints::builder().available_vram_bytes(budget).build(),
        )
        .unwrap();
        assert_eq!(estimation.fits, estimation.breakdown.total_bytes <= budget);
        let any_fits = estimation.recommendations.iter().any(|r| r.fits);
        assert_eq!(estimation.fits, any_fits, "{gib} GiB");
        if estimation.fits {
            let best = estimation
                .recommendations
                .iter()
                .filter(|r| r.fits)
                .map(|r| r.bits_per_weight)
                .fold(f64::MIN, f64::max);
            assert_eq!(estimation.bits_per_weight, best, "{gib} GiB");
        }
    }
}

#[test]
fn memory_model_matches_table_cells() {
    let arch = llama_7b();
    let config = EstimatorConfig::default();
    let table = generate_quantization_table("llama-7b", &arch, None, None).unwrap();
    for row in &table.rows {
        for (&ctx, cell) in &row.estimates {
            let direct = estimate_memory(&arch, row.format, ctx, 1, &config).unwrap();
            assert_eq!(&direct, cell);
        }
    }
}
