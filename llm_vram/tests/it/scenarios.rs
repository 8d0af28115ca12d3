use llm_vram::*;

use crate::{llama_7b, mistral_7b};

#[test]
fn llama_7b_4bit_at_8k_on_8_gib() {
    let table = generate_quantization_table("llama-7b", &llama_7b(), None, None).unwrap();
    let constraints = VramConstraints::builder()
        .available_vram_bytes(gib_to_bytes(8.0))
        .desired_context_length(8192)
        .desired_format("4-bit".parse::<GgmlFileType>().unwrap())
        .build();
    let estimation = estimate_for_constraints(&table, &constraints).unwrap();

    assert_eq!(estimation.format, GgmlFileType::Q4_K_M);
    assert_eq!(estimation.context_length, 8192);
    assert!(estimation.exact_context_match);
    assert_eq!(estimation.breakdown.weights_bytes, 3_500_000_000);

    let row = table.row(GgmlFileType::Q4_K_M).unwrap();
    let kv_2k = row.estimate_at(2048).unwrap().kv_cache_bytes;
    assert_eq!(estimation.breakdown.kv_cache_bytes, 4 * kv_2k);
    assert_eq!(estimation.fits, estimation.breakdown.total_bytes <= 8 * GIB);
}

#[test]
fn llama_7b_on_4_gib_without_format() {
    let table = generate_quantization_table("llama-7b", &llama_7b(), None, None).unwrap();

    // Short context: the highest fidelity format under the budget.
    let short = estimate_for_constraints(
        &table,
        &VramConstraints::builder()
            .available_vram_bytes(4 * GIB)
            .desired_context_length(2048)
            .build(),
    )
    .unwrap();
    assert!(short.fits);
    assert!(short.breakdown.total_bytes <= 4 * GIB);
    for rec in &short.recommendations {
        if rec.bits_per_weight > short.bits_per_weight {
            assert!(!rec.fits, "{rec:?} fits but was passed over");
        }
    }

    // Long context: the KV-cache alone exceeds the budget.
    let long = estimate_for_constraints(
        &table,
        &VramConstraints::builder()
            .available_vram_bytes(4 * GIB)
            .desired_context_length(8192)
            .build(),
    )
    .unwrap();
    assert!(!long.fits);
    let smallest = long
        .recommendations
        .iter()
        .map(|r| r.total_bytes)
        .min()
        .unwrap();
    assert_eq!(long.breakdown.total_bytes, smallest);
}

#[test]
fn unconstrained_always_fits() {
    for arch in [llama_7b(), mistral_7b()] {
        let table = generate_quantization_table(arch.name.clone(), &arch, None, None).unwrap();
        let estimation = estimate_for_constraints(&table, &VramConstraints::default()).unwrap();
        assert!(estimation.fits);
        assert_eq!(estimation.format, GgmlFileType::F16);
        assert_eq!(estimation.available_vram_bytes, None);
    }
}

#[test]
fn missing_embedding_length_fails_generation() {
    let mut arch = llama_7b();
    arch.embedding_length = None;
    let err = generate_quantization_table("llama-7b", &arch, None, None).unwrap_err();
    assert!(matches!(err, VramError::TableGenerationFailed { .. }));
    assert!(err.to_string().contains("llama-7b"));
}

#[test]
fn nearest_context_prefers_larger_on_tie() {
    let table = generate_quantization_table("mistral-7b", &mistral_7b(), None, None).unwrap();
    let estimation = estimate_for_constraints(
        &table,
        &VramConstraints::builder()
            .desired_context_length(6144)
            .desired_format(GgmlFileType::Q8_0)
            .build(),
    )
    .unwrap();
    assert_eq!(estimation.context_length, 8192);
    assert!(!estimation.exact_context_match);
    assert!(!estimation.exceeds_model_context);
    let cell = table
        .row(GgmlFileType::Q8_0)
        .unwrap()
        .estimate_at(8192)
        .unwrap();
    assert_eq!(&estimation.breakdown, cell);
}

#[test]
fn reported_bits_override_only_their_format() {
    let mut arch = mistral_7b();
    arch.file_type = Some("Mistral-7B-Instruct-v0.3-Q4_K_M.gguf".parse().unwrap());
    arch.reported_bits_per_weight = Some(4.83);
    let table = generate_quantization_table("mistral-7b", &arch, None, None).unwrap();

    assert_eq!(table.row(GgmlFileType::Q4_K_M).unwrap().bits_per_weight, 4.83);
    assert_eq!(table.row(GgmlFileType::Q5_K_M).unwrap().bits_per_weight, 5.0);
    assert_eq!(table.row(GgmlFileType::Q3_K_M).unwrap().bits_per_weight, 3.0);
}

#[test]
fn descriptor_from_parser_json() {
    let json = r#"{
        "name": "Meta-Llama-3.1-8B-Instruct",
        "architecture": "llama",
        "parameter_count": 8030261248,
        "embedding_length": 4096,
        "block_count": 32,
        "head_count": 32,
        "head_count_kv": 8,
        "feed_forward_length": 14336,
        "context_length": 131072
    }"#;
    let arch: ArchitectureDescriptor = serde_json::from_str(json).unwrap();
    let table = generate_quantization_table(arch.name.clone(), &arch, Some(24 * GIB), None).unwrap();
    assert_eq!(table.default_context_length, 8192);

    let estimation = estimate_for_constraints(&table, &VramConstraints::default()).unwrap();
    assert_eq!(estimation.available_vram_bytes, Some(24 * GIB));
    assert!(estimation.fits);
    assert_eq!(estimation.format, GgmlFileType::F16);

    let serialized = serde_json::to_value(&estimation).unwrap();
    assert_eq!(serialized["format"], "F16");
    assert_eq!(serialized["model_id"], "Meta-Llama-3.1-8B-Instruct");
}

#[test]
fn custom_config_changes_the_model() {
    let config = EstimatorConfig::builder()
        .context_ladder(vec![1024, 4096])
        .kv_cache_type(GgmlFileType::Q8_0)
        .overhead_fixed_bytes(0)
        .overhead_fraction(0.0)
        .activation_coefficient(0.0)
        .build();
    let table =
        generate_quantization_table_with_config("llama-7b", &llama_7b(), None, None, &config)
            .unwrap();
    let cell = table
        .row(GgmlFileType::Q8_0)
        .unwrap()
        .estimate_at(1024)
        .unwrap();
    // 2 · 32 · 4096 · 1024 elements at 34 bytes per 32.
    assert_eq!(cell.kv_cache_bytes, 285_212_672);
    assert_eq!(cell.total_bytes, cell.weights_bytes + cell.kv_cache_bytes);
    assert_eq!(table.row(GgmlFileType::Q8_0).unwrap().estimates.len(), 2);
}
