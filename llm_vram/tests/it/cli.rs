use std::io::Write;

use predicates::prelude::*;

const LLAMA_7B_FLAGS: &[&str] = &[
    "--model-id",
    "llama-7b",
    "--parameters",
    "7000000000",
    "--block-count",
    "32",
    "--embedding-length",
    "4096",
    "--head-count",
    "32",
    "--feed-forward-length",
    "11008",
    "--context-length",
    "4096",
];

/// Smoke-test that `--help` prints and exits 0.
#[test]
fn help_shows_usage() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("vram-estimate-cli")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: vram-estimate-cli"))
        .stdout(predicate::str::contains("--vram-gb"));
    Ok(())
}

#[test]
fn json_output_for_flags() -> anyhow::Result<()> {
    let output = assert_cmd::Command::cargo_bin("vram-estimate-cli")?
        .args(LLAMA_7B_FLAGS)
        .args(["--vram-gb", "8", "--ctx", "8192", "--quant", "4-bit", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(json["model_id"], "llama-7b");
    assert_eq!(json["format"], "Q4_K_M");
    assert_eq!(json["context_length"], 8192);
    assert_eq!(json["breakdown"]["weights_bytes"], 3_500_000_000u64);
    assert!(json["fits"].is_boolean());
    Ok(())
}

#[test]
fn summary_for_descriptor_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            "name": "mistral-7b",
            "architecture": "llama",
            "parameter_count": 7241732096,
            "embedding_length": 4096,
            "block_count": 32,
            "head_count": 32,
            "head_count_kv": 8,
            "feed_forward_length": 14336,
            "context_length": 32768
        }}"#
    )?;

    assert_cmd::Command::cargo_bin("vram-estimate-cli")?
        .arg("--architecture-json")
        .arg(file.path())
        .args(["--vram-gb", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VramEstimation for mistral-7b"))
        .stdout(predicate::str::contains("recommendations:"));
    Ok(())
}

#[test]
fn config_file_is_applied() -> anyhow::Result<()> {
    let mut config = tempfile::NamedTempFile::new()?;
    write!(config, r#"{{ "context_ladder": [1024, 2048] }}"#)?;

    let output = assert_cmd::Command::cargo_bin("vram-estimate-cli")?
        .args(LLAMA_7B_FLAGS)
        .arg("--config")
        .arg(config.path())
        .args(["--ctx", "100000", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(json["context_length"], 2048);
    assert_eq!(json["exact_context_match"], false);
    Ok(())
}

#[test]
fn missing_embedding_length_fails() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("vram-estimate-cli")?
        .args([
            "--model-id",
            "broken",
            "--parameters",
            "7000000000",
            "--block-count",
            "32",
            "--head-count",
            "32",
            "--feed-forward-length",
            "11008",
            "--context-length",
            "4096",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no estimates could be generated"))
        .stderr(predicate::str::contains("broken"));
    Ok(())
}

#[test]
fn unknown_quantization_label_fails() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("vram-estimate-cli")?
        .args(LLAMA_7B_FLAGS)
        .args(["--quant", "Q9_Z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Q9_Z"));
    Ok(())
}
