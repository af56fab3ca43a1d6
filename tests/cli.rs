use std::fs;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn judge_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sku_judge"));
    for var in [
        "SERPAPI_KEY",
        "BING_SEARCH_KEY",
        "GOOGLE_API_KEY",
        "GOOGLE_CSE_ID",
        "SKU_JUDGE_PROVIDER",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn parse_only_prints_both_records() {
    let output = judge_cmd()
        .env_remove("OPENAI_API_KEY")
        .args(["--parse-only", "CPVC 1 1/2IN COUPLING", "PVC 1/4 BEND 2IN"])
        .output()
        .expect("run CLI");
    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(parsed["A"]["sizes"], serde_json::json!(["1-1/2"]));
    assert_eq!(parsed["A"]["type"], "COUPLING");
    assert_eq!(parsed["B"]["angle_deg"], 90.0);
}

#[test]
fn decisive_mismatch_needs_no_network() {
    let output = judge_cmd()
        .env("OPENAI_API_KEY", "sk-test-not-used")
        .args(["PVC SCH40 TEE 2IN", "CPVC SCH40 TEE 2IN"])
        .output()
        .expect("run CLI");
    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let verdict: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(verdict["same_product"], false);
    assert_eq!(verdict["blocking_reasons"], serde_json::json!(["material mismatch"]));
}

#[test]
fn judge_without_credentials_fails() {
    let output = judge_cmd()
        .env_remove("OPENAI_API_KEY")
        .args(["PVC TEE 2", "PVC TEE 2"])
        .output()
        .expect("run CLI");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
}

#[test]
fn catalog_match_without_credentials_fails() {
    let dir = tempdir().expect("tempdir");
    let supply = dir.path().join("supply.jsonl");
    let catalog = dir.path().join("catalog.jsonl");
    fs::write(
        &supply,
        "{\"Description\": \"PVC TEE 2\", \"Quantity\": 1, \"Price\": 2}\n",
    )
    .expect("write supply");
    fs::write(&catalog, "{\"Description\": \"PVC TEE 2\", \"Price\": 1}\n").expect("write catalog");

    let output = Command::new(env!("CARGO_BIN_EXE_catalog_match"))
        .env_remove("OPENAI_API_KEY")
        .arg("--supply")
        .arg(&supply)
        .arg("--catalog")
        .arg(&catalog)
        .output()
        .expect("run CLI");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
    assert!(output.stdout.is_empty());
    assert!(!dir.path().join("catalog.embeddings.json").exists());
}
