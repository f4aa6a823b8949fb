use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "gaterace-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_gaterace-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("lap-count"));
}

#[test]
fn cli_runs_smoke_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_gaterace-tester");
    let output_path = temp_path("run");
    let status = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "smoke",
            "--seeds",
            "7,0x10",
            "--iterations",
            "1",
            "--envs",
            "3",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());

    let content = std::fs::read_to_string(output_path).expect("read output");
    let results: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let results = results.as_array().expect("result array");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["passed"] == serde_json::Value::Bool(true)));
    assert_eq!(results[1]["seed"], 16);
}

#[test]
fn cli_rejects_zero_envs() {
    let exe = env!("CARGO_BIN_EXE_gaterace-tester");
    let status = Command::new(exe)
        .args(["--envs", "0", "--scenarios", "smoke"])
        .status()
        .expect("run cli");
    assert!(!status.success());
}

#[test]
fn cli_rejects_invalid_config_file() {
    let exe = env!("CARGO_BIN_EXE_gaterace-tester");
    let config_path = temp_path("config");
    std::fs::write(&config_path, r#"{"passage": {"gate_width": -1.0}}"#).expect("write config");
    let status = Command::new(exe)
        .args(["--scenarios", "smoke", "--config"])
        .arg(&config_path)
        .status()
        .expect("run cli");
    assert!(!status.success());
}
