use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

fn qpool() -> Command {
    let mut cmd = Command::cargo_bin("qpool").unwrap();
    cmd.env_remove("QPOOL_QUEUES_PER_POOL")
        .env_remove("QPOOL_MAX_DEVICES")
        .env_remove("RUST_LOG");
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should be JSON")
}

#[test]
fn test_info_reports_layout() {
    let report = json_output(qpool().args(["--devices", "3", "info", "--json"]));

    assert_eq!(report["runtime"], "simulated");
    assert_eq!(report["device_count"], 3);
    assert_eq!(report["queues_per_pool"], 32);
    assert_eq!(report["priority_range"], serde_json::json!([0, -1]));
}

#[test]
fn test_info_human_output() {
    qpool()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Queues per pool: 32"))
        .stdout(predicate::str::contains("0 (normal) .. -1 (highest)"));
}

#[test]
fn test_acquire_walks_slots_in_order() {
    let acquired = json_output(qpool().args(["acquire", "--high", "--count", "3", "--json"]));
    let acquired = acquired.as_array().unwrap();

    assert_eq!(acquired.len(), 3);
    for (expected_slot, queue) in acquired.iter().enumerate() {
        assert_eq!(queue["slot"], expected_slot);
        assert_eq!(queue["priority"], -1);
    }
    assert!(acquired[0]["queue"]
        .as_str()
        .unwrap()
        .contains("class=high"));
}

#[test]
fn test_acquire_wraps_at_capacity() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qpool.toml");
    fs::write(&path, "[pool]\nqueues_per_pool = 2\n").unwrap();

    let acquired = json_output(qpool().arg("--config").arg(&path).args([
        "acquire",
        "--count",
        "5",
        "--json",
    ]));
    let slots: Vec<_> = acquired
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["slot"].as_u64().unwrap())
        .collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0]);
}

#[test]
fn test_acquire_unknown_device_fails() {
    qpool()
        .args(["--devices", "2", "acquire", "--device", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid device index 5"));
}

#[test]
fn test_acquire_active_device() {
    qpool()
        .args(["acquire", "--device", "-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("device=0"));
}

#[test]
fn test_pack_round_trips() {
    let report = json_output(qpool().args(["--devices", "2", "pack", "--device", "1", "--high", "--json"]));

    assert_eq!(report["round_trip"], true);
    assert_eq!(report["packed"]["device_index"], 1);
    assert_eq!(report["packed"]["device_kind"], "accelerator");
    // slot 0 of the high-priority pool
    assert_eq!(report["packed"]["queue_id"], 1);
}

#[test]
fn test_stress_never_exceeds_capacity() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qpool.toml");
    fs::write(&path, "[pool]\nqueues_per_pool = 4\n").unwrap();

    let report = json_output(qpool().arg("--config").arg(&path).args([
        "stress",
        "--threads",
        "8",
        "--iterations",
        "100",
        "--json",
    ]));

    assert_eq!(report["acquisitions"], 800);
    assert_eq!(report["distinct_queues"], 4);
    assert_eq!(report["constructed"], 4);
    assert_eq!(report["capacity"], 4);
}

#[test]
fn test_env_override_applies() {
    let report = json_output(
        qpool()
            .env("QPOOL_QUEUES_PER_POOL", "6")
            .args(["info", "--json"]),
    );
    assert_eq!(report["queues_per_pool"], 6);
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qpool.toml");
    fs::write(&path, "[pool]\nqueues_per_pool = 0\n").unwrap();

    qpool()
        .arg("--config")
        .arg(&path)
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing"));
}

#[test]
fn test_stress_on_active_device_counts_constructions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qpool.toml");
    fs::write(&path, "[pool]\nqueues_per_pool = 4\n").unwrap();

    let report = json_output(qpool().arg("--config").arg(&path).args([
        "stress",
        "--device",
        "-1",
        "--threads",
        "2",
        "--iterations",
        "10",
        "--json",
    ]));

    assert_eq!(report["distinct_queues"], 4);
    assert_eq!(report["constructed"], 4);
}
