use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn convert_writes_one_config_per_device() {
    let dir = tempdir().expect("tempdir");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("aci-convert"));
    cmd.arg("convert")
        .arg(fixture("fixtures/aci-dc1.json"))
        .arg("--output-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote 3 device configs to"));

    assert!(dir.path().join("dc1-leaf-101.json").exists());
    assert!(dir.path().join("dc1-leaf-102.json").exists());
    assert!(dir.path().join("dc1-spine-201.json").exists());

    let raw = fs::read_to_string(dir.path().join("dc1-leaf-101.json")).expect("read config");
    let device: Value = serde_json::from_str(&raw).expect("json parse");
    assert_eq!(device["hostname"], "dc1-leaf-101");
    assert!(device["vrfs"].is_object());
    assert!(device["interfaces"].is_object());
}

#[test]
fn convert_stdout_json_includes_topology() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("aci-convert"));
    let output = cmd
        .arg("convert")
        .arg(fixture("fixtures/aci-dc1.json"))
        .arg("--topology")
        .output()
        .expect("convert output");
    assert!(output.status.success(), "convert should succeed");

    let report: Value = serde_json::from_slice(&output.stdout).expect("json parse");
    assert!(report["devices"]["dc1-leaf-101"].is_object());
    assert!(report["devices"]["dc1-spine-201"].is_object());

    let links = report["topology"]["links"].as_array().expect("links array");
    assert!(!links.is_empty());
    let peer_link = links.iter().any(|link| {
        link["interface1"] == "port-channel1" && link["interface2"] == "port-channel1"
    });
    assert!(peer_link, "VPC pair should produce a peer-link edge");
    let mesh = links
        .iter()
        .any(|link| link["node1"] == "dc1-leaf-101" && link["node2"] == "dc1-spine-201");
    assert!(mesh, "leaf and spine should be meshed");
}

#[test]
fn convert_text_format_lists_devices() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("aci-convert"));
    cmd.arg("convert")
        .arg(fixture("fixtures/aci-dc1.json"))
        .arg("--format")
        .arg("text")
        .assert()
        .success()
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("- dc1-leaf-101: vrfs="))
        .stdout(predicate::str::contains("- dc1-spine-201: vrfs="));
}
