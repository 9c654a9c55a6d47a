use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

const FIXTURES: &str = "../seidval/tests/examples";

fn fixture(name: &str) -> String {
    format!("{FIXTURES}/{name}")
}

#[test]
fn valid_and_revoked() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("seidval")?;
    cmd.arg("-e")
        .arg("TEST")
        .arg(fixture("test_valid.pem"))
        .arg(fixture("test_revoked.pem"));
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("test_valid.pem: valid"))
        .stdout(predicate::str::contains(
            "test_revoked.pem: invalid (Validation failed: Certificate is revoked)",
        ));
    Ok(())
}

#[test]
fn all_valid_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("seidval")?;
    cmd.arg("--environment")
        .arg("prod")
        .arg(fixture("prod_valid.pem"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("prod_valid.pem: valid"));
    Ok(())
}

#[test]
fn unknown_environment() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("seidval")?;
    cmd.arg("-e").arg("STAGING").arg(fixture("test_valid.pem"));
    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("ERROR: Unknown environment: 'STAGING'"));
    Ok(())
}

#[test]
fn properties_override() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let properties = dir.path().join("overrides.json");
    fs::write(&properties, r#"{"policies": ["2.16.578.1.1.1.1.999"]}"#)?;

    let mut cmd = Command::cargo_bin("seidval")?;
    cmd.arg("-e")
        .arg("TEST")
        .arg("-p")
        .arg(&properties)
        .arg(fixture("test_wrong_policy.pem"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("test_wrong_policy.pem: valid"));
    Ok(())
}

#[test]
fn snapshots_and_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("seidval")?;
    cmd.arg("-e")
        .arg("TEST")
        .arg("--in-memory")
        .arg("--snapshots")
        .arg(fixture("snapshots"))
        .arg("--json")
        .arg(fixture("test_revoked.pem"))
        .arg(fixture("missing.pem"));
    let output = cmd.output()?;
    assert_eq!(output.status.code(), Some(1));

    let results: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(results[0]["valid"], true);
    assert_eq!(results[1]["valid"], false);
    assert!(results[1]["reason"]
        .as_str()
        .unwrap_or_default()
        .starts_with("StdIoError"));
    Ok(())
}

#[test]
fn time_of_interest() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("seidval")?;
    cmd.arg("-e")
        .arg("TEST")
        .arg("-i")
        .arg("2020-01-01T00:00:00Z")
        .arg(fixture("test_valid.pem"));
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Certificate is not yet valid"));
    Ok(())
}
