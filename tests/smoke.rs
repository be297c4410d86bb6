//! Smoke tests -- verify the binary runs and key subcommands work end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const REPORT: &str = r#"[{
  "id": "checkout",
  "name": "Checkout",
  "uri": "features/checkout.feature",
  "elements": [{
    "id": "checkout;pay-by-card",
    "name": "Pay by card",
    "keyword": "Scenario",
    "type": "scenario",
    "steps": [
      {"keyword": "Given ", "name": "a full cart", "result": {"status": "passed", "duration": 2000000000}},
      {"keyword": "When ", "name": "I pay", "result": {"status": "passed", "duration": 1000000000}}
    ]
  }]
}]"#;

/// Write a config pointing history and storage into `dir`.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let config = dir.join("buildperf.toml");
    fs::write(
        &config,
        format!(
            "[history]\nroot = {:?}\n\n[storage]\ndb_path = {:?}\n\n[logging]\nlevel = \"warn\"\n",
            dir.join("history"),
            dir.join("perf.db")
        ),
    )
    .unwrap();
    config
}

fn write_build(dir: &Path, project: &str, build: u32) {
    let build_dir = dir.join("history").join(project).join("builds").join(build.to_string());
    fs::create_dir_all(&build_dir).unwrap();
    fs::write(build_dir.join("cucumber.json"), REPORT).unwrap();
}

fn buildperf() -> Command {
    Command::cargo_bin("buildperf").unwrap()
}

#[test]
fn test_cli_help() {
    buildperf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Performance trends across Cucumber build history"));
}

#[test]
fn test_cli_version() {
    buildperf()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("buildperf"));
}

#[test]
fn test_subcommands_exist() {
    for sub in ["aggregate", "show", "trend", "snapshots"] {
        buildperf().args([sub, "--help"]).assert().success();
    }
}

#[test]
fn test_aggregate_requires_project() {
    buildperf().arg("aggregate").assert().failure();
}

#[test]
fn test_aggregate_empty_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["aggregate", "--project", "nothing-here"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped (no results)"));

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["show", "--project", "nothing-here"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No snapshot stored"));
}

#[test]
fn test_aggregate_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    write_build(dir.path(), "shop", 1);
    write_build(dir.path(), "shop", 2);

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["aggregate", "--project", "shop", "--build", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved"));

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["show", "--project", "shop", "--level", "step"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a full cart").and(predicate::str::contains("2.000s")));

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["trend", "--project", "shop", "--level", "scenario", "--id", "checkout;pay-by-card"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pay by card"));

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["snapshots", "--project", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));
}

#[test]
fn test_one_broken_project_does_not_hide_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    write_build(dir.path(), "shop", 1);
    let broken = dir.path().join("history").join("broken").join("builds").join("1");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("cucumber.json"), "{not json").unwrap();

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["aggregate", "--project", "broken", "--project", "shop"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("shop").and(predicate::str::contains("saved")))
        .stderr(predicate::str::contains("broken: aggregation failed").and(predicate::str::contains("1 of 2 projects failed")));

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["show", "--project", "shop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkout"));
}

#[test]
fn test_bad_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[display]\nrows = 3\n").unwrap();

    buildperf()
        .arg("--config")
        .arg(&config)
        .args(["snapshots", "--project", "shop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
}
