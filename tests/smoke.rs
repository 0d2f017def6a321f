//! Smoke tests -- verify the binary runs and the subcommands exist.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn inventory_fixture() -> String {
    format!("{}/fixtures/inventory.json", env!("CARGO_MANIFEST_DIR"))
}

fn fleetperf() -> Command {
    let mut cmd = Command::cargo_bin("fleetperf").unwrap();
    cmd.env_remove("FLEETPERF_CONFIG")
        .env_remove("FLEETPERF_USERNAME")
        .env_remove("FLEETPERF_PASSWORD");
    cmd
}

#[test]
fn test_cli_help() {
    fleetperf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pairwise throughput testing"));
}

#[test]
fn test_cli_version() {
    fleetperf()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetperf"));
}

#[test]
fn test_subcommands_exist() {
    for sub in ["run", "audit", "bandwidth", "devices"] {
        fleetperf().args([sub, "--help"]).assert().success();
    }
}

#[test]
fn test_run_flags() {
    fleetperf()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-adapter-check"))
        .stdout(predicate::str::contains("--duration"))
        .stdout(predicate::str::contains("--parallel"));
}

#[test]
fn test_devices_lists_only_computers() {
    fleetperf()
        .args(["devices", "--inventory", &inventory_fixture()])
        .assert()
        .success()
        .stdout(predicate::str::contains("FOH-Console"))
        .stdout(predicate::str::contains("Broadcast"))
        .stdout(predicate::str::contains("10000 Mbps"))
        .stdout(predicate::str::contains("Core-Switch").not());
}

#[test]
fn test_missing_inventory_fails() {
    fleetperf()
        .args(["devices", "--inventory", "/nonexistent/network_config.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read inventory"));
}

#[test]
fn test_single_device_bandwidth_is_fatal() {
    let mut inv = tempfile::NamedTempFile::new().unwrap();
    write!(
        inv,
        r#"{{"devices": [{{"name": "solo", "ip": "10.0.0.1", "type": "computer"}}]}}"#
    )
    .unwrap();

    fleetperf()
        .args(["bandwidth", "-u", "ops", "-p", "pw", "--inventory"])
        .arg(inv.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("need at least 2 measurable devices"));
}

#[test]
fn test_credentials_are_required() {
    fleetperf()
        .args(["audit", "--inventory", &inventory_fixture()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no username given"));
}
