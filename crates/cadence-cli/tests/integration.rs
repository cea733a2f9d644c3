//! Integration tests for the `cadence` binary.

use std::process::Command;

fn cadence_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cadence"))
}

#[test]
fn drivers_lists_builtin_kinds() {
    let output = cadence_bin().arg("drivers").output().expect("failed to run cadence drivers");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for kind in ["host", "dai", "volume", "mixer", "src"] {
        assert!(stdout.contains(kind), "drivers listing should contain '{kind}'");
    }
}

#[test]
fn topologies_lists_factory_names() {
    let output = cadence_bin().arg("topologies").output().expect("failed to run cadence topologies");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["playback", "capture", "mixer", "src-playback", "dual-core"] {
        assert!(stdout.contains(name), "topology listing should contain '{name}'");
    }
}

#[test]
fn validate_accepts_factory_topology() {
    let output = cadence_bin()
        .args(["validate", "mixer"])
        .output()
        .expect("failed to run cadence validate");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mixer: ok"));
}

#[test]
fn validate_rejects_unknown_kind() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
name = "bad"

[[pipeline]]
id = 1
sched_comp = 2
source = 1
sink = 2

[[component]]
id = 1
kind = "host"
pipeline = 1

[[component]]
id = 2
kind = "reverb"
pipeline = 1
"#,
    )
    .unwrap();

    let output = cadence_bin()
        .arg("validate")
        .arg(&path)
        .output()
        .expect("failed to run cadence validate");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown kind 'reverb'"));
}

#[test]
fn validate_rejects_missing_topology() {
    let output = cadence_bin()
        .args(["validate", "no-such-topology"])
        .output()
        .expect("failed to run cadence validate");
    assert!(!output.status.success());
}

#[test]
fn run_reports_json() {
    let output = cadence_bin()
        .args(["run", "playback", "--periods", "5", "--json"])
        .output()
        .expect("failed to run cadence run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["topology"], "playback");
    assert_eq!(report["elapsed_us"], 5000);
    assert_eq!(report["notifications"], 0);
    assert_eq!(report["pipelines"][0]["status"], "active");
    assert_eq!(report["pipelines"][0]["copies"], 6);
    assert_eq!(report["streams"][0]["host_posn"], 6 * 192);
}

#[test]
fn run_dual_core_topology() {
    let output = cadence_bin()
        .args(["run", "dual-core", "--periods", "3"])
        .output()
        .expect("failed to run cadence run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("XRUN notifications: 0"));
}
