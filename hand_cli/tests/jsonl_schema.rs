use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, sim: &str) -> PathBuf {
    let toml = format!(
        r#"
[observer]
period_ms = 50

[sim]
{sim}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn run_json(cfg: &PathBuf, instructions: &str, ms: &str) -> serde_json::Value {
    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(cfg)
        .arg("run")
        .arg("--instructions")
        .arg(instructions)
        .arg("--duration-ms")
        .arg(ms);
    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let line = stdout
        .lines()
        .find(|l| l.contains("\"fingers\""))
        .unwrap_or("")
        .to_string();
    assert!(
        !line.is_empty(),
        "no JSON summary line found; stdout was: {stdout}"
    );
    serde_json::from_str(&line).unwrap()
}

/// Validate the summary schema of a successful run.
#[rstest]
fn json_summary_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let v = run_json(&cfg, "0.5,0.5,0.5,0.5", "400");

    assert!(v["elapsed_ms"].as_u64().unwrap() >= 400);
    let fingers = v["fingers"].as_array().unwrap();
    let names: Vec<_> = fingers.iter().map(|f| f["finger"].as_str().unwrap()).collect();
    assert_eq!(names, ["index", "middle", "ring", "little"]);
    for f in fingers {
        for key in ["state", "position_mm", "last_set_pos_mm", "strokes", "stalling"] {
            assert!(f.get(key).is_some(), "missing {key} in {f}");
        }
        assert_eq!(f["stalling"], false);
    }
}

/// A jammed finger ends the run flagged; the others are unaffected.
#[rstest]
fn json_summary_reports_stall() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "jammed = [\"middle\"]");
    let v = run_json(&cfg, "0.5,1.0,0.5,0.5", "500");

    let fingers = v["fingers"].as_array().unwrap();
    assert_eq!(fingers[1]["stalling"], true);
    assert_eq!(fingers[1]["state"], "invalid");
    assert_eq!(fingers[0]["stalling"], false);
}

/// Errors in --json mode are one object on stdout with a stable reason.
#[rstest]
fn json_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "disconnected = [\"little\"]");

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("off")
        .arg("--config")
        .arg(&cfg)
        .arg("self-check");
    let out = cmd.assert().code(6).get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let line = stdout
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or("");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "SensorFault");
    assert_eq!(v["details"]["finger"], "little");
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}
