use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal config for the simulated backend; `extra` is appended verbatim.
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[control]
period_ms = 20
initial_set_pos_mm = 10.0

[observer]
period_ms = 100

{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "Self-check OK", "stdout")]
#[case(&["run", "--instructions", "0.5,0.5,0.5,0.5", "--duration-ms", "300"], 0, "Run complete", "stdout")]
#[case(&["run", "--pose", "fist", "--duration-ms", "100"], 0, "Run complete", "stdout")]
#[case(&[], 2, "Usage", "stderr")]
#[case(&["run", "--instructions", "0.5,0.5", "--duration-ms", "50"], 3, "four numbers", "stderr")]
#[case(&["run", "--pose", "thumbs-up", "--duration-ms", "50"], 3, "unknown pose", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();
    writeln!(f, "200,1.0").unwrap();

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn invalid_config_names_the_key() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[planner]\nreversal_factor = 0.5\n");

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("planner.reversal_factor"));
}

#[rstest]
fn disconnected_sensor_fails_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[sim]\ndisconnected = [\"ring\"]\n");

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("off")
        .arg("self-check");
    cmd.assert()
        .code(6)
        .stdout(predicate::str::contains("disconnected"))
        .stderr(predicate::str::contains("ring position sensor"));
}

#[rstest]
fn stdin_feed_drives_the_hand() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = assert_cmd::Command::cargo_bin("hand").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("error")
        .arg("--json")
        .arg("run")
        .arg("--stdin")
        .arg("--duration-ms")
        .arg("600")
        .write_stdin("# comment\nnot-a-pose\n1,1,1,1\n");

    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    let fingers = v["fingers"].as_array().unwrap();
    assert_eq!(fingers.len(), 4);
    // 1.0 targets each finger's open bound
    let index = &fingers[0];
    assert_eq!(index["finger"], "index");
    assert!((index["last_set_pos_mm"].as_f64().unwrap() - 18.73).abs() < 1e-9);
    assert!(index["strokes"].as_u64().unwrap() >= 1);
}

#[rstest]
fn health_reports_missing_config() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--config").arg(&missing).arg("health");
    let out = cmd.assert().code(1).get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&out).trim()).unwrap();
    assert_eq!(v["status"], "error");
    assert_eq!(v["config_valid"], false);
}

#[rstest]
#[case("", 0)]
#[case("[[fingers]]\nid = \"ring\"\nmax_mm = 16.0\n", 1)]
fn health_counts_assembled_fingers(#[case] extra: &str, #[case] overrides: u64) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, extra);

    let mut cmd = Command::cargo_bin("hand").unwrap();
    cmd.arg("--config").arg(&cfg).arg("health");
    let out = cmd.assert().success().get_output().stdout.clone();
    let v: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&out).trim()).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["fingers"], 4);
    assert_eq!(v["finger_overrides"], overrides);
}
