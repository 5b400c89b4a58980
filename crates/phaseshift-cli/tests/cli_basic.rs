//! Basic CLI E2E tests.
//!
//! Tests invoke the `phaseshift` binary with HOME pointed at a temporary
//! directory so the real configuration file is never touched.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_phaseshift"))
        .args(args)
        .env("HOME", home)
        .env_remove("PHASESHIFT_ENV")
        .env_remove("PHASESHIFT_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn home() -> TempDir {
    tempfile::tempdir().expect("temp home")
}

const TINY_SESSION: [&str; 10] = [
    "--work",
    "1",
    "--short-break",
    "1",
    "--long-break",
    "2",
    "--total",
    "3",
    "--before-long",
    "2",
];

#[test]
fn test_help_lists_commands() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["--help"]);
    assert_eq!(code, 0);
    for command in ["run", "plan", "config", "accuracy", "completions"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_config_path_lives_under_home() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    let path = stdout.trim();
    assert!(path.starts_with(&*home.path().to_string_lossy()));
    assert!(path.ends_with("config.toml"));
}

#[test]
fn test_config_set_then_get() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["config", "set", "pomodoro.total_work_units", "6"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "pomodoro.total_work_units"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "6");
}

#[test]
fn test_config_rejects_invalid_value() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "pomodoro.work_duration_seconds", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "pomodoro.work_duration_seconds"]);
    assert_eq!(stdout.trim(), "1500");
}

#[test]
fn test_config_unknown_key() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "pomodoro.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("pomodoro.nope"));
}

#[test]
fn test_config_list_and_reset() {
    let home = home();
    run_cli(home.path(), &["config", "set", "timer.tick_interval_ms", "20"]);

    let (stdout, _, code) = run_cli(home.path(), &["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("timer.tick_interval_ms = 20"));
    assert!(stdout.contains("pomodoro.work_units_before_long_break = 4"));

    let (_, _, code) = run_cli(home.path(), &["config", "reset"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(home.path(), &["config", "list", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["timer"]["tick_interval_ms"], 10);
}

#[test]
fn test_plan_json() {
    let home = home();
    let mut args = vec!["plan", "--json"];
    args.extend(TINY_SESSION);
    let (stdout, _, code) = run_cli(home.path(), &args);
    assert_eq!(code, 0);

    let plan: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let phases: Vec<&str> = plan["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["phase"].as_str().unwrap())
        .collect();
    assert_eq!(phases, ["work", "short_break", "work", "long_break", "work"]);
    assert_eq!(plan["total"]["secs"], 6);
}

#[test]
fn test_plan_table_uses_config_defaults() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["plan"]);
    assert_eq!(code, 0);
    // 12 x 25 min of work, 9 short and 2 long breaks.
    assert!(stdout.contains("total 6:15:00"));
}

#[test]
fn test_plan_rejects_invalid_overrides() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["plan", "--short-break", "60", "--long-break", "30"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("short_break_duration_seconds"));
}

#[test]
fn test_plan_rejects_oversized_total() {
    let home = home();
    let (stdout, stderr, code) = run_cli(home.path(), &["plan", "--total", "4000000000"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("too large to plan"));
}

#[test]
fn test_run_tiny_session_prints_events() {
    let home = home();
    let mut args = vec!["run", "--quiet", "--tick-ms", "50"];
    args.extend(TINY_SESSION);
    let (stdout, _, code) = run_cli(home.path(), &args);
    assert_eq!(code, 0);

    let types: Vec<String> = stdout
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(types.first().map(String::as_str), Some("TimerStarted"));
    assert_eq!(types.last().map(String::as_str), Some("SessionCompleted"));
    assert_eq!(types.iter().filter(|t| *t == "PhaseCompleted").count(), 5);
}

#[test]
fn test_accuracy_rejects_zero_samples() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["accuracy", "--samples", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("sample_count"));
}

#[test]
fn test_accuracy_json_report() {
    let home = home();
    let (stdout, _, code) = run_cli(
        home.path(),
        &[
            "accuracy",
            "--samples",
            "2",
            "--expected-ms",
            "50",
            "--deviation-ms",
            "1000",
            "--json",
        ],
    );
    assert_eq!(code, 0);
    let reports: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["subject"], "stopwatch");
    assert_eq!(reports[1]["subject"], "countdown");
    assert_eq!(reports[0]["statistics"]["samples"].as_array().unwrap().len(), 2);
}

#[test]
fn test_completions_bash() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("phaseshift"));
}
