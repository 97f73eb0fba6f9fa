#![cfg(unix)]

use std::fs;
use std::path::Path;

use shipper::defaults::builtin_defaults;
use shipper::pipeline;
use shipper::runner::{self, ProcessExecutor, RunMode, RunOutcome, StepStatus};
use shipper::Overrides;

fn write_pipeline(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("shipper.pipeline.json");
    fs::write(&path, body).unwrap();
    path
}

fn run_file(dir: &Path, explicit: Option<&Path>) -> (shipper::RunReport, String) {
    let overrides = Overrides {
        cwd: dir.to_path_buf(),
        ..Overrides::default()
    };
    let loaded = pipeline::discover(explicit, dir).unwrap();
    let resolved = loaded
        .pipeline
        .resolve(&overrides, &builtin_defaults(), &loaded.base_dir(dir))
        .unwrap();

    let mut out = Vec::new();
    let report = runner::run(&resolved, &mut ProcessExecutor, &mut out, RunMode::Execute).unwrap();
    (report, String::from_utf8(out).unwrap())
}

#[test]
fn real_processes_halt_at_first_unrecoverable_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"{
            "title": "LOCAL CHECK",
            "steps": [
                {"label": "Echo", "command": ["sh", "-c", "echo one"]},
                {"label": "Benign", "command": ["sh", "-c", "echo 'Nothing to commit' >&2; exit 1"]},
                {"label": "Touch", "command": ["touch", "marker"]},
                {"label": "Fail", "command": ["false"]},
                {"label": "Never", "command": ["touch", "never"]}
            ],
            "summary": {"headline": "DONE", "lines": ["bye"]}
        }"#,
    );

    let (report, text) = run_file(dir.path(), None);

    assert!(dir.path().join("marker").exists());
    assert!(!dir.path().join("never").exists());
    assert_eq!(report.steps[1].status, StepStatus::Recovered);
    assert_eq!(
        report.outcome,
        RunOutcome::HaltedOnFailure {
            step: 3,
            label: "Fail".to_string(),
            exit_code: 1,
        }
    );
    assert!(text.starts_with("🚀 LOCAL CHECK\n"));
    assert!(text.contains("\none\n   ✅ Success"));
    assert!(text.contains("❌ Command failed with code 1"));
    assert!(text.trim_end().ends_with("DONE\nbye"));
}

#[test]
fn timeout_kills_the_step_and_halts() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pipeline(
        dir.path(),
        r#"{
            "timeout_secs": 1,
            "steps": [
                {"label": "Hang", "command": ["sleep", "10"]},
                {"label": "After", "command": ["touch", "after"]}
            ]
        }"#,
    );

    let (report, text) = run_file(dir.path(), Some(&path));

    assert!(!dir.path().join("after").exists());
    assert!(text.contains("❌ Error: Command 'sleep 10' timed out after 1 seconds"));
    assert!(matches!(
        report.outcome,
        RunOutcome::HaltedOnException { step: 0, .. }
    ));
    assert_eq!(report.skipped, vec!["After"]);
}

#[test]
fn missing_program_is_reported_as_error() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"{"steps": [{"label": "Ghost", "command": ["definitely-not-a-real-binary-42"]}]}"#,
    );

    let (report, text) = run_file(dir.path(), None);

    assert!(text.contains("❌ Error: Failed to run definitely-not-a-real-binary-42:"));
    assert_eq!(report.steps[0].status, StepStatus::Error);
    assert!(!report.outcome.is_completed());
}

#[test]
fn working_dir_is_relative_to_pipeline_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("site")).unwrap();
    let path = write_pipeline(
        dir.path(),
        r#"{
            "working_dir": "site",
            "preflight": {"required_paths": ["."]},
            "steps": [{"label": "Mark", "command": ["touch", "here"]}]
        }"#,
    );

    let elsewhere = tempfile::tempdir().unwrap();
    let (report, text) = run_file(elsewhere.path(), Some(&path));

    assert!(report.outcome.is_completed());
    assert!(text.contains("✅ PASS: ."));
    assert!(dir.path().join("site").join("here").exists());
}
