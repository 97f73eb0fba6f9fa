use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use shipper::defaults::builtin_defaults;
use shipper::runner::{self, ExecutionResult, RunMode, RunOutcome, StepExecutor, StepStatus};
use shipper::{Error, Overrides, Pipeline, ResolvedPipeline};

/// Console sink the executor can inspect while a step is being "run".
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FakeGit {
    results: VecDeque<shipper::Result<ExecutionResult>>,
    invoked: Vec<Vec<String>>,
    console: SharedBuf,
    labels_seen_first: Vec<bool>,
    labels: Vec<String>,
}

impl FakeGit {
    fn new(
        pipeline: &ResolvedPipeline,
        console: SharedBuf,
        results: Vec<shipper::Result<ExecutionResult>>,
    ) -> Self {
        Self {
            results: results.into(),
            invoked: Vec::new(),
            console,
            labels_seen_first: Vec::new(),
            labels: pipeline.steps.iter().map(|s| s.label.clone()).collect(),
        }
    }
}

impl StepExecutor for FakeGit {
    fn execute(
        &mut self,
        command: &[String],
        _working_dir: &Path,
        _timeout_secs: u64,
    ) -> shipper::Result<ExecutionResult> {
        let label = &self.labels[self.invoked.len()];
        self.labels_seen_first
            .push(self.console.text().contains(&format!("📍 {}...", label)));
        self.invoked.push(command.to_vec());
        self.results
            .pop_front()
            .unwrap_or_else(|| Ok(ExecutionResult::new(0, "", "")))
    }
}

fn reference_in(dir: &Path) -> ResolvedPipeline {
    let overrides = Overrides {
        cwd: dir.to_path_buf(),
        ..Overrides::default()
    };
    Pipeline::reference()
        .resolve(&overrides, &builtin_defaults(), dir)
        .unwrap()
}

fn ok() -> shipper::Result<ExecutionResult> {
    Ok(ExecutionResult::new(0, "", ""))
}

struct Run {
    report: shipper::RunReport,
    executor: FakeGit,
    text: String,
}

fn run_reference(results: Vec<shipper::Result<ExecutionResult>>) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = reference_in(dir.path());
    let console = SharedBuf::default();
    let mut executor = FakeGit::new(&pipeline, console.clone(), results);
    let report = runner::run(&pipeline, &mut executor, console.clone(), RunMode::Execute).unwrap();
    Run {
        report,
        executor,
        text: console.text(),
    }
}

#[test]
fn all_five_steps_succeed() {
    let run = run_reference(vec![ok(), ok(), ok(), ok(), ok()]);

    assert_eq!(run.executor.invoked.len(), 5);
    assert_eq!(run.text.matches("   ✅ Success").count(), 5);
    assert!(!run.text.contains("❌"));
    assert_eq!(run.text.matches("✅ DEPLOYMENT INITIATED").count(), 1);
    assert_eq!(run.report.outcome, RunOutcome::Completed);
    assert!(run.report.skipped.is_empty());
}

#[test]
fn every_label_is_printed_before_its_command_runs() {
    let run = run_reference(vec![ok(), ok(), ok(), ok(), ok()]);
    assert_eq!(run.executor.labels_seen_first, vec![true; 5]);
}

#[test]
fn stage_failure_halts_before_commit() {
    let run = run_reference(vec![
        ok(),
        Ok(ExecutionResult::new(
            1,
            "",
            "fatal: not a git repository (or any of the parent directories): .git",
        )),
    ]);

    assert_eq!(run.executor.invoked.len(), 2);
    assert_eq!(run.executor.invoked[1], vec!["git", "add", "-A"]);
    assert!(run.text.contains("   ⚠️ fatal: not a git repository"));
    assert!(run.text.contains("   ❌ Command failed with code 1"));
    assert!(!run.text.contains("📍 Commit..."));
    assert_eq!(run.text.matches("✅ DEPLOYMENT INITIATED").count(), 1);
    assert_eq!(
        run.report.outcome,
        RunOutcome::HaltedOnFailure {
            step: 1,
            label: "Stage changes".to_string(),
            exit_code: 1,
        }
    );
    assert_eq!(
        run.report.skipped,
        vec!["Commit", "Rebase with remote", "Push to GitHub"]
    );
}

#[test]
fn nothing_to_commit_is_recovered_and_rebase_runs() {
    let run = run_reference(vec![
        ok(),
        ok(),
        Ok(ExecutionResult::new(
            1,
            "",
            "On branch main\nnothing to commit, working tree clean",
        )),
        ok(),
        ok(),
    ]);

    assert_eq!(run.executor.invoked.len(), 5);
    assert_eq!(
        run.executor.invoked[3],
        vec!["git", "pull", "--rebase", "origin", "main"]
    );
    assert_eq!(run.report.steps[2].status, StepStatus::Recovered);
    assert!(!run.text.contains("⚠️"));
    assert!(!run.text.contains("Command failed"));
    assert!(run.report.outcome.is_completed());
}

#[test]
fn push_timeout_is_a_fault() {
    let push = vec![
        "git".to_string(),
        "push".to_string(),
        "origin".to_string(),
        "main".to_string(),
    ];
    let run = run_reference(vec![
        ok(),
        ok(),
        ok(),
        ok(),
        Err(Error::step_timeout(&push, 30)),
    ]);

    assert!(run
        .text
        .contains("   ❌ Error: Command 'git push origin main' timed out after 30 seconds"));
    assert_eq!(run.text.matches("✅ DEPLOYMENT INITIATED").count(), 1);
    match &run.report.outcome {
        RunOutcome::HaltedOnException { step, label, .. } => {
            assert_eq!(*step, 4);
            assert_eq!(label, "Push to GitHub");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    // The summary is printed after the fault, not before it.
    let fault_at = run.text.find("❌ Error").unwrap();
    let summary_at = run.text.find("DEPLOYMENT INITIATED").unwrap();
    assert!(summary_at > fault_at);
}

#[test]
fn long_stderr_warning_is_cut_at_two_hundred_characters() {
    let noisy = format!("warning: {}", "y".repeat(400));
    let run = run_reference(vec![Ok(ExecutionResult::new(0, "", noisy.clone()))]);

    let warning = run
        .text
        .lines()
        .find(|l| l.starts_with("   ⚠️ "))
        .unwrap()
        .trim_start_matches("   ⚠️ ")
        .to_string();
    assert_eq!(warning.chars().count(), 200);
    assert!(noisy.starts_with(&warning));
}

#[test]
fn step_durations_are_reported() {
    let mut slow = ExecutionResult::new(0, "", "");
    slow.elapsed = Duration::from_millis(1500);
    let run = run_reference(vec![Ok(slow)]);
    assert_eq!(run.report.steps[0].duration_ms, 1500);
}

#[test]
fn custom_recoverable_pattern_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let overrides = Overrides {
        cwd: dir.path().to_path_buf(),
        ..Overrides::default()
    };
    let mut defaults = builtin_defaults();
    defaults.recoverable_patterns.push("Everything up-to-date".to_string());
    let pipeline = Pipeline::reference()
        .resolve(&overrides, &defaults, dir.path())
        .unwrap();

    let console = SharedBuf::default();
    let mut executor = FakeGit::new(
        &pipeline,
        console.clone(),
        vec![
            ok(),
            ok(),
            ok(),
            ok(),
            Ok(ExecutionResult::new(1, "", "everything UP-TO-DATE")),
        ],
    );
    let report = runner::run(&pipeline, &mut executor, console, RunMode::Execute).unwrap();
    assert!(report.outcome.is_completed());
    assert_eq!(report.steps[4].status, StepStatus::Recovered);
}
