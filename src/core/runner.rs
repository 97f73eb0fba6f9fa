//! Sequential step runner.
//!
//! Steps run one at a time, in order, in the pipeline's working directory.
//! The run stops at the first step that exits non-zero without matching a
//! recoverable pattern, or whose process cannot be started, read, or
//! finished within the timeout. Step failures never surface as `Err`: they
//! are printed and recorded in the [`RunReport`]. The summary block is
//! printed exactly once at the end, however the loop ended.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::console::Console;
use crate::error::Result;
use crate::pipeline::{ResolvedPipeline, Step};
use crate::utils::command;

/// Outcome of one child process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Runs one argument vector. `Err` means the process could not be started,
/// observed, or finished in time; a non-zero exit is still `Ok`.
pub trait StepExecutor {
    fn execute(
        &mut self,
        command: &[String],
        working_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ExecutionResult>;
}

/// Spawns real child processes without a shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl StepExecutor for ProcessExecutor {
    fn execute(
        &mut self,
        command: &[String],
        working_dir: &Path,
        timeout_secs: u64,
    ) -> Result<ExecutionResult> {
        let timed = command::run_with_timeout(command, working_dir, timeout_secs)?;
        Ok(ExecutionResult {
            exit_code: timed.exit_code,
            stdout: timed.output.stdout,
            stderr: timed.output.stderr,
            elapsed: timed.elapsed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Execute,
    /// Print every step without spawning anything.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    /// Non-zero exit whose stderr matched a recoverable pattern.
    Recovered,
    Failed,
    Error,
    Planned,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub label: String,
    pub command: Vec<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// How the step loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum RunOutcome {
    Completed,
    #[serde(rename_all = "camelCase")]
    HaltedOnFailure {
        step: usize,
        label: String,
        exit_code: i32,
    },
    #[serde(rename_all = "camelCase")]
    HaltedOnException {
        step: usize,
        label: String,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    HaltedOnPreflight { missing: Vec<String> },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub title: String,
    pub working_dir: String,
    pub timeout_secs: u64,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub steps: Vec<StepReport>,
    /// Labels of steps never attempted because the run halted first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// True when `stderr` contains any of `patterns`, ignoring case.
pub fn is_recoverable(stderr: &str, patterns: &[String]) -> bool {
    let haystack = stderr.to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| haystack.contains(&p.to_lowercase()))
}

/// Run every step of `pipeline` through `executor`, writing progress to `out`.
///
/// Only console write failures are returned as `Err`.
pub fn run<E, W>(
    pipeline: &ResolvedPipeline,
    executor: &mut E,
    out: W,
    mode: RunMode,
) -> Result<RunReport>
where
    E: StepExecutor + ?Sized,
    W: Write,
{
    let started_at = Utc::now();
    let mut console = Console::new(out);
    let mut steps = Vec::with_capacity(pipeline.steps.len());

    console.header(&pipeline.title)?;

    let mut outcome = check_preflight(pipeline, &mut console)?;

    if outcome.is_none() {
        for (index, step) in pipeline.steps.iter().enumerate() {
            console.step_start(&step.label, &step.command)?;

            if mode == RunMode::DryRun {
                console.dry_run()?;
                steps.push(StepReport {
                    index,
                    label: step.label.clone(),
                    command: step.command.clone(),
                    status: StepStatus::Planned,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: None,
                    duration_ms: 0,
                });
                continue;
            }

            let report = match executor.execute(
                &step.command,
                &pipeline.working_dir,
                pipeline.timeout_secs,
            ) {
                Ok(result) => {
                    let report = judge(index, step, result, pipeline, &mut console)?;
                    if report.status == StepStatus::Failed {
                        outcome = Some(RunOutcome::HaltedOnFailure {
                            step: index,
                            label: step.label.clone(),
                            exit_code: report.exit_code.unwrap_or(-1),
                        });
                    }
                    report
                }
                Err(err) => {
                    console.fault(&err)?;
                    outcome = Some(RunOutcome::HaltedOnException {
                        step: index,
                        label: step.label.clone(),
                        error: err.to_string(),
                    });
                    StepReport {
                        index,
                        label: step.label.clone(),
                        command: step.command.clone(),
                        status: StepStatus::Error,
                        exit_code: None,
                        stdout: String::new(),
                        stderr: String::new(),
                        error: Some(err.to_string()),
                        duration_ms: 0,
                    }
                }
            };

            steps.push(report);
            if outcome.is_some() {
                break;
            }
        }
    }

    console.summary(&pipeline.summary)?;

    let skipped = pipeline
        .steps
        .iter()
        .skip(steps.len())
        .map(|s| s.label.clone())
        .collect();

    Ok(RunReport {
        run_id: Uuid::new_v4(),
        title: pipeline.title.clone(),
        working_dir: pipeline.working_dir.display().to_string(),
        timeout_secs: pipeline.timeout_secs,
        dry_run: mode == RunMode::DryRun,
        started_at,
        finished_at: Utc::now(),
        outcome: outcome.unwrap_or(RunOutcome::Completed),
        steps,
        skipped,
    })
}

fn check_preflight<W: Write>(
    pipeline: &ResolvedPipeline,
    console: &mut Console<W>,
) -> Result<Option<RunOutcome>> {
    if pipeline.required_paths.is_empty() {
        return Ok(None);
    }

    console.preflight_start()?;
    let mut missing = Vec::new();
    for path in &pipeline.required_paths {
        if pipeline.working_dir.join(path).exists() {
            console.preflight_pass(path)?;
        } else {
            console.preflight_fail(path)?;
            missing.push(path.clone());
        }
    }

    if missing.is_empty() {
        Ok(None)
    } else {
        Ok(Some(RunOutcome::HaltedOnPreflight { missing }))
    }
}

/// Print a finished step's output and decide whether the run continues.
fn judge<W: Write>(
    index: usize,
    step: &Step,
    result: ExecutionResult,
    pipeline: &ResolvedPipeline,
    console: &mut Console<W>,
) -> Result<StepReport> {
    let recoverable = is_recoverable(&result.stderr, &pipeline.recoverable_patterns);

    if !result.stdout.is_empty() {
        console.captured_stdout(&result.stdout)?;
    }
    if !result.stderr.is_empty() && !recoverable {
        console.warning(&result.stderr, pipeline.warning_excerpt_chars)?;
    }

    let status = if result.exit_code == 0 {
        StepStatus::Success
    } else if recoverable {
        StepStatus::Recovered
    } else {
        StepStatus::Failed
    };

    if status == StepStatus::Failed {
        console.command_failed(result.exit_code)?;
    } else {
        console.success()?;
    }

    Ok(StepReport {
        index,
        label: step.label.clone(),
        command: step.command.clone(),
        status,
        exit_code: Some(result.exit_code),
        stdout: result.stdout,
        stderr: result.stderr,
        error: None,
        duration_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
    })
}
