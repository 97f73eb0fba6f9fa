use clap::Args;
use std::io;

use shipper::runner::{self, ProcessExecutor, RunMode, RunOutcome, RunReport};

use super::{CmdResult, PipelineArgs};

/// Exit code for a run that stopped on a failing step, a fault, or a preflight check.
pub const HALTED_EXIT_CODE: i32 = 20;

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: PipelineArgs,

    /// Print the steps without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Emit a JSON run report on stdout (progress moves to stderr)
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: RunArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<RunReport> {
    let (_loaded, resolved) = args.source.resolve()?;

    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Execute
    };

    let mut executor = ProcessExecutor;
    let report = if args.json {
        runner::run(&resolved, &mut executor, io::stderr().lock(), mode)?
    } else {
        runner::run(&resolved, &mut executor, io::stdout().lock(), mode)?
    };

    log_outcome(&report.outcome);
    let exit_code = exit_code_for_outcome(&report.outcome);
    Ok((report, exit_code))
}

pub fn exit_code_for_outcome(outcome: &RunOutcome) -> i32 {
    if outcome.is_completed() {
        0
    } else {
        HALTED_EXIT_CODE
    }
}

fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed => {
            shipper::log_status!("run", "All steps completed");
        }
        RunOutcome::HaltedOnFailure {
            label, exit_code, ..
        } => {
            shipper::log_status!("run", "Halted at '{}' (exit code {})", label, exit_code);
        }
        RunOutcome::HaltedOnException { label, error, .. } => {
            shipper::log_status!("run", "Halted at '{}': {}", label, error);
        }
        RunOutcome::HaltedOnPreflight { missing } => {
            shipper::log_status!("run", "Preflight failed: {}", missing.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_runs_exit_zero() {
        assert_eq!(exit_code_for_outcome(&RunOutcome::Completed), 0);
        assert_eq!(
            exit_code_for_outcome(&RunOutcome::HaltedOnFailure {
                step: 1,
                label: "Stage changes".to_string(),
                exit_code: 1,
            }),
            HALTED_EXIT_CODE
        );
        assert_eq!(
            exit_code_for_outcome(&RunOutcome::HaltedOnPreflight {
                missing: vec!["package.json".to_string()],
            }),
            HALTED_EXIT_CODE
        );
    }
}
