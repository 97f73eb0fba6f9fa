use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

use shipper::defaults;
use shipper::pipeline::{self, LoadedPipeline, Overrides, ResolvedPipeline};

pub type CmdResult<T> = shipper::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Flags that pick a pipeline and override parts of it.
///
/// Shared by `run` and `plan` so both resolve exactly the same steps.
#[derive(Args, Default, Debug)]
pub struct PipelineArgs {
    /// Pipeline file (.json or .toml). Defaults to shipper.pipeline.json/.toml in the
    /// current directory, then the built-in reference pipeline
    #[arg(long, short = 'p', value_name = "FILE")]
    pub pipeline: Option<PathBuf>,

    /// Working directory for every step (overrides working_dir)
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dir: Option<String>,

    /// Per-step timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Commit message (sets the `message` variable)
    #[arg(long, short = 'm')]
    pub message: Option<String>,

    /// Template variable, repeatable (e.g. --var branch=release)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
}

impl PipelineArgs {
    pub fn overrides(&self) -> shipper::Result<Overrides> {
        let cwd = std::env::current_dir().map_err(|e| {
            shipper::Error::internal_io(e.to_string(), Some("read current directory".to_string()))
        })?;

        let mut vars = BTreeMap::new();
        for raw in &self.vars {
            let (key, value) = parse_var(raw)?;
            vars.insert(key, value);
        }
        if let Some(message) = &self.message {
            vars.insert("message".to_string(), message.clone());
        }

        Ok(Overrides {
            cwd,
            working_dir: self.dir.clone(),
            timeout_secs: self.timeout,
            vars,
        })
    }

    /// Locate, load and resolve the pipeline these flags describe.
    pub fn resolve(&self) -> shipper::Result<(LoadedPipeline, ResolvedPipeline)> {
        let overrides = self.overrides()?;
        let loaded = pipeline::discover(self.pipeline.as_deref(), &overrides.cwd)?;
        shipper::log_status!("pipeline", "Using {}", loaded.source.describe());

        let defaults = defaults::load_defaults();
        let resolved =
            loaded
                .pipeline
                .resolve(&overrides, &defaults, &loaded.base_dir(&overrides.cwd))?;
        Ok((loaded, resolved))
    }
}

/// Split a `KEY=VALUE` flag. The value may itself contain `=`.
pub fn parse_var(raw: &str) -> shipper::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(shipper::Error::validation_invalid_argument(
            "var",
            format!("Expected KEY=VALUE, got '{}'", raw),
            None,
            None,
        )),
    }
}

pub mod config;
pub mod init;
pub mod plan;
pub mod run;

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (shipper::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Run(args) => crate::output::map_cmd_result_to_json(run::run(args, global)),
        crate::Commands::Plan(args) => {
            crate::output::map_cmd_result_to_json(plan::run(args, global))
        }
        crate::Commands::Init(args) => {
            crate::output::map_cmd_result_to_json(init::run(args, global))
        }
        crate::Commands::Config(args) => {
            crate::output::map_cmd_result_to_json(config::run(args, global))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_splits_on_first_equals() {
        assert_eq!(
            parse_var("message=a=b").unwrap(),
            ("message".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_var("branch=").unwrap(),
            ("branch".to_string(), String::new())
        );
    }

    #[test]
    fn parse_var_rejects_missing_key() {
        assert!(parse_var("=value").is_err());
        assert!(parse_var("novalue").is_err());
    }

    #[test]
    fn message_flag_overrides_var() {
        let args = PipelineArgs {
            message: Some("from flag".to_string()),
            vars: vec!["message=from var".to_string(), "branch=dev".to_string()],
            ..PipelineArgs::default()
        };
        let overrides = args.overrides().unwrap();
        assert_eq!(overrides.vars["message"], "from flag");
        assert_eq!(overrides.vars["branch"], "dev");
    }
}
