use clap::Args;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use shipper::pipeline::Pipeline;

use super::CmdResult;

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the pipeline (.toml writes TOML, anything else JSON)
    #[arg(long, default_value = "shipper.pipeline.json")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOutput {
    pub command: String,
    pub path: String,
    pub format: String,
    pub steps: usize,
    pub overwritten: bool,
}

pub fn run(args: InitArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<InitOutput> {
    let existed = args.path.exists();
    if existed && !args.force {
        return Err(shipper::Error::validation_invalid_argument(
            "path",
            format!("{} already exists", args.path.display()),
            None,
            None,
        )
        .with_hint("Pass --force to overwrite it"));
    }

    let pipeline = Pipeline::reference();
    let is_toml = args
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let content = if is_toml {
        toml::to_string_pretty(&pipeline).map_err(|e| {
            shipper::Error::internal_unexpected(format!("Failed to serialize pipeline: {}", e))
        })?
    } else {
        pipeline.to_json_pretty()?
    };

    if let Some(parent) = args.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            shipper::Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    fs::write(&args.path, content).map_err(|e| {
        shipper::Error::internal_io(e.to_string(), Some(format!("write {}", args.path.display())))
    })?;

    shipper::log_status!("init", "Wrote {}", args.path.display());

    Ok((
        InitOutput {
            command: "init".to_string(),
            path: args.path.display().to_string(),
            format: if is_toml { "toml" } else { "json" }.to_string(),
            steps: pipeline.steps.len(),
            overwritten: existed,
        },
        0,
    ))
}
