use clap::Args;
use serde::Serialize;

use shipper::pipeline::{PipelineSource, ResolvedPipeline};

use super::{CmdResult, PipelineArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: PipelineArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub command: String,
    pub source: PipelineSource,
    pub pipeline: ResolvedPipeline,
}

pub fn run(args: PlanArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PlanOutput> {
    let (loaded, resolved) = args.source.resolve()?;

    Ok((
        PlanOutput {
            command: "plan".to_string(),
            source: loaded.source,
            pipeline: resolved,
        },
        0,
    ))
}
