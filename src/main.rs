use clap::{Parser, Subcommand};

use commands::GlobalArgs;

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    /// Progress lines go straight to stdout; JSON is printed only for errors.
    Console,
}

mod commands;
mod output;

use commands::{config, init, plan, run};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "shipper")]
#[command(version = VERSION)]
#[command(about = "Run ordered git deployment pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline: stage, commit, rebase and push, stopping at the first real failure
    Run(run::RunArgs),
    /// Show the resolved pipeline without running it
    Plan(plan::PlanArgs),
    /// Write the reference pipeline to a file
    Init(init::InitArgs),
    /// Manage global Shipper configuration
    Config(config::ConfigArgs),
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::Run(args) if !args.json => ResponseMode::Console,
        _ => ResponseMode::Json,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};
    let mode = response_mode(&cli.command);

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    match mode {
        ResponseMode::Json => {
            let _ = output::print_json_result(json_result, exit_code);
        }
        ResponseMode::Console => {
            if let Err(err) = json_result {
                let _ = output::print_result::<serde_json::Value>(Err(err));
            }
        }
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
