use clap::{Args, Subcommand};
use serde::Serialize;

use shipper::defaults::{self, Defaults, ShipperConfig};

use super::CmdResult;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display configuration (merged defaults + file)
    Show {
        /// Show only built-in defaults (ignore shipper.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Update global defaults in shipper.json
    Set {
        /// Per-step timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Recoverable stderr pattern (repeatable, replaces the current list)
        #[arg(long = "pattern", value_name = "TEXT")]
        patterns: Vec<String>,

        /// Maximum characters shown from stderr in warnings
        #[arg(long, value_name = "N")]
        excerpt_chars: Option<usize>,
    },
    /// Reset configuration to built-in defaults (deletes shipper.json)
    Reset,
    /// Show the path to shipper.json
    Path,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ShipperConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    defaults: Option<Defaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted: Option<bool>,
}

impl ConfigOutput {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            config: None,
            defaults: None,
            path: None,
            exists: None,
            deleted: None,
        }
    }
}

pub fn run(args: ConfigArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin } => show(builtin),
        ConfigCommand::Set {
            timeout,
            patterns,
            excerpt_chars,
        } => set(timeout, patterns, excerpt_chars),
        ConfigCommand::Reset => reset(),
        ConfigCommand::Path => path(),
    }
}

fn show(builtin: bool) -> CmdResult<ConfigOutput> {
    let mut output = ConfigOutput::new("config.show");
    if builtin {
        output.defaults = Some(defaults::builtin_defaults());
    } else {
        output.config = Some(defaults::load_config());
    }
    Ok((output, 0))
}

fn set(
    timeout: Option<u64>,
    patterns: Vec<String>,
    excerpt_chars: Option<usize>,
) -> CmdResult<ConfigOutput> {
    if timeout.is_none() && patterns.is_empty() && excerpt_chars.is_none() {
        return Err(shipper::Error::validation_missing_argument(vec![
            "--timeout".to_string(),
            "--pattern".to_string(),
            "--excerpt-chars".to_string(),
        ]));
    }

    let mut config = defaults::load_config();
    apply(&mut config.defaults, timeout, patterns, excerpt_chars)?;
    defaults::save_config(&config)?;

    let mut output = ConfigOutput::new("config.set");
    output.config = Some(config);
    output.path = Some(defaults::config_path()?);
    Ok((output, 0))
}

fn apply(
    target: &mut Defaults,
    timeout: Option<u64>,
    patterns: Vec<String>,
    excerpt_chars: Option<usize>,
) -> shipper::Result<()> {
    if let Some(secs) = timeout {
        if secs == 0 {
            return Err(shipper::Error::validation_invalid_argument(
                "timeout",
                "Timeout must be at least one second",
                None,
                None,
            ));
        }
        target.timeout_secs = secs;
    }
    if !patterns.is_empty() {
        target.recoverable_patterns = patterns;
    }
    if let Some(chars) = excerpt_chars {
        target.warning_excerpt_chars = chars;
    }
    Ok(())
}

fn reset() -> CmdResult<ConfigOutput> {
    let deleted = defaults::reset_config()?;

    let mut output = ConfigOutput::new("config.reset");
    output.defaults = Some(defaults::builtin_defaults());
    output.path = Some(defaults::config_path()?);
    output.deleted = Some(deleted);
    Ok((output, 0))
}

fn path() -> CmdResult<ConfigOutput> {
    let mut output = ConfigOutput::new("config.path");
    output.path = Some(defaults::config_path()?);
    output.exists = Some(defaults::config_exists());
    Ok((output, 0))
}
