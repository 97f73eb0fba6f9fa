//! Human-readable progress lines for a pipeline run.
//!
//! The format is fixed: emoji-prefixed labels, indented command echoes,
//! captured output, and a ruled summary block. It is not meant to be parsed.

use std::fmt;
use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::pipeline::SummaryBlock;
use crate::utils::{command, shell};

const RULE_WIDTH: usize = 60;

pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        match writeln!(self.out, "{}", args) {
            Ok(()) => Ok(()),
            // A closed pipe (e.g. `| head`) should not abort the run.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(Error::internal_io(
                e.to_string(),
                Some("write console".to_string()),
            )),
        }
    }

    fn rule(&mut self) -> Result<()> {
        self.line(format_args!("{}", "=".repeat(RULE_WIDTH)))
    }

    pub fn header(&mut self, title: &str) -> Result<()> {
        self.line(format_args!("🚀 {}\n", title))?;
        self.rule()
    }

    pub fn preflight_start(&mut self) -> Result<()> {
        self.line(format_args!("\n🔎 Preflight checks..."))
    }

    pub fn preflight_pass(&mut self, path: &str) -> Result<()> {
        self.line(format_args!("   ✅ PASS: {}", path))
    }

    pub fn preflight_fail(&mut self, path: &str) -> Result<()> {
        self.line(format_args!("   ❌ FAIL: {} missing", path))
    }

    pub fn step_start(&mut self, label: &str, argv: &[String]) -> Result<()> {
        self.line(format_args!("\n📍 {}...", label))?;
        self.line(format_args!("   Command: {}", shell::quote_args(argv)))
    }

    pub fn captured_stdout(&mut self, stdout: &str) -> Result<()> {
        self.line(format_args!("{}", stdout.trim_end()))
    }

    pub fn warning(&mut self, stderr: &str, max_chars: usize) -> Result<()> {
        let excerpt = command::excerpt(stderr, max_chars);
        self.line(format_args!("   ⚠️ {}", excerpt.trim_end()))
    }

    pub fn command_failed(&mut self, exit_code: i32) -> Result<()> {
        self.line(format_args!("   ❌ Command failed with code {}", exit_code))
    }

    pub fn fault(&mut self, error: &Error) -> Result<()> {
        self.line(format_args!("   ❌ Error: {}", error))
    }

    pub fn success(&mut self) -> Result<()> {
        self.line(format_args!("   ✅ Success"))
    }

    pub fn dry_run(&mut self) -> Result<()> {
        self.line(format_args!("   ⏭️  Dry run: not executed"))
    }

    pub fn summary(&mut self, summary: &SummaryBlock) -> Result<()> {
        self.line(format_args!(""))?;
        self.rule()?;
        if !summary.headline.is_empty() {
            self.line(format_args!("{}", summary.headline))?;
        }
        for line in &summary.lines {
            self.line(format_args!("{}", line))?;
        }
        Ok(())
    }
}
