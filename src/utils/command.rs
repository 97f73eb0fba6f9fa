//! Command execution primitives with a hard deadline.
//!
//! Arguments are passed to the program literally; nothing here goes through a shell.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured output from command execution.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// A finished child process: exit code, text output and wall time.
#[derive(Debug, Clone)]
pub struct TimedOutput {
    pub exit_code: i32,
    pub output: CapturedOutput,
    pub elapsed: Duration,
}

/// Run `command` (program followed by its arguments) in `dir`, killing it after `timeout_secs`.
///
/// The deadline covers the whole invocation: waiting for the child to exit and reading
/// its output to EOF. Spawn failures, read failures and timeouts come back as errors. A
/// child that runs to completion is always `Ok`, whatever its exit code. A child
/// terminated by a signal reports exit code -1.
pub fn run_with_timeout(command: &[String], dir: &Path, timeout_secs: u64) -> Result<TimedOutput> {
    let (program, args) = command.split_first().ok_or_else(|| {
        Error::validation_invalid_argument("command", "Command is empty", None, None)
    })?;

    let started = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::step_spawn_failed(command, e.to_string()))?;

    // Both pipes drain concurrently so a chatty child never blocks on a full buffer.
    let (tx, rx) = mpsc::channel();
    spawn_reader(child.stdout.take(), Stream::Stdout, tx.clone());
    spawn_reader(child.stderr.take(), Stream::Stderr, tx);

    let deadline = started + Duration::from_secs(timeout_secs);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::step_timeout(command, timeout_secs));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::step_io_failed(command, e.to_string()));
            }
        }
    };

    // A background process that inherited the pipes can hold them open after the child
    // exits, so EOF is awaited against the same deadline.
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((stream, Ok(bytes))) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                match stream {
                    Stream::Stdout => stdout = Some(text),
                    Stream::Stderr => stderr = Some(text),
                }
            }
            Ok((_, Err(e))) => return Err(Error::step_io_failed(command, e.to_string())),
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::step_timeout(command, timeout_secs));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::step_io_failed(command, "output reader stopped"));
            }
        }
    }

    Ok(TimedOutput {
        exit_code: status.code().unwrap_or(-1),
        output: CapturedOutput::new(stdout.unwrap_or_default(), stderr.unwrap_or_default()),
        elapsed: started.elapsed(),
    })
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Reads `source` to EOF on its own thread and sends the bytes once.
///
/// The thread is never joined. It ends when the last writer closes the pipe; if the
/// receiver is gone by then, the send fails and the buffer is dropped.
fn spawn_reader<R>(source: Option<R>, stream: Stream, tx: Sender<(Stream, io::Result<Vec<u8>>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match source {
            Some(mut source) => source.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send((stream, result));
    });
}

/// First `max_chars` characters of `text` (not bytes, so multi-byte output never splits).
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
