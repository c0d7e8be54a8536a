//! Running external programs and turning their exit status into errors.

use crate::error::{Error, Result};

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

const STDERR_TAIL_LINES: usize = 20;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Human readable command line, used for logging and dry runs.
pub fn command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| {
            let part = part.to_string_lossy();
            if part.contains(' ') {
                format!("\"{}\"", part)
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn tool_name(command: &Command) -> String {
    std::path::Path::new(command.get_program())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.get_program().to_string_lossy().into_owned())
}

fn spawn_error(command: &Command, error: std::io::Error) -> Error {
    if error.kind() == ErrorKind::NotFound {
        Error::ToolNotAvailable(command.get_program().to_string_lossy().into_owned())
    } else {
        Error::Io(error)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn check(command: &Command, output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::ToolFailed {
            tool: tool_name(command),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

/// Runs to completion and fails on a non-zero exit.
pub fn run(command: &mut Command) -> Result<Output> {
    tracing::debug!(command = %command_line(command), "running");
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(command, e))?;
    check(command, output)
}

/// Runs to completion and returns the output whatever the exit status.
/// `ffmpeg -i <file>` without an output always exits non-zero but prints
/// the stream information we need.
pub fn run_unchecked(command: &mut Command) -> Result<Output> {
    tracing::debug!(command = %command_line(command), "running");
    command
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(command, e))
}

/// Runs while calling `on_tick` every poll interval until the child exits.
pub fn run_polling<F: FnMut()>(command: &mut Command, mut on_tick: F) -> Result<Output> {
    tracing::debug!(command = %command_line(command), "running");
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(command, e))?;

    let stderr_reader = drain_stderr(&mut child);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                on_tick();
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Io(e));
            }
        }
    };
    on_tick();

    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    check(command, Output { status, stdout: Vec::new(), stderr })
}

// The upscaler can write a lot to stderr; read it on a separate thread so
// the pipe never fills up and blocks the child.
fn drain_stderr(child: &mut Child) -> Option<thread::JoinHandle<Vec<u8>>> {
    child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stderr.read_to_end(&mut buffer);
            buffer
        })
    })
}
