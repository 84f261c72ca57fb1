//! Blocking runner for external tools.
//!
//! Every external program the pipeline drives goes through `ToolRunner` so
//! that logging, stderr capture and the optional hang guard live in one place.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ToolError;

/// How often a running child is polled when a timeout is configured.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long reader threads get to finish once a timed-out child was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Only the tail of stderr is kept in error messages.
const STDERR_TAIL_LINES: usize = 12;

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRunner {
    timeout: Option<Duration>,
}

impl ToolRunner {
    /// `timeout` of `None` waits for the child indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        ToolRunner { timeout }
    }

    /// Run `cmd` to completion. Non-zero exit is an error carrying the stderr tail.
    pub fn run(&self, mut cmd: Command) -> Result<ToolOutput, ToolError> {
        let tool = tool_name(&cmd);
        log::debug!("running {:?}", cmd);

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::launch(&tool, e))?;

        // Drain both pipes on helper threads so a chatty tool cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => match wait_with_deadline(&mut child, limit, &tool) {
                Ok(status) => status,
                Err(e) => {
                    reap_drains(vec![stdout, stderr], &tool);
                    return Err(e);
                }
            },
            None => child.wait().map_err(|e| ToolError::launch(&tool, e))?,
        };

        let output = ToolOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(ToolError::exit(
                tool,
                status.code().unwrap_or(-1),
                stderr_tail(&output.stderr),
            ))
        }
    }
}

fn tool_name(cmd: &Command) -> String {
    std::path::Path::new(cmd.get_program())
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| cmd.get_program().to_string_lossy().to_string())
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Join reader threads of a killed child. A grandchild may still hold a
/// pipe open; such readers are left to finish on their own.
fn reap_drains(mut handles: Vec<thread::JoinHandle<String>>, tool: &str) {
    let started = Instant::now();
    while !handles.is_empty() && started.elapsed() < DRAIN_GRACE {
        let (done, pending): (Vec<_>, Vec<_>) =
            handles.into_iter().partition(|h| h.is_finished());
        for handle in done {
            let _ = handle.join();
        }
        handles = pending;
        if !handles.is_empty() {
            thread::sleep(POLL_INTERVAL);
        }
    }
    if !handles.is_empty() {
        log::debug!(
            "{} output still held open after kill, detaching {} reader(s)",
            tool,
            handles.len()
        );
    }
}

fn wait_with_deadline(
    child: &mut Child,
    limit: Duration,
    tool: &str,
) -> Result<ExitStatus, ToolError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if started.elapsed() >= limit => {
                log::warn!("{} exceeded {}s, killing it", tool, limit.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout {
                    tool: tool.to_string(),
                    secs: limit.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(ToolError::launch(tool, e)),
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
