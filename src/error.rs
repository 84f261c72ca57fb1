//! Error types for voice stamping jobs.
//!
//! Tool-level failures (`ToolError`) are wrapped into a job-level
//! `VoiceStampError` that names the pipeline stage that failed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("{tool} exited with status {code}{}", stderr_suffix(.stderr))]
    Exit {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// The program exceeded the configured wait and was killed.
    #[error("{tool} did not finish within {secs}s and was killed")]
    Timeout { tool: String, secs: u64 },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", stderr.trim())
    }
}

impl ToolError {
    pub fn exit(tool: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            tool: tool.into(),
            code,
            stderr: stderr.into(),
        }
    }

    pub fn launch(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Launch {
            tool: tool.into(),
            source,
        }
    }
}

/// Job-level error. Every variant aborts the current job only.
#[derive(Error, Debug)]
pub enum VoiceStampError {
    /// Preconditions not met (track too short, destination exists, bad config values).
    #[error("{0}")]
    Validation(String),

    #[error("failed to speak \"{text}\": {source}")]
    Render {
        text: String,
        #[source]
        source: ToolError,
    },

    #[error("failed to merge voice segments: {source}")]
    Assembly {
        #[source]
        source: ToolError,
    },

    #[error("failed to convert \"{}\" to WAV: {source}", .path.display())]
    Conversion {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("failed to calculate RMS amplitude of \"{}\": {message}", .path.display())]
    Measurement { path: PathBuf, message: String },

    #[error("failed to adjust voice overlay volume: {source}")]
    Rescale {
        #[source]
        source: ToolError,
    },

    #[error("failed to create final mix: {source}")]
    Mix {
        #[source]
        source: ToolError,
    },

    #[error("cannot handle metadata of \"{}\": {message}", .path.display())]
    Metadata { path: PathBuf, message: String },

    /// Temporary directory or staging file could not be created or removed.
    #[error("workspace error ({operation}): {source}")]
    Workspace {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Moving the staged file over the destination failed.
    #[error("failed to publish \"{}\": {source}", .path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{tool} timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl VoiceStampError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn workspace(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Workspace {
            operation: operation.into(),
            source,
        }
    }

    /// Wrap a tool failure with stage context. Timeouts are reported as
    /// `ToolTimeout` no matter which stage hit them.
    pub fn from_tool(err: ToolError, wrap: impl FnOnce(ToolError) -> Self) -> Self {
        match err {
            ToolError::Timeout { tool, secs } => Self::ToolTimeout { tool, secs },
            other => wrap(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceStampError>;
