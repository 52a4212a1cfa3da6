//! Wrappers around the external binaries this app drives.

pub mod discovery;
pub mod ffprobe;
pub mod models;
pub mod ytdlp;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::domain::ProgressSender;

pub use discovery::Toolchain;
pub use ffprobe::{FfmpegDecoder, Ffprobe};
pub use models::{FetchJob, ProbeVerdict};
pub use ytdlp::YtDlp;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not finish within {}s", .timeout.as_secs())]
    TimedOut { tool: String, timeout: Duration },

    #[error("unexpected output from {tool}: {detail}")]
    InvalidOutput { tool: String, detail: String },
}

impl ToolError {
    /// The binary could not be found or executed at all.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Fetches media and turns it into MP3 files inside the job's staging directory.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the paths the tool reports as produced. Progress is sent to
    /// `progress` when given.
    async fn fetch(&self, job: &FetchJob, progress: Option<&ProgressSender>)
        -> Result<Vec<PathBuf>>;
}

/// Inspects a file and says whether it is a well-formed MP3.
#[async_trait]
pub trait AudioProber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, path: &Path) -> Result<ProbeVerdict>;
}

/// Run a prepared command to completion, optionally bounded by a timeout.
pub(crate) async fn run_tool(
    tool: &str,
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<Output> {
    command.kill_on_drop(true).stdin(Stdio::null());

    let output = command.output();
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, output)
            .await
            .map_err(|_| ToolError::TimedOut {
                tool: tool.to_string(),
                timeout: limit,
            })?,
        None => output.await,
    };

    output.map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })
}

/// Lines a tool printed, minus the ones its line handler consumed.
#[derive(Debug)]
pub(crate) struct StreamedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl StreamedOutput {
    /// Turn a non-zero exit into [`ToolError::Failed`].
    pub fn into_success(self, tool: &str) -> Result<Self> {
        if self.status.success() {
            return Ok(self);
        }

        Err(ToolError::Failed {
            tool: tool.to_string(),
            status: self.status.to_string(),
            stderr: self.stderr.join("\n").trim().to_string(),
        })
    }
}

/// Run a command, reading stdout and stderr line by line as they arrive.
/// `on_line` sees every line first and returns `true` to consume it.
pub(crate) async fn run_tool_streaming(
    tool: &str,
    mut command: Command,
    mut on_line: impl FnMut(&str) -> bool,
) -> Result<StreamedOutput> {
    command
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let spawn_error = |source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    };
    let mut child = command.spawn().map_err(spawn_error)?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(ToolError::InvalidOutput {
            tool: tool.to_string(),
            detail: "output pipes were not captured".to_string(),
        });
    };

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut captured_out = Vec::new();
    let mut captured_err = Vec::new();
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        tokio::select! {
            line = stdout_lines.next_line(), if out_open => match line {
                Ok(Some(line)) => {
                    if !on_line(&line) {
                        captured_out.push(line);
                    }
                }
                Ok(None) => out_open = false,
                Err(e) => {
                    debug!(tool, %e, "stopped reading stdout");
                    out_open = false;
                }
            },
            line = stderr_lines.next_line(), if err_open => match line {
                Ok(Some(line)) => {
                    if !on_line(&line) {
                        captured_err.push(line);
                    }
                }
                Ok(None) => err_open = false,
                Err(e) => {
                    debug!(tool, %e, "stopped reading stderr");
                    err_open = false;
                }
            },
        }
    }

    let status = child.wait().await.map_err(spawn_error)?;

    Ok(StreamedOutput {
        status,
        stdout: captured_out,
        stderr: captured_err,
    })
}
