use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::models::{ProbeOutput, ProbeVerdict};
use super::{run_tool, AudioProber, Result, ToolError};

/// Asks ffprobe for the container format and streams of a file.
pub struct Ffprobe {
    binary: PathBuf,
    timeout: Duration,
}

impl Ffprobe {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl AudioProber for Ffprobe {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeVerdict> {
        let mut command = Command::new(&self.binary);
        command
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);

        let output = run_tool(self.name(), command, Some(self.timeout)).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            // ffprobe exits non-zero for files it cannot parse; that is a verdict, not a tool fault.
            let reason = if stderr.is_empty() {
                format!("ffprobe exited with {}", output.status)
            } else {
                stderr
            };
            return Ok(ProbeVerdict::Invalid(reason));
        }

        let parsed: ProbeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| ToolError::InvalidOutput {
                tool: self.name().to_string(),
                detail: e.to_string(),
            })?;

        let verdict = parsed.verdict();
        debug!(file = %path.display(), ?verdict, "ffprobe verdict");
        Ok(verdict)
    }
}

/// Decodes the whole file with ffmpeg; any decode error means the file is broken.
pub struct FfmpegDecoder {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegDecoder {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl AudioProber for FfmpegDecoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeVerdict> {
        let mut command = Command::new(&self.binary);
        command
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(path)
            .args(["-f", "null", "-"]);

        let output = run_tool(self.name(), command, Some(self.timeout)).await?;
        if output.status.success() {
            return Ok(ProbeVerdict::Valid);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok(ProbeVerdict::Invalid(format!("decode failed: {}", stderr)))
    }
}
