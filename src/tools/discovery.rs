use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::run_tool;
use crate::config::ToolsConfig;

/// External binaries resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    pub downloader: Option<PathBuf>,
    pub prober: Option<PathBuf>,
    pub decoder: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

impl Toolchain {
    pub fn discover(config: &ToolsConfig) -> Self {
        let toolchain = Self {
            downloader: resolve(&config.ytdlp),
            prober: resolve(&config.ffprobe),
            decoder: resolve(&config.ffmpeg),
        };

        debug!(?toolchain, "resolved external tools");

        if toolchain.decoder.is_none() {
            warn!(
                "ffmpeg not found on PATH; yt-dlp will not be able to convert downloads to MP3"
            );
        }

        toolchain
    }

    /// Availability and version of every tool, for `--check-tools`.
    pub async fn status(&self) -> Vec<ToolStatus> {
        vec![
            status_of("yt-dlp", self.downloader.as_deref(), "--version").await,
            status_of("ffprobe", self.prober.as_deref(), "-version").await,
            status_of("ffmpeg", self.decoder.as_deref(), "-version").await,
        ]
    }
}

fn resolve(binary: &Path) -> Option<PathBuf> {
    which::which(binary).ok()
}

async fn status_of(name: &str, path: Option<&Path>, version_flag: &str) -> ToolStatus {
    let version = match path {
        Some(path) => version_of(name, path, version_flag).await,
        None => None,
    };

    ToolStatus {
        name: name.to_string(),
        path: path.map(Path::to_path_buf),
        version,
    }
}

async fn version_of(name: &str, path: &Path, flag: &str) -> Option<String> {
    let mut command = Command::new(path);
    command.arg(flag);

    let output = run_tool(name, command, Some(Duration::from_secs(10)))
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }

    // ffmpeg tools print a banner; the first line carries the version.
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}
