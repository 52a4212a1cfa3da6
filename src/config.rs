use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{Bitrate, PlaylistMode};

/// Where the external binaries live. Bare names are looked up on `PATH`.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub ytdlp: PathBuf,
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp: PathBuf::from("yt-dlp"),
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// Everything the coordinator needs, decided once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub quality: Bitrate,
    pub playlist: PlaylistMode,
    /// Parent of the per-request staging directories.
    pub staging_root: PathBuf,
    /// Rejected files are moved here instead of deleted when set.
    pub quarantine_dir: Option<PathBuf>,
    /// Make promoted files readable and writable by the owner only.
    pub restrict_permissions: bool,
    pub probe_timeout: Duration,
    pub decode_timeout: Duration,
    pub tools: ToolsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_download_dir(),
            quality: Bitrate::default(),
            playlist: PlaylistMode::default(),
            staging_root: std::env::temp_dir(),
            quarantine_dir: None,
            restrict_permissions: true,
            probe_timeout: Duration::from_secs(15),
            decode_timeout: Duration::from_secs(20),
            tools: ToolsConfig::default(),
        }
    }
}

/// The platform downloads folder, falling back to `~/Downloads`, then the working directory.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.quality.kbps(), 192);
        assert_eq!(config.playlist, PlaylistMode::Expand);
        assert!(config.quarantine_dir.is_none());
        assert!(config.restrict_permissions);
        assert_eq!(config.probe_timeout, Duration::from_secs(15));
        assert_eq!(config.tools.ytdlp, PathBuf::from("yt-dlp"));
        assert!(!config.output_dir.as_os_str().is_empty());
    }
}
