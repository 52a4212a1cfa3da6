use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::sync::mpsc;
use url::Url;

use super::AppError;
use crate::utils::format_size;

/// MP3 bitrate in kbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bitrate(u16);

impl Bitrate {
    pub const MIN: u16 = 32;
    pub const MAX: u16 = 320;

    /// Choices offered by the interactive form.
    pub const PRESETS: [Bitrate; 5] = [
        Bitrate(128),
        Bitrate(160),
        Bitrate(192),
        Bitrate(256),
        Bitrate(320),
    ];

    pub fn new(kbps: u16) -> Result<Self, AppError> {
        if (Self::MIN..=Self::MAX).contains(&kbps) {
            Ok(Self(kbps))
        } else {
            Err(AppError::InvalidInput(format!(
                "bitrate must be between {} and {} kbps, got {}",
                Self::MIN,
                Self::MAX,
                kbps
            )))
        }
    }

    pub fn kbps(self) -> u16 {
        self.0
    }

    /// Value for yt-dlp's `--audio-quality`.
    pub fn as_audio_quality(self) -> String {
        format!("{}K", self.kbps())
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self(192)
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kbps", self.kbps())
    }
}

impl FromStr for Bitrate {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .strip_suffix("kbps")
            .or_else(|| lower.strip_suffix('k'))
            .unwrap_or(&lower)
            .trim();

        let kbps = digits
            .parse::<u16>()
            .map_err(|_| AppError::InvalidInput(format!("not a bitrate: {:?}", s)))?;

        Self::new(kbps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistMode {
    /// Let the downloader expand playlists.
    #[default]
    Expand,
    /// Restrict the download to a single item.
    SingleItem,
}

impl PlaylistMode {
    pub const ALL: [PlaylistMode; 2] = [PlaylistMode::Expand, PlaylistMode::SingleItem];

    pub fn from_no_playlist(no_playlist: bool) -> Self {
        if no_playlist {
            Self::SingleItem
        } else {
            Self::Expand
        }
    }
}

impl fmt::Display for PlaylistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expand => write!(f, "Whole playlist"),
            Self::SingleItem => write!(f, "Single item"),
        }
    }
}

/// A validated, immutable request.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    urls: Vec<String>,
    output_dir: PathBuf,
    quality: Bitrate,
    playlist: PlaylistMode,
}

impl DownloadRequest {
    pub fn new<I, S>(
        urls: I,
        output_dir: impl Into<PathBuf>,
        quality: Bitrate,
        playlist: PlaylistMode,
    ) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|raw| validate_url(raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if urls.is_empty() {
            return Err(AppError::InvalidInput("no URL given".to_string()));
        }

        let output_dir = output_dir.into();
        if output_dir.as_os_str().is_empty() {
            return Err(AppError::InvalidInput(
                "destination directory is empty".to_string(),
            ));
        }

        Ok(Self {
            urls,
            output_dir,
            quality,
            playlist,
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn quality(&self) -> Bitrate {
        self.quality
    }

    pub fn playlist(&self) -> PlaylistMode {
        self.playlist
    }
}

fn validate_url(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let parsed =
        Url::parse(trimmed).map_err(|e| AppError::InvalidInput(format!("{}: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(AppError::InvalidInput(format!(
            "{}: unsupported scheme {:?}",
            trimmed, other
        ))),
    }
}

/// How thoroughly a file was checked before promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Container and audio stream confirmed by ffprobe.
    Probed,
    /// Decoded end to end by ffmpeg; the container was not inspected.
    Decoded,
    ExistenceOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Pending,
    Valid(Verification),
    Invalid(String),
}

/// A file the downloader produced, still sitting in staging.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub temp_path: PathBuf,
    pub intended_path: PathBuf,
    pub status: ValidationStatus,
}

impl StagedFile {
    pub fn new(temp_path: PathBuf, intended_path: PathBuf) -> Self {
        Self {
            temp_path,
            intended_path,
            status: ValidationStatus::Pending,
        }
    }

    pub fn display_name(&self) -> String {
        self.intended_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.temp_path.display().to_string())
    }
}

/// Progress of the file the downloader is currently fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub title: Option<String>,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Receives progress while a request runs. Send errors are ignored.
pub type ProgressSender = mpsc::UnboundedSender<DownloadProgress>;

impl DownloadProgress {
    /// Share of the file fetched so far, when the size is known.
    pub fn fraction(&self) -> Option<f32> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some((self.downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0) as f32)
            }
            _ => None,
        }
    }

    /// Whole percent, used to throttle console output.
    pub fn percent(&self) -> Option<u32> {
        self.fraction().map(|f| (f * 100.0).floor() as u32)
    }
}

impl fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = &self.title {
            write!(f, "{}: ", title)?;
        }
        match (self.fraction(), self.total_bytes) {
            (Some(fraction), Some(total)) => write!(
                f,
                "{:.1}% ({} of {})",
                fraction * 100.0,
                format_size(self.downloaded_bytes),
                format_size(total)
            ),
            _ => write!(f, "{}", format_size(self.downloaded_bytes)),
        }
    }
}
