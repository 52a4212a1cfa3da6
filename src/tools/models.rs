use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::{Bitrate, PlaylistMode};

/// One downloader invocation.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub url: String,
    /// Directory the downloader must write into.
    pub staging_dir: PathBuf,
    /// yt-dlp output template, rooted in `staging_dir`.
    pub output_template: String,
    pub quality: Bitrate,
    pub playlist: PlaylistMode,
}

impl FetchJob {
    pub fn new(url: &str, staging_dir: PathBuf, quality: Bitrate, playlist: PlaylistMode) -> Self {
        let output_template = staging_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned();

        Self {
            url: url.to_string(),
            staging_dir,
            output_template,
            quality,
            playlist,
        }
    }
}

/// A prober's answer about a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Valid,
    Invalid(String),
}

/// Output of `ffprobe -print_format json -show_format -show_streams`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: String,
    pub bit_rate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub format_name: String,
    pub duration: Option<String>,
}

impl ProbeOutput {
    /// Decide whether this describes an MP3 with an audio stream.
    pub fn verdict(&self) -> ProbeVerdict {
        let Some(format) = &self.format else {
            return ProbeVerdict::Invalid("no container format reported".to_string());
        };

        if !format.format_name.to_lowercase().contains("mp3") {
            return ProbeVerdict::Invalid(format!(
                "expected mp3, found format {:?}",
                format.format_name
            ));
        }

        if !self.streams.iter().any(|s| s.codec_type == "audio") {
            return ProbeVerdict::Invalid("no audio stream".to_string());
        }

        ProbeVerdict::Valid
    }
}
