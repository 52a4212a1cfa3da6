use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// What the downloader's diagnostics say went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    UnsupportedUrl,
    Network,
    Other,
}

impl FailureKind {
    /// Classify yt-dlp stderr output.
    pub fn classify(diagnostics: &str) -> Self {
        let lower = diagnostics.to_lowercase();

        if lower.contains("unsupported url") {
            return Self::UnsupportedUrl;
        }

        if lower.contains("video unavailable")
            || lower.contains("private video")
            || lower.contains("has been removed")
            || lower.contains("not available")
            || lower.contains("http error 404")
        {
            return Self::Unavailable;
        }

        if lower.contains("unable to download webpage")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("name resolution")
            || lower.contains("network is unreachable")
        {
            return Self::Network;
        }

        Self::Other
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "video unavailable"),
            Self::UnsupportedUrl => write!(f, "unsupported URL"),
            Self::Network => write!(f, "network error"),
            Self::Other => write!(f, "downloader error"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Download failed for {url} ({kind}): {diagnostics}")]
    DownloadFailure {
        url: String,
        kind: FailureKind,
        diagnostics: String,
    },

    #[error("Validation failed for {}: {reason}", .file.display())]
    ValidationFailure { file: PathBuf, reason: String },

    #[error("{tool} not found on PATH; install it or point to it explicitly")]
    ToolMissing { tool: String },

    #[error("The downloader produced no MP3 for {url}")]
    NoOutputProduced { url: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    pub fn io(context: &str, err: std::io::Error) -> Self {
        Self::Io(format!("{}: {}", context, err))
    }
}
