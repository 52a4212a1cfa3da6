use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    domain::{AppError, DownloadRequest, FailureKind, ProgressSender},
    tools::{FetchJob, MediaDownloader, ToolError},
};

/// Turns a request into a downloader invocation and collects what it produced.
pub struct DownloadOrchestrator {
    downloader: Option<Arc<dyn MediaDownloader>>,
}

impl DownloadOrchestrator {
    /// `None` means the downloader binary was not found at startup.
    pub fn new(downloader: Option<Arc<dyn MediaDownloader>>) -> Self {
        Self { downloader }
    }

    pub fn is_available(&self) -> bool {
        self.downloader.is_some()
    }

    pub async fn fetch(
        &self,
        url: &str,
        staging_dir: &Path,
        request: &DownloadRequest,
        progress: Option<&ProgressSender>,
    ) -> Result<Vec<PathBuf>, AppError> {
        let downloader = self.downloader.as_ref().ok_or_else(|| AppError::ToolMissing {
            tool: "yt-dlp".to_string(),
        })?;

        let job = FetchJob::new(
            url,
            staging_dir.to_path_buf(),
            request.quality(),
            request.playlist(),
        );

        match downloader.fetch(&job, progress).await {
            Ok(paths) => {
                debug!(count = paths.len(), "downloader finished");
                Ok(paths)
            }
            Err(err) => {
                error!(tool = downloader.name(), %err, "download failed");
                Err(to_app_error(url, downloader.name(), err))
            }
        }
    }
}

fn to_app_error(url: &str, tool: &str, err: ToolError) -> AppError {
    if err.is_not_found() {
        return AppError::ToolMissing {
            tool: tool.to_string(),
        };
    }

    let diagnostics = match err {
        ToolError::Failed { stderr, .. } if !stderr.is_empty() => stderr,
        other => other.to_string(),
    };

    AppError::DownloadFailure {
        url: url.to_string(),
        kind: FailureKind::classify(&diagnostics),
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::FakeDownloader;
    use crate::domain::{Bitrate, PlaylistMode};

    fn request(dir: &Path, playlist: PlaylistMode) -> DownloadRequest {
        DownloadRequest::new(
            ["https://www.youtube.com/watch?v=VALID_ID"],
            dir,
            Bitrate::new(256).unwrap(),
            playlist,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_downloader_is_tool_missing() {
        let stage = tempfile::tempdir().unwrap();
        let orchestrator = DownloadOrchestrator::new(None);

        let err = orchestrator
            .fetch(
                "https://www.youtube.com/watch?v=VALID_ID",
                stage.path(),
                &request(stage.path(), PlaylistMode::Expand),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ToolMissing { tool } if tool == "yt-dlp"));
    }

    #[tokio::test]
    async fn test_passes_request_settings_to_downloader() {
        let stage = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeDownloader::producing(&["Song.mp3"]));
        let downloader: Arc<dyn MediaDownloader> = fake.clone();
        let orchestrator = DownloadOrchestrator::new(Some(downloader));

        let paths = orchestrator
            .fetch(
                "https://www.youtube.com/watch?v=VALID_ID",
                stage.path(),
                &request(stage.path(), PlaylistMode::SingleItem),
                None,
            )
            .await
            .unwrap();

        assert_eq!(paths, vec![stage.path().join("Song.mp3")]);

        let jobs = fake.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].quality.kbps(), 256);
        assert_eq!(jobs[0].playlist, PlaylistMode::SingleItem);
        assert_eq!(jobs[0].staging_dir, stage.path());
    }

    #[tokio::test]
    async fn test_failure_is_classified() {
        let stage = tempfile::tempdir().unwrap();
        let fake: Arc<dyn MediaDownloader> = Arc::new(FakeDownloader::failing(
            "ERROR: [youtube] VALID_ID: Video unavailable",
        ));
        let orchestrator = DownloadOrchestrator::new(Some(fake));

        let err = orchestrator
            .fetch(
                "https://www.youtube.com/watch?v=VALID_ID",
                stage.path(),
                &request(stage.path(), PlaylistMode::Expand),
                None,
            )
            .await
            .unwrap_err();

        match err {
            AppError::DownloadFailure {
                kind, diagnostics, ..
            } => {
                assert_eq!(kind, FailureKind::Unavailable);
                assert!(diagnostics.contains("Video unavailable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_spawn_not_found_maps_to_tool_missing() {
        let err = ToolError::Spawn {
            tool: "yt-dlp".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(matches!(
            to_app_error("https://x", "yt-dlp", err),
            AppError::ToolMissing { .. }
        ));
    }
}
