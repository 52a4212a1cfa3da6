use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::{
    application::{DownloadOrchestrator, StagingValidator, ValidationMode},
    config::AppConfig,
    domain::{AppError, DownloadRequest, FileReport, ProgressSender, RequestReport, UrlReport},
    tools::{MediaDownloader, Toolchain, YtDlp},
    utils::extract_video_id,
};

/// Runs the staged download for every URL of a request, one after another.
#[derive(Clone)]
pub struct DownloadCoordinator {
    orchestrator: Arc<DownloadOrchestrator>,
    validator: Arc<StagingValidator>,
}

impl DownloadCoordinator {
    pub fn new(orchestrator: DownloadOrchestrator, validator: StagingValidator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            validator: Arc::new(validator),
        }
    }

    /// Wire up the real tools found at startup.
    pub fn from_config(config: &AppConfig, toolchain: &Toolchain) -> Self {
        let downloader = toolchain
            .downloader
            .clone()
            .map(|path| Arc::new(YtDlp::new(path)) as Arc<dyn MediaDownloader>);

        if downloader.is_none() {
            warn!("yt-dlp not found; downloads will fail until it is installed");
        }

        let mode = ValidationMode::detect(toolchain, config);
        info!(?mode, "validation mode selected");

        Self::new(
            DownloadOrchestrator::new(downloader),
            StagingValidator::new(mode, config),
        )
    }

    pub fn validation_warning(&self) -> Option<&'static str> {
        self.validator.mode().warning()
    }

    pub fn downloader_available(&self) -> bool {
        self.orchestrator.is_available()
    }

    /// Download, validate and promote every URL of `request`. Progress of
    /// each fetch goes to `progress`; the sender is dropped on return.
    pub async fn run(
        &self,
        request: DownloadRequest,
        progress: Option<ProgressSender>,
    ) -> RequestReport {
        let mut report = RequestReport {
            urls: Vec::with_capacity(request.urls().len()),
            warnings: self
                .validation_warning()
                .map(|w| vec![w.to_string()])
                .unwrap_or_default(),
        };

        for url in request.urls() {
            let span = info_span!("download", %url, video_id = ?extract_video_id(url));
            let result = self
                .run_url(url, &request, progress.as_ref())
                .instrument(span)
                .await;

            if let Err(err) = &result {
                warn!(%url, %err, "request failed");
            }

            report.urls.push(UrlReport {
                url: url.clone(),
                result,
            });
        }

        report
    }

    async fn run_url(
        &self,
        url: &str,
        request: &DownloadRequest,
        progress: Option<&ProgressSender>,
    ) -> Result<Vec<FileReport>, AppError> {
        let staging = self.validator.open_staging()?;

        let produced = self
            .orchestrator
            .fetch(url, staging.path(), request, progress)
            .await?;
        if produced.is_empty() {
            return Err(AppError::NoOutputProduced {
                url: url.to_string(),
            });
        }

        let files = self.validator.settle(produced, request.output_dir()).await;

        let staging_path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!(dir = %staging_path.display(), %e, "could not remove staging directory");
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{file_names, FakeDownloader, FakeProber};
    use crate::domain::{Bitrate, FailureKind, PlaylistMode, Verification};
    use std::path::Path;
    use tempfile::TempDir;

    const URL: &str = "https://www.youtube.com/watch?v=VALID_ID";

    struct Harness {
        stage: TempDir,
        dest: TempDir,
        fake: Arc<FakeDownloader>,
        coordinator: DownloadCoordinator,
    }

    fn harness(fake: FakeDownloader, mode: ValidationMode) -> Harness {
        let stage = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let config = AppConfig {
            output_dir: dest.path().to_path_buf(),
            staging_root: stage.path().to_path_buf(),
            ..AppConfig::default()
        };

        let fake = Arc::new(fake);
        let downloader: Arc<dyn MediaDownloader> = fake.clone();
        let coordinator = DownloadCoordinator::new(
            DownloadOrchestrator::new(Some(downloader)),
            StagingValidator::new(mode, &config),
        );

        Harness {
            stage,
            dest,
            fake,
            coordinator,
        }
    }

    fn probed() -> ValidationMode {
        ValidationMode::Full {
            prober: Arc::new(FakeProber),
            fallback: None,
        }
    }

    fn request(dest: &Path, playlist: PlaylistMode) -> DownloadRequest {
        DownloadRequest::new([URL], dest, Bitrate::new(256).unwrap(), playlist).unwrap()
    }

    #[tokio::test]
    async fn test_single_video_lands_in_destination() {
        let h = harness(FakeDownloader::producing(&["Never Gonna.mp3"]), probed());

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;

        assert!(report.is_success());
        assert!(report.warnings.is_empty());
        assert_eq!(file_names(h.dest.path()), vec!["Never Gonna.mp3"]);
        assert!(file_names(h.stage.path()).is_empty());
        assert_eq!(h.fake.jobs()[0].quality.as_audio_quality(), "256K");
    }

    #[tokio::test]
    async fn test_unavailable_video_writes_nothing() {
        let h = harness(
            FakeDownloader::failing("ERROR: [youtube] VALID_ID: Video unavailable"),
            probed(),
        );

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;

        assert!(!report.is_success());
        assert!(matches!(
            &report.urls[0].result,
            Err(AppError::DownloadFailure {
                kind: FailureKind::Unavailable,
                ..
            })
        ));
        assert!(file_names(h.dest.path()).is_empty());
        assert!(file_names(h.stage.path()).is_empty());
    }

    #[tokio::test]
    async fn test_no_output_is_reported() {
        let h = harness(FakeDownloader::producing(&[]), probed());

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;

        assert!(matches!(
            &report.urls[0].result,
            Err(AppError::NoOutputProduced { url }) if url == URL
        ));
        assert!(file_names(h.stage.path()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_file_fails_request_and_is_removed() {
        let h = harness(
            FakeDownloader::producing(&["Good.mp3", "reject.mp3"]),
            probed(),
        );

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;

        assert!(!report.is_success());
        assert_eq!(file_names(h.dest.path()), vec!["Good.mp3"]);
        assert!(file_names(h.stage.path()).is_empty());
    }

    #[tokio::test]
    async fn test_without_prober_warns_and_still_promotes() {
        let h = harness(
            FakeDownloader::producing(&["Song.mp3"]),
            ValidationMode::ExistenceOnly,
        );

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;

        assert!(report.is_success());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.promoted().next().unwrap().verification,
            Verification::ExistenceOnly
        );
        assert_eq!(file_names(h.dest.path()), vec!["Song.mp3"]);
    }

    #[tokio::test]
    async fn test_same_request_twice_never_overwrites() {
        let h = harness(FakeDownloader::producing(&["Song.mp3"]), probed());

        let first = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;
        let second = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), None)
            .await;

        assert!(first.is_success() && second.is_success());
        assert_eq!(
            file_names(h.dest.path()),
            vec!["Song (1).mp3", "Song.mp3"]
        );
        assert!(second.promoted().next().unwrap().conflict.is_some());
    }

    #[tokio::test]
    async fn test_single_item_mode_reaches_downloader() {
        let h = harness(FakeDownloader::producing(&["Only.mp3"]), probed());

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::SingleItem), None)
            .await;

        assert!(report.is_success());
        assert_eq!(h.fake.jobs()[0].playlist, PlaylistMode::SingleItem);
        assert_eq!(report.promoted().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_downloader_fails_each_url() {
        let stage = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let config = AppConfig {
            staging_root: stage.path().to_path_buf(),
            ..AppConfig::default()
        };
        let coordinator = DownloadCoordinator::new(
            DownloadOrchestrator::new(None),
            StagingValidator::new(ValidationMode::ExistenceOnly, &config),
        );

        let request = DownloadRequest::new(
            [URL, "https://youtu.be/dQw4w9WgXcQ"],
            dest.path(),
            Bitrate::default(),
            PlaylistMode::Expand,
        )
        .unwrap();
        let report = coordinator.run(request, None).await;

        assert!(!coordinator.downloader_available());
        assert_eq!(report.urls.len(), 2);
        assert!(report
            .urls
            .iter()
            .all(|u| matches!(u.result, Err(AppError::ToolMissing { .. }))));
        assert!(file_names(stage.path()).is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_forwarded_and_channel_closes() {
        let h = harness(FakeDownloader::producing(&["A.mp3", "B.mp3"]), probed());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let report = h
            .coordinator
            .run(request(h.dest.path(), PlaylistMode::Expand), Some(tx))
            .await;
        assert!(report.is_success());

        let mut titles = Vec::new();
        while let Some(update) = rx.recv().await {
            assert_eq!(update.fraction(), Some(1.0));
            titles.extend(update.title);
        }
        assert_eq!(titles, vec!["A.mp3", "B.mp3"]);
    }
}
