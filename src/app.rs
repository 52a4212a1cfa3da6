use crate::application::DownloadCoordinator;
use crate::config::AppConfig;
use crate::domain::{DownloadProgress, ReportLine, RequestReport};
use crate::ui::{DownloadMessage, DownloadView};
use iced::Task;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
}

impl DownloadApp {
    pub fn new(config: AppConfig, coordinator: DownloadCoordinator) -> Self {
        let mut view = DownloadView::new(&config);

        if !coordinator.downloader_available() {
            view.results.push(ReportLine::failure(
                "yt-dlp was not found; downloads will fail until it is installed".to_string(),
            ));
        }
        if let Some(warning) = coordinator.validation_warning() {
            view.results.push(ReportLine::warning(warning.to_string()));
        }

        Self { view, coordinator }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Folder chosen in the picker, `None` if cancelled
    DestinationSelected(Option<PathBuf>),
    /// Progress of the file currently being fetched
    DownloadProgress(DownloadProgress),
    /// Final report after every file was validated and promoted or rejected
    DownloadCompleted(RequestReport),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::BrowsePressed => {
                    let start = PathBuf::from(app.view.destination.trim());

                    return Task::perform(
                        async move {
                            rfd::AsyncFileDialog::new()
                                .set_directory(&start)
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::DestinationSelected,
                    );
                }
                DownloadMessage::DownloadPressed if !app.view.is_downloading => {
                    match app.view.request() {
                        Ok(request) => {
                            let coordinator = app.coordinator.clone();
                            let label = crate::utils::extract_video_id(&app.view.youtube_url)
                                .unwrap_or_else(|| app.view.youtube_url.trim().to_string());

                            info!(url = %app.view.youtube_url, "interactive download requested");
                            app.view.is_downloading = true;
                            app.view.download_progress = 0.0;
                            app.view.results.clear();
                            app.view.status_message = format!("Downloading {}...", label);

                            // The coordinator drops the sender when it returns, which ends
                            // the progress stream.
                            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
                            let progress = futures::stream::unfold(progress_rx, |mut rx| async move {
                                rx.recv()
                                    .await
                                    .map(|update| (Message::DownloadProgress(update), rx))
                            });

                            // Runs on iced's tokio executor; the window stays responsive.
                            return Task::batch([
                                Task::stream(progress),
                                Task::perform(
                                    async move { coordinator.run(request, Some(progress_tx)).await },
                                    Message::DownloadCompleted,
                                ),
                            ]);
                        }
                        Err(e) => {
                            app.view.status_message = e.to_string();
                        }
                    }
                }
                _ => {}
            }
        }
        Message::DestinationSelected(path_opt) => {
            if let Some(path) = path_opt {
                app.view.destination = path.display().to_string();
            }
        }
        Message::DownloadProgress(update) => {
            // Late updates can arrive after the report.
            if app.view.is_downloading {
                app.view.download_progress = update.fraction().unwrap_or(0.0);
                app.view.status_message = format!("Downloading {}", update);
            }
        }
        Message::DownloadCompleted(report) => {
            app.view.is_downloading = false;
            app.view.download_progress = 0.0;

            let saved = report.promoted().count();
            app.view.status_message = if report.is_success() {
                format!("Done: {} file(s) saved", saved)
            } else {
                format!("Finished with errors: {} file(s) saved", saved)
            };
            app.view.results = report.lines();
        }
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
