use iced::{
    widget::{
        button, column, pick_list, progress_bar, row, scrollable, text, text_input, Column, Space,
    },
    Color, Element, Length,
};

use crate::{
    config::AppConfig,
    domain::{AppError, Bitrate, DownloadRequest, PlaylistMode, ReportLine, Severity},
    utils::expand_home,
};

/// Main view state
pub struct DownloadView {
    pub youtube_url: String,
    pub destination: String,
    pub quality: Bitrate,
    pub playlist: PlaylistMode,
    pub status_message: String,
    pub is_downloading: bool,
    /// Share of the current file fetched, 0.0 to 1.0
    pub download_progress: f32,
    pub results: Vec<ReportLine>,
}

impl DownloadView {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            youtube_url: String::new(),
            destination: config.output_dir.display().to_string(),
            quality: config.quality,
            playlist: config.playlist,
            status_message: "Paste a YouTube link to download".to_string(),
            is_downloading: false,
            download_progress: 0.0,
            results: Vec::new(),
        }
    }

    /// The request described by the current form contents.
    pub fn request(&self) -> Result<DownloadRequest, AppError> {
        DownloadRequest::new(
            [self.youtube_url.as_str()],
            expand_home(self.destination.trim()),
            self.quality,
            self.playlist,
        )
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    DestinationChanged(String),
    DesktopPressed,
    BrowsePressed,
    QualitySelected(Bitrate),
    PlaylistSelected(PlaylistMode),
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.youtube_url = url;
            }
            DownloadMessage::DestinationChanged(dir) => {
                self.destination = dir;
            }
            DownloadMessage::DesktopPressed => {
                if let Some(desktop) = dirs::desktop_dir() {
                    self.destination = desktop.display().to_string();
                }
            }
            DownloadMessage::QualitySelected(quality) => {
                self.quality = quality;
            }
            DownloadMessage::PlaylistSelected(playlist) => {
                self.playlist = playlist;
            }
            DownloadMessage::BrowsePressed | DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let idle = !self.is_downloading;

        let settings = row![
            column![
                text("Quality:").size(16),
                pick_list(
                    Bitrate::PRESETS,
                    Some(self.quality),
                    DownloadMessage::QualitySelected
                ),
            ]
            .spacing(6),
            column![
                text("Playlists:").size(16),
                pick_list(
                    PlaylistMode::ALL,
                    Some(self.playlist),
                    DownloadMessage::PlaylistSelected
                ),
            ]
            .spacing(6),
        ]
        .spacing(20);

        let results = Column::with_children(self.results.iter().map(result_line)).spacing(4);

        column![
            text("SongDown")
                .size(32)
                .color(Color::from_rgb8(0x96, 0x4B, 0xC2)),
            text("YouTube to MP3, checked before it is saved").size(14),
            Space::new().height(Length::Fixed(20.0)),
            text("Video or playlist URL:").size(16),
            text_input("https://www.youtube.com/watch?v=...", &self.youtube_url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            text("Save to:").size(16),
            row![
                text_input("Destination folder", &self.destination)
                    .on_input(DownloadMessage::DestinationChanged)
                    .padding(10),
                button("Desktop")
                    .on_press_maybe(idle.then_some(DownloadMessage::DesktopPressed))
                    .padding([10, 16]),
                button("Browse...")
                    .on_press_maybe(idle.then_some(DownloadMessage::BrowsePressed))
                    .padding([10, 16]),
            ]
            .spacing(10),
            settings,
            Space::new().height(Length::Fixed(10.0)),
            button("Download MP3")
                .on_press_maybe(idle.then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            text(&self.status_message).size(14),
            progress_bar(0.0..=1.0, self.download_progress),
            scrollable(results).height(Length::Fill),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}

fn result_line(line: &ReportLine) -> Element<'_, DownloadMessage> {
    let color = match line.severity {
        Severity::Info => Color::from_rgb8(0x70, 0x70, 0x70),
        Severity::Success => Color::from_rgb8(0x2E, 0x9E, 0x5B),
        Severity::Warning => Color::from_rgb8(0xD9, 0x8E, 0x04),
        Severity::Failure => Color::from_rgb8(0xD6, 0x3B, 0x3B),
    };
    text(&line.text).size(14).color(color).into()
}
