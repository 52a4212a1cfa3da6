//! Single-shot command-line front end.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    application::DownloadCoordinator,
    config::{default_download_dir, AppConfig, ToolsConfig},
    domain::{Bitrate, DownloadProgress, DownloadRequest, PlaylistMode, RequestReport, Severity},
    tools::Toolchain,
};

/// Exit code for bad arguments, matching clap's own.
const USAGE_EXIT: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "songdown",
    version,
    about = "Download YouTube audio as MP3, validating each file before it is saved"
)]
pub struct Cli {
    /// YouTube video or playlist URLs
    #[arg(value_name = "URL", required_unless_present_any = ["interactive", "check_tools"])]
    pub urls: Vec<String>,

    /// Output directory (default: your downloads folder)
    #[arg(short, long, value_name = "DIR", env = "SONGDOWN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// MP3 bitrate in kbps
    #[arg(
        short,
        long,
        value_name = "BITRATE",
        env = "SONGDOWN_QUALITY",
        default_value = "192",
        value_parser = parse_bitrate
    )]
    pub quality: Bitrate,

    /// Only download the given item, never the whole playlist
    #[arg(long)]
    pub no_playlist: bool,

    /// Open the interactive window instead of downloading
    #[arg(short, long, conflicts_with = "urls")]
    pub interactive: bool,

    /// Show which external tools were found and exit
    #[arg(long, conflicts_with = "urls")]
    pub check_tools: bool,

    /// Directory under which per-download staging folders are created
    #[arg(long, value_name = "DIR", env = "SONGDOWN_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Move rejected files here instead of deleting them
    #[arg(long, value_name = "DIR", env = "SONGDOWN_QUARANTINE_DIR")]
    pub quarantine_dir: Option<PathBuf>,

    /// Leave permissions of saved files as created instead of owner-only
    #[arg(long)]
    pub keep_permissions: bool,

    /// yt-dlp binary
    #[arg(
        long = "yt-dlp",
        value_name = "PATH",
        env = "SONGDOWN_YTDLP",
        default_value = "yt-dlp"
    )]
    pub ytdlp: PathBuf,

    /// ffprobe binary
    #[arg(
        long,
        value_name = "PATH",
        env = "SONGDOWN_FFPROBE",
        default_value = "ffprobe"
    )]
    pub ffprobe: PathBuf,

    /// ffmpeg binary
    #[arg(long, value_name = "PATH", env = "SONGDOWN_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_bitrate(raw: &str) -> Result<Bitrate, String> {
    raw.parse::<Bitrate>().map_err(|e| e.to_string())
}

impl Cli {
    pub fn to_config(&self) -> AppConfig {
        let defaults = AppConfig::default();

        AppConfig {
            output_dir: self.output.clone().unwrap_or_else(default_download_dir),
            quality: self.quality,
            playlist: PlaylistMode::from_no_playlist(self.no_playlist),
            staging_root: self.staging_dir.clone().unwrap_or(defaults.staging_root),
            quarantine_dir: self.quarantine_dir.clone(),
            restrict_permissions: !self.keep_permissions,
            tools: ToolsConfig {
                ytdlp: self.ytdlp.clone(),
                ffprobe: self.ffprobe.clone(),
                ffmpeg: self.ffmpeg.clone(),
            },
            ..defaults
        }
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "songdown=info",
            1 => "songdown=debug",
            _ => "songdown=trace",
        }
    }
}

/// Print the availability of every external tool.
pub async fn check_tools(toolchain: &Toolchain) -> ExitCode {
    for status in toolchain.status().await {
        if !status.is_available() {
            println!("{:<8} not found", status.name);
            continue;
        }

        let location = status
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match &status.version {
            Some(version) => println!("{:<8} {} ({})", status.name, version, location),
            None => println!("{:<8} found ({})", status.name, location),
        }
    }

    if toolchain.downloader.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Download every URL given on the command line and print the outcome.
pub async fn run_once(cli: &Cli, config: &AppConfig, toolchain: &Toolchain) -> ExitCode {
    let request = match DownloadRequest::new(
        &cli.urls,
        &config.output_dir,
        config.quality,
        config.playlist,
    ) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(USAGE_EXIT);
        }
    };

    let coordinator = DownloadCoordinator::from_config(config, toolchain);

    println!("Output directory: {}", request.output_dir().display());
    info!(urls = request.urls().len(), quality = %request.quality(), "starting");

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(progress_rx));

    let report = coordinator.run(request, Some(progress_tx)).await;
    if let Err(e) = printer.await {
        debug!(%e, "progress printer stopped");
    }

    print_report(&report);
    exit_code(&report)
}

/// Print download progress to stderr, once per whole percent and file.
async fn print_progress(mut updates: mpsc::UnboundedReceiver<DownloadProgress>) {
    let mut last: Option<(Option<String>, Option<u32>)> = None;

    while let Some(update) = updates.recv().await {
        let key = (update.title.clone(), update.percent());
        if last.as_ref() == Some(&key) {
            continue;
        }
        eprintln!("downloading {}", update);
        last = Some(key);
    }
}

fn print_report(report: &RequestReport) {
    for line in report.lines() {
        match line.severity {
            Severity::Info => println!("{}:", line.text),
            Severity::Success => println!("{}", line.text),
            Severity::Warning => eprintln!("warning: {}", line.text),
            Severity::Failure => eprintln!("error: {}", line.text),
        }
    }
}

pub fn exit_code(report: &RequestReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
