use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::models::FetchJob;
use super::{run_tool_streaming, MediaDownloader, Result, ToolError};
use crate::domain::{DownloadProgress, PlaylistMode, ProgressSender};

const TOOL: &str = "yt-dlp";

/// Prefix of the progress lines requested through `--progress-template`.
const PROGRESS_MARKER: &str = "songdown-progress";

/// Downloaded bytes, total (or estimate) and title, space separated. The
/// title goes last because it may contain spaces.
const PROGRESS_TEMPLATE: &str = "download:songdown-progress \
%(progress.downloaded_bytes)s \
%(progress.total_bytes,progress.total_bytes_estimate)s \
%(info.title)s";

/// yt-dlp driven as a subprocess, extracting audio to MP3.
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    pub fn build_args(job: &FetchJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--format",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        args.push(job.quality.as_audio_quality().into());
        args.push("--output".into());
        args.push(job.output_template.clone().into());

        match job.playlist {
            PlaylistMode::Expand => args.push("--yes-playlist".into()),
            PlaylistMode::SingleItem => {
                args.push("--no-playlist".into());
                args.push("--playlist-items".into());
                args.push("1".into());
            }
        }

        for flag in [
            "--print",
            "after_move:filepath",
            "--no-simulate",
            "--progress",
            "--newline",
            "--progress-template",
            PROGRESS_TEMPLATE,
            "--",
        ] {
            args.push(flag.into());
        }

        args.push(job.url.clone().into());
        args
    }
}

#[async_trait]
impl MediaDownloader for YtDlp {
    fn name(&self) -> &'static str {
        TOOL
    }

    async fn fetch(
        &self,
        job: &FetchJob,
        progress: Option<&ProgressSender>,
    ) -> Result<Vec<PathBuf>> {
        let mut command = Command::new(&self.binary);
        command.args(Self::build_args(job));

        info!(url = %job.url, quality = %job.quality, playlist = ?job.playlist, "invoking yt-dlp");
        let output = run_tool_streaming(TOOL, command, |line| {
            if !line.trim_start().starts_with(PROGRESS_MARKER) {
                return false;
            }
            if let (Some(update), Some(tx)) = (parse_progress(line), progress) {
                // The receiver may already be gone; progress is best effort.
                let _ = tx.send(update);
            }
            true
        })
        .await?
        .into_success(TOOL)?;

        let reported = reported_paths(&output.stdout.join("\n"), &job.staging_dir);
        debug!(count = reported.len(), "yt-dlp reported files");

        let produced = merge_with_staged_mp3s(reported, &job.staging_dir).await?;
        Ok(produced)
    }
}

/// Parse one line produced by [`PROGRESS_TEMPLATE`]. yt-dlp prints `NA`
/// for fields it does not know.
pub fn parse_progress(line: &str) -> Option<DownloadProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?.trim_start();
    let mut fields = rest.splitn(3, ' ');

    let downloaded_bytes = parse_byte_count(fields.next()?)?;
    let total_bytes = fields.next().and_then(parse_byte_count);
    let title = fields
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "NA")
        .map(str::to_string);

    Some(DownloadProgress {
        title,
        downloaded_bytes,
        total_bytes,
    })
}

fn parse_byte_count(raw: &str) -> Option<u64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

/// Paths printed by `--print after_move:filepath` that live in the staging directory.
pub fn reported_paths(stdout: &str, staging_dir: &Path) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .filter(|path| path.starts_with(staging_dir))
        .collect()
}

async fn merge_with_staged_mp3s(reported: Vec<PathBuf>, staging_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found: BTreeSet<PathBuf> = BTreeSet::new();

    for path in reported {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            found.insert(path);
        }
    }

    let mut entries = tokio::fs::read_dir(staging_dir)
        .await
        .map_err(|e| staging_unreadable(staging_dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| staging_unreadable(staging_dir, e))?
    {
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if is_mp3 {
            found.insert(path);
        }
    }

    Ok(found.into_iter().collect())
}

fn staging_unreadable(dir: &Path, err: std::io::Error) -> ToolError {
    ToolError::InvalidOutput {
        tool: TOOL.to_string(),
        detail: format!("cannot list {}: {}", dir.display(), err),
    }
}
