//! In-process stand-ins for yt-dlp and ffprobe, plus shell-script stand-ins
//! for tests that spawn real processes.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{DownloadProgress, ProgressSender};
use crate::tools::{AudioProber, FetchJob, MediaDownloader, ProbeVerdict, Result, ToolError};

/// Writes a fixed set of files into the staging directory of every job.
pub struct FakeDownloader {
    files: Vec<(String, Vec<u8>)>,
    failure: Option<String>,
    jobs: Mutex<Vec<FetchJob>>,
}

impl FakeDownloader {
    pub fn producing(names: &[&str]) -> Self {
        Self::with_contents(names.iter().map(|n| (*n, b"ID3fake-audio".as_slice())))
    }

    pub fn with_contents<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(n, c)| (n.to_string(), c.to_vec()))
                .collect(),
            failure: None,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            files: Vec::new(),
            failure: Some(stderr.to_string()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn jobs(&self) -> Vec<FetchJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    fn name(&self) -> &'static str {
        "fake-yt-dlp"
    }

    async fn fetch(
        &self,
        job: &FetchJob,
        progress: Option<&ProgressSender>,
    ) -> Result<Vec<PathBuf>> {
        self.jobs.lock().unwrap().push(job.clone());

        if let Some(stderr) = &self.failure {
            return Err(ToolError::Failed {
                tool: self.name().to_string(),
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }

        let mut produced = Vec::new();
        for (name, contents) in &self.files {
            if let Some(tx) = progress {
                let _ = tx.send(DownloadProgress {
                    title: Some(name.clone()),
                    downloaded_bytes: contents.len() as u64,
                    total_bytes: Some(contents.len() as u64),
                });
            }
            let path = job.staging_dir.join(name);
            std::fs::write(&path, contents).unwrap();
            produced.push(path);
        }
        Ok(produced)
    }
}

/// Rejects any file whose name contains `reject`, and cannot run on names containing `hang`.
pub struct FakeProber;

#[async_trait]
impl AudioProber for FakeProber {
    fn name(&self) -> &'static str {
        "fake-ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeVerdict> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        if name.contains("hang") {
            return Err(ToolError::TimedOut {
                tool: self.name().to_string(),
                timeout: std::time::Duration::from_secs(15),
            });
        }

        if name.contains("reject") {
            return Ok(ProbeVerdict::Invalid("expected mp3, found format \"webm\"".to_string()));
        }

        Ok(ProbeVerdict::Valid)
    }
}

/// Always answers with the same verdict.
pub struct FixedProber(pub ProbeVerdict);

#[async_trait]
impl AudioProber for FixedProber {
    fn name(&self) -> &'static str {
        "fixed-prober"
    }

    async fn probe(&self, _path: &Path) -> Result<ProbeVerdict> {
        Ok(self.0.clone())
    }
}

/// Names of the regular files directly inside `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// An executable `/bin/sh` script standing in for an external tool.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
