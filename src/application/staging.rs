use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    domain::{
        AppError, DestinationConflict, FileReport, Promotion, StagedFile, ValidationStatus,
        Verification,
    },
    tools::{AudioProber, FfmpegDecoder, Ffprobe, ProbeVerdict, Toolchain},
    utils::{candidate_paths, sanitize_filename},
};

/// Upper bound on `name (n).mp3` attempts before giving up.
const MAX_NAME_ATTEMPTS: usize = 10_000;

pub const REDUCED_VALIDATION_WARNING: &str =
    "ffprobe and ffmpeg not found: files are only checked for existence and size, not decoded";

pub const DECODE_ONLY_WARNING: &str =
    "ffprobe not found: files are decoded with ffmpeg but their MP3 container is not confirmed";

/// How produced files are checked. Chosen once at startup.
#[derive(Clone)]
pub enum ValidationMode {
    Full {
        prober: Arc<dyn AudioProber>,
        /// Consulted only when `prober` cannot reach a verdict.
        fallback: Option<Arc<dyn AudioProber>>,
    },
    /// No prober, but a full decode still catches broken files.
    DecodeOnly { decoder: Arc<dyn AudioProber> },
    ExistenceOnly,
}

impl ValidationMode {
    pub fn detect(toolchain: &Toolchain, config: &AppConfig) -> Self {
        let decoder = toolchain.decoder.as_ref().map(|ffmpeg| {
            Arc::new(FfmpegDecoder::new(ffmpeg.clone(), config.decode_timeout))
                as Arc<dyn AudioProber>
        });

        match (&toolchain.prober, decoder) {
            (Some(ffprobe), fallback) => Self::Full {
                prober: Arc::new(Ffprobe::new(ffprobe.clone(), config.probe_timeout)),
                fallback,
            },
            (None, Some(decoder)) => {
                warn!("{}", DECODE_ONLY_WARNING);
                Self::DecodeOnly { decoder }
            }
            (None, None) => {
                warn!("{}", REDUCED_VALIDATION_WARNING);
                Self::ExistenceOnly
            }
        }
    }

    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Self::Full { .. } => None,
            Self::DecodeOnly { .. } => Some(DECODE_ONLY_WARNING),
            Self::ExistenceOnly => Some(REDUCED_VALIDATION_WARNING),
        }
    }
}

impl fmt::Debug for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full { prober, fallback } => f
                .debug_struct("Full")
                .field("prober", &prober.name())
                .field("fallback", &fallback.as_ref().map(|p| p.name()))
                .finish(),
            Self::DecodeOnly { decoder } => f
                .debug_struct("DecodeOnly")
                .field("decoder", &decoder.name())
                .finish(),
            Self::ExistenceOnly => write!(f, "ExistenceOnly"),
        }
    }
}

/// Keeps downloads out of the destination until they have been checked.
pub struct StagingValidator {
    mode: ValidationMode,
    staging_root: PathBuf,
    quarantine_dir: Option<PathBuf>,
    restrict_permissions: bool,
}

impl StagingValidator {
    pub fn new(mode: ValidationMode, config: &AppConfig) -> Self {
        Self {
            mode,
            staging_root: config.staging_root.clone(),
            quarantine_dir: config.quarantine_dir.clone(),
            restrict_permissions: config.restrict_permissions,
        }
    }

    pub fn mode(&self) -> &ValidationMode {
        &self.mode
    }

    /// A fresh directory for one download; removed when the handle drops.
    pub fn open_staging(&self) -> Result<TempDir, AppError> {
        std::fs::create_dir_all(&self.staging_root)
            .map_err(|e| AppError::io("creating staging root", e))?;

        tempfile::Builder::new()
            .prefix("songdown-")
            .tempdir_in(&self.staging_root)
            .map_err(|e| AppError::io("creating staging directory", e))
    }

    /// Check one staged file. `Err` carries the reason it was rejected.
    pub async fn validate(&self, path: &Path) -> Result<Verification, String> {
        check_exists_non_empty(path).await?;

        let (prober, fallback) = match &self.mode {
            ValidationMode::ExistenceOnly => return Ok(Verification::ExistenceOnly),
            ValidationMode::DecodeOnly { decoder } => {
                return match decoder.probe(path).await {
                    Ok(ProbeVerdict::Valid) => Ok(Verification::Decoded),
                    Ok(ProbeVerdict::Invalid(reason)) => Err(reason),
                    Err(err) => Err(format!("could not verify: {}", err)),
                };
            }
            ValidationMode::Full { prober, fallback } => (prober, fallback),
        };

        let unverifiable = match prober.probe(path).await {
            Ok(ProbeVerdict::Valid) => return Ok(Verification::Probed),
            Ok(ProbeVerdict::Invalid(reason)) => return Err(reason),
            Err(err) => err,
        };

        warn!(file = %path.display(), %unverifiable, "probe could not reach a verdict");

        let Some(decoder) = fallback else {
            return Err(format!("could not verify: {}", unverifiable));
        };

        match decoder.probe(path).await {
            Ok(ProbeVerdict::Valid) => {
                info!(file = %path.display(), tool = decoder.name(), "accepted after full decode");
                Ok(Verification::Decoded)
            }
            Ok(ProbeVerdict::Invalid(reason)) => Err(reason),
            Err(err) => Err(format!("could not verify: {}; {}", unverifiable, err)),
        }
    }

    /// Validate every produced file and promote or discard it.
    pub async fn settle(&self, produced: Vec<PathBuf>, destination: &Path) -> Vec<FileReport> {
        let mut reports = Vec::with_capacity(produced.len());

        for temp_path in produced {
            let stem = temp_path
                .file_stem()
                .map(|s| sanitize_filename(&s.to_string_lossy()))
                .unwrap_or_else(|| sanitize_filename(""));
            let intended = destination.join(format!("{}.mp3", stem));

            let mut staged = StagedFile::new(temp_path, intended);
            let verdict = self.validate(&staged.temp_path).await;
            staged.status = match &verdict {
                Ok(verification) => ValidationStatus::Valid(*verification),
                Err(reason) => ValidationStatus::Invalid(reason.clone()),
            };

            let report = match verdict {
                Ok(verification) => {
                    let outcome = self
                        .promote(&staged.temp_path, destination, &stem)
                        .await
                        .map(|(final_path, size_bytes, conflict)| Promotion {
                            final_path,
                            size_bytes,
                            verification,
                            conflict,
                        });
                    FileReport {
                        staged,
                        outcome,
                        quarantined: None,
                    }
                }
                Err(reason) => {
                    warn!(file = %staged.temp_path.display(), %reason, "rejecting staged file");
                    let quarantined = self.discard(&staged.temp_path, &stem).await;
                    FileReport {
                        outcome: Err(AppError::ValidationFailure {
                            file: PathBuf::from(staged.display_name()),
                            reason,
                        }),
                        staged,
                        quarantined,
                    }
                }
            };

            reports.push(report);
        }

        reports
    }

    async fn promote(
        &self,
        source: &Path,
        destination: &Path,
        stem: &str,
    ) -> Result<(PathBuf, u64, Option<DestinationConflict>), AppError> {
        let size_bytes = tokio::fs::metadata(source)
            .await
            .map_err(|e| AppError::io("reading staged file", e))?
            .len();

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|e| AppError::io("creating destination directory", e))?;

        let (final_path, attempt) = place_unique(source, destination, stem)
            .await
            .map_err(|e| AppError::io("promoting file", e))?;

        if self.restrict_permissions {
            restrict_to_owner(&final_path).await;
        }

        let conflict = (attempt > 0).then(|| DestinationConflict {
            requested: destination.join(format!("{}.mp3", stem)),
        });

        match &conflict {
            Some(c) => info!(
                requested = %c.requested.display(),
                saved = %final_path.display(),
                "destination taken, saved under a new name"
            ),
            None => info!(saved = %final_path.display(), "promoted"),
        }

        Ok((final_path, size_bytes, conflict))
    }

    /// Delete a rejected file, or move it to quarantine when configured.
    async fn discard(&self, path: &Path, stem: &str) -> Option<PathBuf> {
        if let Some(dir) = &self.quarantine_dir {
            let moved = match tokio::fs::create_dir_all(dir).await {
                Ok(()) => place_unique(path, dir, stem).await,
                Err(e) => Err(e),
            };
            match moved {
                Ok((quarantined, _)) => {
                    info!(file = %quarantined.display(), "quarantined rejected file");
                    return Some(quarantined);
                }
                Err(e) => warn!(dir = %dir.display(), %e, "quarantine failed, deleting instead"),
            }
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            // The staging directory is removed afterwards regardless.
            debug!(file = %path.display(), %e, "could not delete rejected file");
        }
        None
    }
}

async fn check_exists_non_empty(path: &Path) -> Result<(), String> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| format!("cannot read file: {}", e))?;

    if !meta.is_file() {
        return Err("not a regular file".to_string());
    }
    if meta.len() == 0 {
        return Err("file is empty".to_string());
    }
    Ok(())
}

/// Move `source` into `dir` under the first free `stem[ (n)].mp3` name.
/// Returns the path and how many names were taken before it.
async fn place_unique(source: &Path, dir: &Path, stem: &str) -> io::Result<(PathBuf, usize)> {
    for (attempt, candidate) in candidate_paths(dir, stem, "mp3")
        .take(MAX_NAME_ATTEMPTS)
        .enumerate()
    {
        match move_no_clobber(source, &candidate).await {
            Ok(()) => return Ok((candidate, attempt)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {:?} in {}", stem, dir.display()),
    ))
}

/// Link then unlink, which is atomic and never overwrites. Falls back to an
/// exclusive-create copy across filesystems.
async fn move_no_clobber(source: &Path, target: &Path) -> io::Result<()> {
    match tokio::fs::hard_link(source, target).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            debug!(%e, "hard link unavailable, copying");
            copy_no_clobber(source, target).await?;
        }
    }

    if let Err(e) = tokio::fs::remove_file(source).await {
        warn!(file = %source.display(), %e, "promoted file left behind in staging");
    }
    Ok(())
}

async fn copy_no_clobber(source: &Path, target: &Path) -> io::Result<()> {
    let mut output = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await?;

    let copied = async {
        let mut input = tokio::fs::File::open(source).await?;
        tokio::io::copy(&mut input, &mut output).await?;
        output.flush().await?;
        output.sync_all().await
    }
    .await;

    if let Err(e) = copied {
        if let Err(cleanup) = tokio::fs::remove_file(target).await {
            debug!(file = %target.display(), %cleanup, "could not remove partial copy");
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
    {
        warn!(file = %path.display(), %e, "could not restrict permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) {}
