use std::path::PathBuf;

use super::{AppError, StagedFile, ValidationStatus, Verification};
use crate::utils::format_size;

/// A destination name that was taken, so the file landed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConflict {
    pub requested: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Promotion {
    pub final_path: PathBuf,
    pub size_bytes: u64,
    pub verification: Verification,
    pub conflict: Option<DestinationConflict>,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub staged: StagedFile,
    pub outcome: Result<Promotion, AppError>,
    /// Where a rejected file was moved instead of being deleted.
    pub quarantined: Option<PathBuf>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct UrlReport {
    pub url: String,
    pub result: Result<Vec<FileReport>, AppError>,
}

impl UrlReport {
    pub fn is_success(&self) -> bool {
        match &self.result {
            Ok(files) => files.iter().all(FileReport::is_success),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestReport {
    pub urls: Vec<UrlReport>,
    pub warnings: Vec<String>,
}

impl RequestReport {
    pub fn is_success(&self) -> bool {
        !self.urls.is_empty() && self.urls.iter().all(UrlReport::is_success)
    }

    pub fn promoted(&self) -> impl Iterator<Item = &Promotion> {
        self.urls
            .iter()
            .filter_map(|u| u.result.as_ref().ok())
            .flatten()
            .filter_map(|f| f.outcome.as_ref().ok())
    }

    /// Flatten into lines both interfaces can show.
    pub fn lines(&self) -> Vec<ReportLine> {
        let mut lines: Vec<ReportLine> = self
            .warnings
            .iter()
            .map(|w| ReportLine::warning(w.clone()))
            .collect();

        // Several URLs get a header each so file lines can be told apart.
        let labelled = self.urls.len() > 1;

        for url in &self.urls {
            if labelled {
                lines.push(ReportLine::info(url.url.clone()));
            }

            match &url.result {
                Err(err) => lines.push(ReportLine::failure(err.to_string())),
                Ok(files) => {
                    for file in files {
                        lines.extend(file_lines(file));
                    }
                }
            }
        }

        lines
    }
}

fn file_lines(file: &FileReport) -> Vec<ReportLine> {
    let mut lines = Vec::new();

    match &file.outcome {
        Ok(promotion) => {
            let suffix = match promotion.verification {
                Verification::Probed => "",
                Verification::Decoded => ", decode-checked only",
                Verification::ExistenceOnly => ", not probed",
            };
            lines.push(ReportLine::success(format!(
                "Saved {} ({}{})",
                promotion.final_path.display(),
                format_size(promotion.size_bytes),
                suffix
            )));

            if let Some(conflict) = &promotion.conflict {
                lines.push(ReportLine::warning(format!(
                    "{} already existed, saved under a new name",
                    conflict.requested.display()
                )));
            }
        }
        Err(err) => {
            let text = match &file.staged.status {
                ValidationStatus::Valid(_) => format!(
                    "{} passed validation but was not saved: {}",
                    file.staged.display_name(),
                    err
                ),
                _ => err.to_string(),
            };
            lines.push(ReportLine::failure(text));
            if let Some(q) = &file.quarantined {
                lines.push(ReportLine::warning(format!(
                    "Rejected file kept in {}",
                    q.display()
                )));
            }
        }
    }

    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub severity: Severity,
    pub text: String,
}

impl ReportLine {
    pub fn info(text: String) -> Self {
        Self {
            severity: Severity::Info,
            text,
        }
    }

    pub fn success(text: String) -> Self {
        Self {
            severity: Severity::Success,
            text,
        }
    }

    pub fn warning(text: String) -> Self {
        Self {
            severity: Severity::Warning,
            text,
        }
    }

    pub fn failure(text: String) -> Self {
        Self {
            severity: Severity::Failure,
            text,
        }
    }
}
