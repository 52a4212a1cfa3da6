pub mod error;
pub mod model;
pub mod report;

pub use error::{AppError, FailureKind};
pub use model::{
    Bitrate, DownloadProgress, DownloadRequest, PlaylistMode, ProgressSender, StagedFile,
    ValidationStatus, Verification,
};
pub use report::{
    DestinationConflict, FileReport, Promotion, ReportLine, RequestReport, Severity, UrlReport,
};
