pub mod download_coordinator;
pub mod orchestrator;
pub mod staging;

#[cfg(test)]
pub(crate) mod test_support;

pub use download_coordinator::DownloadCoordinator;
pub use orchestrator::DownloadOrchestrator;
pub use staging::{StagingValidator, ValidationMode};
