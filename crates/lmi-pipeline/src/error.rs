use lmi_collectors::CollectorError;
use thiserror::Error;

/// Setup failures. Runs themselves never fail; their problems are recorded
/// on the returned [`crate::PipelineRun`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to build collectors: {0}")]
    Collectors(#[from] CollectorError),
}
