//! Error types for the jobs module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::JobId;

/// Errors from the job registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job has not succeeded: {0}")]
    NotSucceeded(JobId),
}

/// Errors publishing a finished artifact to the output store.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The engine's output is not where it should be.
    #[error("Working file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Invalid output file name: {name}")]
    InvalidFileName { name: String },

    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from a conversion request.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No output format was supplied.
    #[error("No output format specified")]
    MissingFormat,

    /// The output format is not on the allow-list.
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// The engine failed to start or reported a failure.
    #[error("{message}")]
    Engine { job_id: JobId, message: String },

    /// The job exceeded its maximum duration and was killed.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { job_id: JobId, timeout_secs: u64 },

    /// The artifact could not be published.
    #[error("{source}")]
    Materialize {
        job_id: JobId,
        #[source]
        source: MaterializeError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to open converted file: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Whether the request was rejected before any job was created.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingFormat | Self::UnsupportedFormat(_))
    }

    /// Whether the external work (engine or publishing) failed.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            Self::Engine { .. } | Self::Timeout { .. } | Self::Materialize { .. }
        )
    }

    /// The job this error belongs to, if one was created.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Engine { job_id, .. }
            | Self::Timeout { job_id, .. }
            | Self::Materialize { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}
