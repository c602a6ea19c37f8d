//! Types for the jobs module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::engine::OutputFormat;

/// Progress value of a job that failed. Terminal.
pub const PROGRESS_FAILED: i32 = -1;
/// Progress value reported as soon as the engine is running.
pub const PROGRESS_STARTED: i32 = 1;
/// Progress value of a job whose artifact is published. Terminal.
pub const PROGRESS_COMPLETE: i32 = 100;

/// Identifier correlating a conversion request with its progress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status derived from a progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn from_progress(progress: i32) -> Self {
        match progress {
            p if p <= PROGRESS_FAILED => Self::Failed,
            0 => Self::Pending,
            p if p >= PROGRESS_COMPLETE => Self::Succeeded,
            _ => Self::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Point-in-time view of a job's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub progress: i32,
    pub status: JobStatus,
}

impl ProgressSnapshot {
    pub fn new(progress: i32) -> Self {
        Self {
            progress,
            status: JobStatus::from_progress(progress),
        }
    }
}

/// Canonical state of one conversion, owned by the registry.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    /// 0-100, or [`PROGRESS_FAILED`].
    pub progress: i32,
    pub input_path: PathBuf,
    pub output_format: OutputFormat,
    pub output_path_working: PathBuf,
    /// Set only once the job has succeeded.
    pub output_path_published: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(
        id: JobId,
        input_path: PathBuf,
        output_format: OutputFormat,
        output_path_working: PathBuf,
    ) -> Self {
        Self {
            id,
            progress: 0,
            input_path,
            output_format,
            output_path_working,
            output_path_published: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_progress(self.progress)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::new(self.progress)
    }
}
