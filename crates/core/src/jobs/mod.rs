//! Conversion jobs.
//!
//! - [`JobRegistry`]: the one shared store of per-job progress.
//! - [`ProgressPublisher`]: per-job progress streams fed by polling the registry.
//! - [`ConversionOrchestrator`]: runs a conversion from upload to artifact.
//! - [`OutputMaterializer`]: copies finished files into the public output store.
//!
//! Progress is an integer: `0` pending, `1..=99` running, `100` succeeded,
//! `-1` failed. The last two are terminal.

mod error;
mod materializer;
mod orchestrator;
mod publisher;
mod reaper;
mod registry;
mod types;

pub use error::{ConversionError, MaterializeError, RegistryError};
pub use materializer::OutputMaterializer;
pub use orchestrator::{
    running_percent, ArtifactStream, ConversionArtifact, ConversionOrchestrator, WorkingDir,
};
pub use publisher::ProgressPublisher;
pub use reaper::spawn_reaper;
pub use registry::JobRegistry;
pub use types::{
    ConversionJob, JobId, JobStatus, ProgressSnapshot, PROGRESS_COMPLETE, PROGRESS_FAILED,
    PROGRESS_STARTED,
};
