//! Transcode orchestrator.
//!
//! Owns one conversion from upload to published artifact: creates the job,
//! drives the engine, mirrors its events into the registry, publishes the
//! output and hands back a stream of the converted bytes.

use bytes::Bytes;
use futures::Stream;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use super::error::ConversionError;
use super::materializer::OutputMaterializer;
use super::registry::JobRegistry;
use super::types::{ConversionJob, JobId, PROGRESS_COMPLETE, PROGRESS_FAILED, PROGRESS_STARTED};
use crate::engine::{EngineEvent, OutputFormat, TranscodeEngine, TranscodeRequest};
use crate::metrics::{CONVERSIONS_TOTAL, CONVERSION_DURATION};
use crate::upload::UploadedFile;

/// Default ceiling on a single engine run.
const DEFAULT_MAX_JOB_DURATION: Duration = Duration::from_secs(3600);

/// Runs conversions against a [`TranscodeEngine`].
pub struct ConversionOrchestrator {
    registry: Arc<JobRegistry>,
    engine: Arc<dyn TranscodeEngine>,
    materializer: OutputMaterializer,
    working_dir: PathBuf,
    allowed_formats: HashSet<OutputFormat>,
    max_job_duration: Duration,
}

impl ConversionOrchestrator {
    /// Creates an orchestrator accepting every known output format.
    pub fn new(
        registry: Arc<JobRegistry>,
        engine: Arc<dyn TranscodeEngine>,
        materializer: OutputMaterializer,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            engine,
            materializer,
            working_dir: working_dir.into(),
            allowed_formats: OutputFormat::ALL.into_iter().collect(),
            max_job_duration: DEFAULT_MAX_JOB_DURATION,
        }
    }

    /// Restricts accepted output formats.
    pub fn with_allowed_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.allowed_formats = formats.into_iter().collect();
        self
    }

    /// Sets how long an engine run may take before it is killed.
    pub fn with_max_job_duration(mut self, duration: Duration) -> Self {
        self.max_job_duration = duration;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<dyn TranscodeEngine> {
        &self.engine
    }

    pub fn materializer(&self) -> &OutputMaterializer {
        &self.materializer
    }

    /// Checks a client-supplied format identifier against the allow-list.
    pub fn parse_format(&self, raw: &str) -> Result<OutputFormat, ConversionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConversionError::MissingFormat);
        }

        let format: OutputFormat = raw
            .parse()
            .map_err(|_| ConversionError::UnsupportedFormat(raw.to_string()))?;

        if !self.allowed_formats.contains(&format) {
            return Err(ConversionError::UnsupportedFormat(raw.to_string()));
        }

        Ok(format)
    }

    /// Converts an uploaded file and returns the finished artifact.
    ///
    /// The upload is consumed and removed once this returns. If the returned
    /// future is dropped before completion, the engine is killed, the job's
    /// working files are removed and its registry entry is deleted.
    pub async fn convert(
        &self,
        upload: UploadedFile,
        output_format: &str,
    ) -> Result<ConversionArtifact, ConversionError> {
        let format = self.parse_format(output_format)?;
        let job_id = JobId::new();
        let started_at = Instant::now();

        let filename = format!("{}_converted.{}", upload.file_stem(), format.extension());
        let working_dir = WorkingDir::create(self.working_dir.join(job_id.to_string())).await?;
        let working_path = working_dir.path().join(&filename);

        self.registry.create(ConversionJob::new(
            job_id,
            upload.path().to_path_buf(),
            format,
            working_path.clone(),
        ))?;
        let job = JobGuard::new(Arc::clone(&self.registry), job_id);

        info!(
            job_id = %job_id,
            input = %upload.original_name(),
            format = %format,
            "Starting conversion"
        );

        let request = TranscodeRequest {
            job_id: job_id.to_string(),
            input_path: upload.path().to_path_buf(),
            output_path: working_path.clone(),
            format,
        };

        if let Err(e) = self.run_engine(job_id, request).await {
            self.fail(job, &e, started_at);
            return Err(e);
        }

        // The input is no longer needed once the engine is done with it
        drop(upload);

        // Nothing reports complete until the artifact can be handed back
        let (file, size_bytes) = match open_artifact(&working_path).await {
            Ok(opened) => opened,
            Err(e) => {
                let e = ConversionError::from(e);
                self.fail(job, &e, started_at);
                return Err(e);
            }
        };

        let published_path = match self
            .materializer
            .publish(&job_id, &working_path, &filename)
            .await
        {
            Ok(path) => path,
            Err(source) => {
                let e = ConversionError::Materialize { job_id, source };
                self.fail(job, &e, started_at);
                return Err(e);
            }
        };

        self.registry.set_progress(&job_id, PROGRESS_COMPLETE);
        if let Err(e) = self
            .registry
            .mark_published(&job_id, published_path.clone())
        {
            // The entry may already have been consumed by a progress stream
            debug!(job_id = %job_id, error = %e, "Could not record published path");
        }
        job.settle();

        let elapsed = started_at.elapsed();
        CONVERSIONS_TOTAL.with_label_values(&["succeeded"]).inc();
        CONVERSION_DURATION
            .with_label_values(&["succeeded"])
            .observe(elapsed.as_secs_f64());
        info!(
            job_id = %job_id,
            output = %filename,
            size_bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "Conversion finished"
        );

        Ok(ConversionArtifact {
            job_id,
            filename,
            published_path,
            size_bytes,
            file,
            working_dir,
        })
    }

    /// Drives the engine to a terminal event, mirroring progress into the registry.
    async fn run_engine(
        &self,
        job_id: JobId,
        request: TranscodeRequest,
    ) -> Result<(), ConversionError> {
        let mut handle =
            self.engine
                .start(request)
                .await
                .map_err(|e| ConversionError::Engine {
                    job_id,
                    message: e.to_string(),
                })?;

        let deadline = tokio::time::Instant::now() + self.max_job_duration;

        loop {
            let next = tokio::time::timeout_at(deadline, handle.next_event()).await;
            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => {
                    return Err(ConversionError::Engine {
                        job_id,
                        message: format!("{} exited without reporting a result", self.engine.name()),
                    });
                }
                Err(_) => {
                    // Dropping the handle kills the engine
                    handle.cancel();
                    return Err(ConversionError::Timeout {
                        job_id,
                        timeout_secs: self.max_job_duration.as_secs(),
                    });
                }
            };

            match event {
                EngineEvent::Started => {
                    debug!(job_id = %job_id, "Engine started");
                    self.registry.set_progress(&job_id, PROGRESS_STARTED);
                }
                EngineEvent::Progress { percent } => {
                    self.registry.set_progress(&job_id, running_percent(percent));
                }
                EngineEvent::Finished => return Ok(()),
                EngineEvent::Failed { message } => {
                    return Err(ConversionError::Engine { job_id, message });
                }
            }
        }
    }

    /// Marks the job failed and leaves it for its progress stream to consume.
    fn fail(&self, job: JobGuard, e: &ConversionError, started_at: Instant) {
        let job_id = job.id;
        self.registry.set_progress(&job_id, PROGRESS_FAILED);
        job.settle();

        let result = match e {
            ConversionError::Timeout { .. } => "timed_out",
            _ => "failed",
        };
        CONVERSIONS_TOTAL.with_label_values(&[result]).inc();
        CONVERSION_DURATION
            .with_label_values(&[result])
            .observe(started_at.elapsed().as_secs_f64());

        error!(job_id = %job_id, error = %e, "Conversion failed");
    }
}

async fn open_artifact(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path).await?;
    let size_bytes = file.metadata().await?.len();
    Ok((file, size_bytes))
}

/// Maps an engine percentage onto the registry's running range.
///
/// 0 is reserved for "not started" and 100 for "published", so a running job
/// always reports 1..=99.
pub fn running_percent(percent: f32) -> i32 {
    if !percent.is_finite() {
        return PROGRESS_STARTED;
    }
    (percent.round() as i32).clamp(PROGRESS_STARTED, PROGRESS_COMPLETE - 1)
}

/// Deletes the registry entry of a conversion that never settled.
struct JobGuard {
    registry: Arc<JobRegistry>,
    id: JobId,
    settled: bool,
}

impl JobGuard {
    fn new(registry: Arc<JobRegistry>, id: JobId) -> Self {
        Self {
            registry,
            id,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.delete(&self.id);
            CONVERSIONS_TOTAL.with_label_values(&["cancelled"]).inc();
            warn!(job_id = %self.id, "Conversion abandoned by client");
        }
    }
}

/// Per-job scratch directory, removed with everything in it on drop.
#[derive(Debug)]
pub struct WorkingDir {
    path: PathBuf,
}

impl WorkingDir {
    async fn create(path: PathBuf) -> io::Result<Self> {
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed working directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to remove working directory")
            }
        }
    }
}

/// A finished conversion, ready to be streamed back to the requester.
#[derive(Debug)]
pub struct ConversionArtifact {
    pub job_id: JobId,
    /// Download name, `<stem>_converted.<ext>`.
    pub filename: String,
    /// Copy in the public output store, `<output_dir>/<job_id>/<filename>`.
    pub published_path: PathBuf,
    pub size_bytes: u64,
    file: File,
    working_dir: WorkingDir,
}

impl ConversionArtifact {
    pub fn working_dir(&self) -> &Path {
        self.working_dir.path()
    }

    /// Streams the converted bytes. The working copy is removed once the
    /// stream is dropped.
    pub fn into_stream(self) -> ArtifactStream {
        ArtifactStream {
            job_id: self.job_id,
            inner: ReaderStream::new(self.file),
            _working_dir: self.working_dir,
        }
    }
}

/// Byte stream over a converted file.
#[derive(Debug)]
pub struct ArtifactStream {
    job_id: JobId,
    inner: ReaderStream<File>,
    _working_dir: WorkingDir,
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(None) = polled {
            info!(job_id = %self.job_id, "Converted file sent");
        }
        polled
    }
}
