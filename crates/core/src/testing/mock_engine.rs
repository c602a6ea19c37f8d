//! Mock engine for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{
    EngineError, EngineEvent, EventSink, MediaInfo, ThumbnailRequest, TranscodeEngine,
    TranscodeHandle, TranscodeRequest,
};

/// One step of a scripted transcode.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Send an event to the orchestrator.
    Emit(EngineEvent),
    /// Pause before the next step.
    Delay(Duration),
    /// Never finish; only cancellation ends the run.
    Hang,
}

/// Mock implementation of the [`TranscodeEngine`] trait.
///
/// Provides controllable behavior for testing:
/// - Script the event sequence of every transcode
/// - Write a fake output file on `Finished`
/// - Control probe and thumbnail results
/// - Record requests and observe cancellations
///
/// # Example
///
/// ```rust,ignore
/// use vidgenie_core::testing::{MockEngine, MockStep};
///
/// let engine = MockEngine::new();
/// engine.set_script(vec![
///     MockStep::Emit(EngineEvent::Started),
///     MockStep::Emit(EngineEvent::Failed { message: "boom".into() }),
/// ]).await;
///
/// // Use in a ConversionOrchestrator...
///
/// assert_eq!(engine.recorded_transcodes().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    /// Steps replayed by every transcode.
    script: Arc<RwLock<Vec<MockStep>>>,
    /// Bytes written to the output path before `Finished` is emitted.
    output_bytes: Arc<RwLock<Vec<u8>>>,
    /// Emit `Finished` without writing any output file.
    output_missing: Arc<RwLock<bool>>,
    /// If set, the next `start` fails with this error.
    start_error: Arc<RwLock<Option<EngineError>>>,
    probe_result: Arc<RwLock<MediaInfo>>,
    probe_error: Arc<RwLock<Option<String>>>,
    thumbnail_error: Arc<RwLock<Option<String>>>,
    transcodes: Arc<RwLock<Vec<TranscodeRequest>>>,
    thumbnails: Arc<RwLock<Vec<ThumbnailRequest>>>,
    /// Runs that observed cancellation before finishing their script.
    cancelled: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a mock engine whose transcodes start, report 50% and finish.
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(vec![
                MockStep::Emit(EngineEvent::Started),
                MockStep::Emit(EngineEvent::Progress { percent: 50.0 }),
                MockStep::Emit(EngineEvent::Finished),
            ])),
            output_bytes: Arc::new(RwLock::new(b"mock converted output".to_vec())),
            output_missing: Arc::new(RwLock::new(false)),
            start_error: Arc::new(RwLock::new(None)),
            probe_result: Arc::new(RwLock::new(super::fixtures::media_info())),
            probe_error: Arc::new(RwLock::new(None)),
            thumbnail_error: Arc::new(RwLock::new(None)),
            transcodes: Arc::new(RwLock::new(Vec::new())),
            thumbnails: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the step script used by subsequent transcodes.
    pub async fn set_script(&self, steps: Vec<MockStep>) {
        *self.script.write().await = steps;
    }

    /// Set the content of the fake output file.
    pub async fn set_output_bytes(&self, bytes: Vec<u8>) {
        *self.output_bytes.write().await = bytes;
    }

    /// Report success without producing an output file.
    pub async fn set_output_missing(&self, missing: bool) {
        *self.output_missing.write().await = missing;
    }

    /// Configure the next `start` to fail with the given error.
    pub async fn set_start_error(&self, error: EngineError) {
        *self.start_error.write().await = Some(error);
    }

    /// Set the media info returned by `probe`.
    pub async fn set_probe_result(&self, info: MediaInfo) {
        *self.probe_result.write().await = info;
    }

    /// Make `probe` fail with the given reason.
    pub async fn set_probe_error(&self, reason: impl Into<String>) {
        *self.probe_error.write().await = Some(reason.into());
    }

    /// Make `generate_thumbnails` fail with the given reason.
    pub async fn set_thumbnail_error(&self, reason: impl Into<String>) {
        *self.thumbnail_error.write().await = Some(reason.into());
    }

    /// Get all recorded transcode requests.
    pub async fn recorded_transcodes(&self) -> Vec<TranscodeRequest> {
        self.transcodes.read().await.clone()
    }

    /// Get all recorded thumbnail requests.
    pub async fn recorded_thumbnails(&self) -> Vec<ThumbnailRequest> {
        self.thumbnails.read().await.clone()
    }

    /// Number of transcodes that were cancelled mid-script.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Replays `steps` into `sink` until the script ends or the handle is dropped.
async fn play(
    steps: Vec<MockStep>,
    sink: EventSink,
    output_path: PathBuf,
    output_bytes: Option<Vec<u8>>,
    cancelled: Arc<AtomicUsize>,
) {
    for step in steps {
        let keep_going = match step {
            MockStep::Emit(event) => {
                if let (EngineEvent::Finished, Some(bytes)) = (&event, &output_bytes) {
                    if let Some(parent) = output_path.parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    let _ = tokio::fs::write(&output_path, bytes).await;
                }
                sink.emit(event).await
            }
            MockStep::Delay(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => true,
                    _ = sink.cancelled() => false,
                }
            }
            MockStep::Hang => {
                sink.cancelled().await;
                false
            }
        };

        if !keep_going {
            cancelled.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }
}

#[async_trait]
impl TranscodeEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeHandle, EngineError> {
        self.transcodes.write().await.push(request.clone());

        if let Some(error) = self.start_error.write().await.take() {
            return Err(error);
        }

        let (sink, handle) = TranscodeHandle::channel();
        let steps = self.script.read().await.clone();
        let output_bytes = if *self.output_missing.read().await {
            None
        } else {
            Some(self.output_bytes.read().await.clone())
        };

        tokio::spawn(play(
            steps,
            sink,
            request.output_path,
            output_bytes,
            Arc::clone(&self.cancelled),
        ));

        Ok(handle)
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        if !path.exists() {
            return Err(EngineError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        if let Some(reason) = self.probe_error.read().await.clone() {
            return Err(EngineError::probe_failed(reason));
        }
        Ok(self.probe_result.read().await.clone())
    }

    async fn generate_thumbnails(
        &self,
        request: ThumbnailRequest,
    ) -> Result<Vec<PathBuf>, EngineError> {
        self.thumbnails.write().await.push(request.clone());

        if let Some(reason) = self.thumbnail_error.read().await.clone() {
            return Err(EngineError::thumbnail_failed(reason));
        }

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let mut paths = Vec::with_capacity(request.count as usize);
        for i in 1..=request.count {
            let path = request.output_dir.join(request.file_name(i));
            tokio::fs::write(&path, b"mock png").await?;
            paths.push(path);
        }
        Ok(paths)
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
