//! Trait definitions for the engine module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::error::EngineError;
use super::handle::TranscodeHandle;
use super::types::{MediaInfo, ThumbnailRequest, TranscodeRequest};

/// An out-of-process media engine.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Starts a transcode and returns a handle streaming its lifecycle events.
    ///
    /// Returns an error only if the engine could not be launched at all;
    /// failures after launch arrive as [`super::EngineEvent::Failed`].
    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeHandle, EngineError>;

    /// Probes a media file to get its information.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError>;

    /// Extracts `request.count` still frames and returns their paths in order.
    async fn generate_thumbnails(
        &self,
        request: ThumbnailRequest,
    ) -> Result<Vec<PathBuf>, EngineError>;

    /// Validates that the engine is properly configured and ready.
    async fn validate(&self) -> Result<(), EngineError>;
}
