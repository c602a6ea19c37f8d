//! Testing utilities and mock implementations.
//!
//! The mock engine stands in for ffmpeg so that conversions, probes and
//! thumbnails can be exercised without external binaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use vidgenie_core::testing::{MockEngine, MockStep};
//!
//! let engine = Arc::new(MockEngine::new());
//! engine.set_probe_result(fixtures::media_info()).await;
//!
//! // Use in a ConversionOrchestrator or AppState...
//! ```

mod mock_engine;

pub use mock_engine::{MockEngine, MockStep};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::engine::MediaInfo;

    /// Media info of a short 720p H.264 clip.
    pub fn media_info() -> MediaInfo {
        MediaInfo {
            duration: Some(12.5),
            size: Some(1_048_576),
            bit_rate: Some(671_088),
            width: Some(1280),
            height: Some(720),
            codec: Some("h264".to_string()),
            format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".to_string()),
        }
    }

    /// Media info of an audio-only file: no video stream fields.
    pub fn audio_media_info() -> MediaInfo {
        MediaInfo {
            duration: Some(180.0),
            size: Some(2_880_000),
            bit_rate: Some(128_000),
            width: None,
            height: None,
            codec: None,
            format_name: Some("mp3".to_string()),
        }
    }
}
