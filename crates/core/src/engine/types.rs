//! Types for the engine module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::format::OutputFormat;

/// Lifecycle event emitted by a running transcode.
///
/// A well-behaved engine emits `Started`, zero or more `Progress`, then
/// exactly one of `Finished` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine process is running.
    Started,
    /// Fraction of the input processed, 0.0 - 100.0.
    Progress { percent: f32 },
    /// Output file is complete.
    Finished,
    /// The engine gave up.
    Failed { message: String },
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }
}

/// A single transcode invocation.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    /// Job this invocation belongs to (for logging).
    pub job_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub format: OutputFormat,
}

/// Thumbnail extraction parameters.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Base name for `<stem>_thumb_<i>.png`.
    pub file_stem: String,
    pub count: u32,
    /// Width in pixels; height follows the aspect ratio.
    pub width: u32,
}

impl ThumbnailRequest {
    /// File name of the `index`-th thumbnail (1-based).
    pub fn file_name(&self, index: u32) -> String {
        format!("{}_thumb_{}.png", self.file_stem, index)
    }

    /// Timestamps (seconds) at which frames are taken, evenly spread over `duration_secs`.
    pub fn timestamps(&self, duration_secs: f64) -> Vec<f64> {
        let slots = f64::from(self.count + 1);
        (1..=self.count)
            .map(|i| (duration_secs * f64::from(i) / slots).max(0.0))
            .collect()
    }
}

/// Media information returned by probing.
///
/// Serializes to the `/api/metadata` response shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// File size in bytes.
    pub size: Option<u64>,
    /// Overall bit rate in bits per second.
    pub bit_rate: Option<u64>,
    /// Width of the first video stream.
    pub width: Option<u32>,
    /// Height of the first video stream.
    pub height: Option<u32>,
    /// Codec of the first video stream.
    pub codec: Option<String>,
    /// Container format name as reported by ffprobe (e.g. "mov,mp4,m4a,3gp,3g2,mj2").
    pub format_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumbnail_request(count: u32) -> ThumbnailRequest {
        ThumbnailRequest {
            input_path: PathBuf::from("/in/clip.mp4"),
            output_dir: PathBuf::from("/out"),
            file_stem: "clip".to_string(),
            count,
            width: 320,
        }
    }

    #[test]
    fn test_thumbnail_timestamps_evenly_spaced() {
        let ts = thumbnail_request(3).timestamps(100.0);
        assert_eq!(ts, vec![25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_thumbnail_timestamps_zero_duration() {
        let ts = thumbnail_request(3).timestamps(0.0);
        assert_eq!(ts.len(), 3);
        assert!(ts.iter().all(|t| *t == 0.0));
    }

    #[test]
    fn test_thumbnail_file_name() {
        assert_eq!(thumbnail_request(3).file_name(2), "clip_thumb_2.png");
    }

    #[test]
    fn test_media_info_serializes_nulls() {
        let info = MediaInfo {
            duration: Some(12.5),
            ..Default::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["duration"], 12.5);
        assert!(json["width"].is_null());
        assert!(json["codec"].is_null());
    }

    #[test]
    fn test_terminal_events() {
        assert!(EngineEvent::Finished.is_terminal());
        assert!(EngineEvent::Failed {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!EngineEvent::Progress { percent: 10.0 }.is_terminal());
    }
}
