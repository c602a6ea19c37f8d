//! External media engine.
//!
//! The engine does the actual decode/encode/probe/screenshot work out of
//! process. A transcode is exposed as a [`TranscodeHandle`]: a channel of
//! [`EngineEvent`]s that cancels the engine when dropped.
//!
//! # Example
//!
//! ```ignore
//! use vidgenie_core::engine::{FfmpegEngine, OutputFormat, TranscodeEngine, TranscodeRequest};
//!
//! let engine = FfmpegEngine::with_defaults();
//! let mut handle = engine
//!     .start(TranscodeRequest {
//!         job_id: "job-1".to_string(),
//!         input_path: PathBuf::from("uploads/abc"),
//!         output_path: PathBuf::from("uploads/working/job-1/clip_converted.mp4"),
//!         format: OutputFormat::Mp4,
//!     })
//!     .await?;
//!
//! while let Some(event) = handle.next_event().await {
//!     println!("{:?}", event);
//! }
//! ```

mod error;
mod ffmpeg;
mod format;
mod handle;
mod traits;
mod types;

pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use format::OutputFormat;
pub use handle::{EventSink, TranscodeHandle};
pub use traits::TranscodeEngine;
pub use types::{EngineEvent, MediaInfo, ThumbnailRequest, TranscodeRequest};
