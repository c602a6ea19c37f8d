//! Output formats the engine is allowed to produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::EngineError;

/// Container/codec identifier accepted for conversion.
///
/// Client input is parsed into this enum before anything reaches ffmpeg,
/// so only the fixed muxer names below are ever passed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MPEG-4 Part 14
    Mp4,
    /// Matroska
    Mkv,
    /// WebM
    Webm,
    /// QuickTime
    Mov,
    /// Audio Video Interleave
    Avi,
    /// Flash Video
    Flv,
    /// MPEG-1/2 program stream
    Mpeg,
    /// Animated GIF
    Gif,
    /// MPEG Audio Layer III (audio only)
    Mp3,
    /// WAVE (audio only)
    Wav,
    /// Ogg (audio only)
    Ogg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 11] = [
        Self::Mp4,
        Self::Mkv,
        Self::Webm,
        Self::Mov,
        Self::Avi,
        Self::Flv,
        Self::Mpeg,
        Self::Gif,
        Self::Mp3,
        Self::Wav,
        Self::Ogg,
    ];

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Flv => "flv",
            Self::Mpeg => "mpeg",
            Self::Gif => "gif",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
        }
    }

    /// Returns the ffmpeg muxer name (`-f`) for this format.
    pub fn muxer(&self) -> &'static str {
        match self {
            Self::Mkv => "matroska",
            other => other.extension(),
        }
    }

    /// Whether the output drops the video stream.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Wav | Self::Ogg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "mkv" | "matroska" => Ok(Self::Mkv),
            "webm" => Ok(Self::Webm),
            "mov" => Ok(Self::Mov),
            "avi" => Ok(Self::Avi),
            "flv" => Ok(Self::Flv),
            "mpeg" | "mpg" => Ok(Self::Mpeg),
            "gif" => Ok(Self::Gif),
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "ogg" => Ok(Self::Ogg),
            _ => Err(EngineError::unsupported_format(s)),
        }
    }
}
