//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::error::EngineError;
use super::handle::{EventSink, TranscodeHandle};
use super::traits::TranscodeEngine;
use super::types::{EngineEvent, MediaInfo, ThumbnailRequest, TranscodeRequest};
use crate::config::EngineConfig;

/// Diagnostic stderr lines kept for the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg/FFprobe engine.
pub struct FfmpegEngine {
    config: EngineConfig,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Builds ffmpeg arguments for a container conversion.
    fn build_transcode_args(&self, request: &TranscodeRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-f".to_string(),
            request.format.muxer().to_string(),
        ];

        if request.format.is_audio_only() {
            args.push("-vn".to_string());
        }

        // Log level and machine-readable progress on stderr
        args.extend([
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
        ]);

        args.extend(self.config.extra_args.iter().cloned());

        args.push(request.output_path.to_string_lossy().to_string());

        args
    }

    /// Builds ffmpeg arguments to grab a single scaled frame.
    fn build_thumbnail_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        timestamp_secs: f64,
        width: u32,
    ) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", timestamp_secs),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            // -2 keeps the aspect ratio with an even height
            format!("scale={}:-2", width),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            output_path.to_string_lossy().to_string(),
        ]
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(output: &str) -> Result<MediaInfo, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: Option<String>,
            duration: Option<String>,
            size: Option<String>,
            bit_rate: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            codec_name: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EngineError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));

        let format = probe.format.as_ref();

        Ok(MediaInfo {
            duration: format
                .and_then(|f| f.duration.as_ref())
                .and_then(|d| d.parse::<f64>().ok()),
            size: format
                .and_then(|f| f.size.as_ref())
                .and_then(|s| s.parse::<u64>().ok()),
            bit_rate: format
                .and_then(|f| f.bit_rate.as_ref())
                .and_then(|b| b.parse::<u64>().ok()),
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
            codec: video_stream.and_then(|s| s.codec_name.clone()),
            format_name: format.and_then(|f| f.format_name.clone()),
        })
    }

    fn ffmpeg_spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::FfmpegNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            EngineError::Io(e)
        }
    }

    fn ffprobe_spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::FfprobeNotFound {
                path: self.config.ffprobe_path.clone(),
            }
        } else {
            EngineError::Io(e)
        }
    }
}

/// Extracts the output position in seconds from an `-progress` line.
///
/// `out_time_ms` is reported in microseconds despite its name.
fn parse_out_time(re: &Regex, line: &str) -> Option<f64> {
    let caps = re.captures(line)?;
    let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;
    Some(micros / 1_000_000.0)
}

fn progress_percent(position_secs: f64, duration_secs: Option<f64>) -> Option<f32> {
    match duration_secs {
        Some(dur) if dur > 0.0 => Some((position_secs / dur * 100.0).clamp(0.0, 100.0) as f32),
        _ => None,
    }
}

/// Lossily decodes one stderr line, dropping a trailing carriage return.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Relays ffmpeg's stderr into engine events until the process exits or the
/// handle is dropped.
async fn drive_transcode(
    mut child: Child,
    sink: EventSink,
    duration_secs: Option<f64>,
    job_id: String,
) {
    let Some(stderr) = child.stderr.take() else {
        sink.emit(EngineEvent::Failed {
            message: "ffmpeg stderr was not captured".to_string(),
        })
        .await;
        return;
    };

    // Split on raw bytes: ffmpeg may print non-UTF-8 file names and the pipe
    // must be drained until EOF or the process blocks on a full buffer.
    let mut segments = BufReader::new(stderr).split(b'\n');
    let time_regex = Regex::new(r"^out_time_(?:ms|us)=(\d+)$").ok();
    let key_value_regex = Regex::new(r"^\w+=\S*$").ok();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut last_percent: Option<f32> = None;

    sink.emit(EngineEvent::Started).await;

    loop {
        tokio::select! {
            _ = sink.cancelled() => {
                debug!(job_id = %job_id, "Transcode cancelled, killing ffmpeg");
                let _ = child.kill().await;
                return;
            }
            segment = segments.next_segment() => {
                let line = match segment {
                    Ok(Some(bytes)) => decode_line(&bytes),
                    Ok(None) => break,
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "Failed to read ffmpeg stderr");
                        break;
                    }
                };

                let position = time_regex
                    .as_ref()
                    .and_then(|re| parse_out_time(re, &line));

                if let Some(secs) = position {
                    if let Some(percent) = progress_percent(secs, duration_secs) {
                        if last_percent != Some(percent) {
                            last_percent = Some(percent);
                            sink.emit(EngineEvent::Progress { percent }).await;
                        }
                    }
                } else if !key_value_regex
                    .as_ref()
                    .is_some_and(|re| re.is_match(&line))
                {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        }
    }

    let status = tokio::select! {
        _ = sink.cancelled() => None,
        status = child.wait() => Some(status),
    };

    let Some(status) = status else {
        debug!(job_id = %job_id, "Transcode cancelled, killing ffmpeg");
        let _ = child.kill().await;
        return;
    };

    let event = match status {
        Ok(status) if status.success() => EngineEvent::Finished,
        Ok(status) => {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let diagnostics = tail.into_iter().collect::<Vec<_>>().join("\n");
            warn!(job_id = %job_id, code = %code, "ffmpeg exited unsuccessfully");
            EngineEvent::Failed {
                message: format!("ffmpeg exited with code {}: {}", code, diagnostics),
            }
        }
        Err(e) => EngineEvent::Failed {
            message: format!("Failed to wait for ffmpeg: {}", e),
        },
    };

    sink.emit(event).await;
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn start(&self, request: TranscodeRequest) -> Result<TranscodeHandle, EngineError> {
        if !request.input_path.exists() {
            return Err(EngineError::InputNotFound {
                path: request.input_path.clone(),
            });
        }

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                EngineError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        // Input duration is needed to turn positions into percentages
        let duration_secs = self
            .probe(&request.input_path)
            .await
            .ok()
            .and_then(|info| info.duration);

        let args = self.build_transcode_args(&request);
        debug!(job_id = %request.job_id, ?args, "Spawning ffmpeg");

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.ffmpeg_spawn_error(e))?;

        let (sink, handle) = TranscodeHandle::channel();
        tokio::spawn(drive_transcode(child, sink, duration_secs, request.job_id));

        Ok(handle)
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        if !path.exists() {
            return Err(EngineError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| self.ffprobe_spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::probe_failed(format!(
                "ffprobe exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(&stdout)
    }

    async fn generate_thumbnails(
        &self,
        request: ThumbnailRequest,
    ) -> Result<Vec<PathBuf>, EngineError> {
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|_| EngineError::OutputDirectoryFailed {
                path: request.output_dir.clone(),
            })?;

        let duration = self
            .probe(&request.input_path)
            .await?
            .duration
            .unwrap_or(0.0);

        let mut outputs = Vec::with_capacity(request.count as usize);

        for (index, timestamp) in (1..).zip(request.timestamps(duration)) {
            let output_path = request.output_dir.join(request.file_name(index));
            let args = self.build_thumbnail_args(
                &request.input_path,
                &output_path,
                timestamp,
                request.width,
            );

            let output = Command::new(&self.config.ffmpeg_path)
                .args(&args)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| self.ffmpeg_spawn_error(e))?;

            if !output.status.success() {
                return Err(EngineError::thumbnail_failed(format!(
                    "ffmpeg exited with code {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }

            if !output_path.exists() {
                return Err(EngineError::thumbnail_failed(format!(
                    "No frame extracted at {:.3}s",
                    timestamp
                )));
            }

            outputs.push(output_path);
        }

        Ok(outputs)
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.ffmpeg_spawn_error(e))?;

        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.ffprobe_spawn_error(e))?;

        Ok(())
    }
}
