use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    4000
}

/// Where uploads, working files and published artifacts live.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Temporary upload location.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Per-job scratch space for engine output.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Publicly served output store (`/output`).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            working_dir: default_working_dir(),
            output_dir: default_output_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("uploads/working")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

/// External engine (ffmpeg/ffprobe) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional ffmpeg arguments inserted before the output path.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Jobs running longer than this are force-failed and the engine killed.
    #[serde(default = "default_max_job_duration")]
    pub max_job_duration_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
            max_job_duration_secs: default_max_job_duration(),
        }
    }
}

impl EngineConfig {
    pub fn max_job_duration(&self) -> Duration {
        Duration::from_secs(self.max_job_duration_secs)
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_max_job_duration() -> u64 {
    3600 // 1 hour
}

/// Job tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Progress stream poll interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Terminal jobs nobody observed are dropped after this many seconds.
    #[serde(default = "default_unobserved_ttl")]
    pub unobserved_ttl_secs: u64,

    /// How often the stale job reaper runs.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,

    /// Output format identifiers accepted by `/api/convert`.
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            unobserved_ttl_secs: default_unobserved_ttl(),
            reap_interval_secs: default_reap_interval(),
            allowed_formats: default_allowed_formats(),
        }
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn unobserved_ttl(&self) -> Duration {
        Duration::from_secs(self.unobserved_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_unobserved_ttl() -> u64 {
    600
}

fn default_reap_interval() -> u64 {
    60
}

fn default_allowed_formats() -> Vec<String> {
    crate::engine::OutputFormat::ALL
        .iter()
        .map(|f| f.extension().to_string())
        .collect()
}

/// Thumbnail generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumbnail_count")]
    pub count: u32,
    /// Output width in pixels; height keeps the aspect ratio.
    #[serde(default = "default_thumbnail_width")]
    pub width: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            count: default_thumbnail_count(),
            width: default_thumbnail_width(),
        }
    }
}

fn default_thumbnail_count() -> u32 {
    3
}

fn default_thumbnail_width() -> u32 {
    320
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.storage.output_dir, PathBuf::from("output"));
        assert_eq!(config.storage.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.jobs.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.thumbnails.count, 3);
        assert_eq!(config.thumbnails.width, 320);
    }

    #[test]
    fn test_deserialize_server_section() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_default_allowed_formats_include_common_containers() {
        let config = JobsConfig::default();
        for format in ["mp4", "mkv", "webm", "mov", "avi"] {
            assert!(
                config.allowed_formats.iter().any(|f| f == format),
                "missing {}",
                format
            );
        }
    }

    #[test]
    fn test_deserialize_engine_section() {
        let toml = r#"
[engine]
ffmpeg_path = "/usr/local/bin/ffmpeg"
max_job_duration_secs = 120
extra_args = ["-threads", "2"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.engine.ffmpeg_path,
            PathBuf::from("/usr/local/bin/ffmpeg")
        );
        assert_eq!(config.engine.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.engine.max_job_duration(), Duration::from_secs(120));
        assert_eq!(config.engine.extra_args, vec!["-threads", "2"]);
    }
}
