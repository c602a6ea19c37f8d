pub mod config;
pub mod engine;
pub mod jobs;
pub mod metrics;
pub mod testing;
pub mod upload;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EngineConfig,
    JobsConfig, ServerConfig, StorageConfig, ThumbnailConfig,
};
pub use engine::{
    EngineError, EngineEvent, FfmpegEngine, MediaInfo, OutputFormat, ThumbnailRequest,
    TranscodeEngine, TranscodeHandle, TranscodeRequest,
};
pub use jobs::{
    spawn_reaper, ConversionArtifact, ConversionError, ConversionOrchestrator, JobId,
    JobRegistry, JobStatus, OutputMaterializer, ProgressPublisher,
};
pub use upload::UploadedFile;
