use super::{types::Config, ConfigError};
use crate::engine::OutputFormat;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Poll interval and job duration are non-zero
/// - Thumbnail count and width are non-zero
/// - Every allowed output format is one the engine knows
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.jobs.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "jobs.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.engine.max_job_duration_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_job_duration_secs cannot be 0".to_string(),
        ));
    }

    if config.thumbnails.count == 0 || config.thumbnails.width == 0 {
        return Err(ConfigError::ValidationError(
            "thumbnails.count and thumbnails.width must be positive".to_string(),
        ));
    }

    if config.jobs.allowed_formats.is_empty() {
        return Err(ConfigError::ValidationError(
            "jobs.allowed_formats cannot be empty".to_string(),
        ));
    }

    for format in &config.jobs.allowed_formats {
        if format.parse::<OutputFormat>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "jobs.allowed_formats contains unsupported format: {}",
                format
            )));
        }
    }

    Ok(())
}
