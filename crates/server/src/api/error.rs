//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};
use vidgenie_core::ConversionError;

use super::upload::UploadError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Every failure a route can report, with its status and JSON body.
#[derive(Debug)]
pub enum ApiError {
    NoFile,
    MissingFormat,
    UnsupportedFormat(String),
    FileTooLarge,
    InvalidUpload(String),
    ConversionFailed(String),
    MetadataFailed(String),
    ThumbnailsFailed(String),
    Server(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<&str>) {
        match self {
            Self::NoFile => (StatusCode::BAD_REQUEST, "No file uploaded", None),
            Self::MissingFormat => (StatusCode::BAD_REQUEST, "No output format specified", None),
            Self::UnsupportedFormat(format) => (
                StatusCode::BAD_REQUEST,
                "Unsupported output format",
                Some(format),
            ),
            Self::FileTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "File too large", None),
            Self::InvalidUpload(details) => {
                (StatusCode::BAD_REQUEST, "Invalid upload", Some(details))
            }
            Self::ConversionFailed(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Conversion failed",
                Some(details),
            ),
            Self::MetadataFailed(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to extract metadata",
                Some(details),
            ),
            Self::ThumbnailsFailed(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate thumbnails",
                Some(details),
            ),
            Self::Server(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error",
                Some(details),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = self.parts();

        if status.is_server_error() {
            error!(status = status.as_u16(), details = ?details, "{}", message);
        } else {
            warn!(status = status.as_u16(), details = ?details, "{}", message);
        }

        let body = ErrorResponse {
            error: message.to_string(),
            details: details.map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ConversionError> for ApiError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::MissingFormat => Self::MissingFormat,
            ConversionError::UnsupportedFormat(format) => Self::UnsupportedFormat(format),
            e if e.is_processing() => Self::ConversionFailed(e.to_string()),
            e => Self::Server(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::TooLarge { .. } => Self::FileTooLarge,
            UploadError::Multipart(details) => Self::InvalidUpload(details),
            UploadError::Io(e) => Self::Server(e.to_string()),
        }
    }
}
