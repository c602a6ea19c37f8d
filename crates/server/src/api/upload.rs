//! Multipart upload receiver.
//!
//! Streams the `file` part of a multipart form to the upload directory and
//! collects the remaining text fields.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;
use vidgenie_core::UploadedFile;

/// Name of the form field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File exceeds the upload limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    fn from_multipart(e: MultipartError, limit: u64) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge { limit }
        } else {
            Self::Multipart(e.body_text())
        }
    }
}

/// A parsed multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Value of a text field, if it was sent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Reads a whole multipart form, storing the first `file` part on disk.
///
/// Any stored file is removed again if reading the rest of the form fails.
pub async fn receive_upload(
    multipart: &mut Multipart,
    upload_dir: &Path,
    max_bytes: u64,
) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::from_multipart(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD && form.file.is_none() {
            form.file = Some(store_file(field, upload_dir, max_bytes).await?);
        } else if field.file_name().is_none() {
            let value = field
                .text()
                .await
                .map_err(|e| UploadError::from_multipart(e, max_bytes))?;
            form.fields.insert(name, value);
        } else {
            debug!(field = %name, "Ignoring extra file field");
        }
    }

    Ok(form)
}

async fn store_file(
    mut field: Field<'_>,
    upload_dir: &Path,
    max_bytes: u64,
) -> Result<UploadedFile, UploadError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let mime_type = field.content_type().map(str::to_string);

    fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(Uuid::new_v4().simple().to_string());

    match write_field(&mut field, &path, max_bytes).await {
        Ok(size) => {
            info!(
                name = %original_name,
                mime = ?mime_type,
                size,
                "File uploaded"
            );
            Ok(UploadedFile::new(path, original_name, mime_type, size))
        }
        Err(e) => {
            let _ = fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn write_field(
    field: &mut Field<'_>,
    path: &Path,
    max_bytes: u64,
) -> Result<u64, UploadError> {
    let mut file = File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::from_multipart(e, max_bytes))?
    {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(UploadError::TooLarge { limit: max_bytes });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}
