use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use vidgenie_core::{metrics::MEDIA_OPERATIONS_TOTAL, MediaInfo, ThumbnailRequest, UploadedFile};

use super::error::ApiError;
use super::upload::receive_upload;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ThumbnailResponse {
    pub thumbnails: Vec<String>,
}

async fn receive_file(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedFile, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::NoFile)?;
    let storage = &state.config().storage;
    let form =
        receive_upload(&mut multipart, &storage.upload_dir, storage.max_upload_bytes).await?;
    form.file.ok_or(ApiError::NoFile)
}

fn record(operation: &str, ok: bool) {
    let result = if ok { "succeeded" } else { "failed" };
    MEDIA_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

/// `POST /api/metadata`: probes the uploaded file.
pub async fn metadata(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MediaInfo>, ApiError> {
    let file = receive_file(&state, multipart).await?;

    let probed = state.engine().probe(file.path()).await;
    record("probe", probed.is_ok());

    let info = probed.map_err(|e| ApiError::MetadataFailed(e.to_string()))?;
    info!(name = %file.original_name(), duration = ?info.duration, "Metadata extracted");
    Ok(Json(info))
}

/// `POST /api/thumbnail`: extracts evenly spaced stills into the output store.
pub async fn thumbnail(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ThumbnailResponse>, ApiError> {
    let file = receive_file(&state, multipart).await?;
    let config = state.config();

    let request = ThumbnailRequest {
        input_path: file.path().to_path_buf(),
        output_dir: config.storage.output_dir.clone(),
        file_stem: file.file_stem(),
        count: config.thumbnails.count,
        width: config.thumbnails.width,
    };

    let generated = state.engine().generate_thumbnails(request).await;
    record("thumbnail", generated.is_ok());

    let paths = generated.map_err(|e| ApiError::ThumbnailsFailed(e.to_string()))?;
    let thumbnails: Vec<String> = paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    info!(name = %file.original_name(), count = thumbnails.len(), "Thumbnails generated");
    Ok(Json(ThumbnailResponse { thumbnails }))
}
