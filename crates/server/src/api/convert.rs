use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use super::error::ApiError;
use super::upload::receive_upload;
use crate::state::AppState;

/// Response header carrying the job id of a finished conversion.
pub const CONVERSION_ID_HEADER: HeaderName = HeaderName::from_static("x-conversion-id");

/// Form field naming the target format.
const FORMAT_FIELD: &str = "outputFormat";

/// `POST /api/convert`: converts the uploaded file and returns the result as
/// an attachment.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::NoFile)?;
    let storage = &state.config().storage;
    let mut form =
        receive_upload(&mut multipart, &storage.upload_dir, storage.max_upload_bytes).await?;

    let file = form.file.take().ok_or(ApiError::NoFile)?;
    let output_format = form.text(FORMAT_FIELD).unwrap_or_default();

    let artifact = state.orchestrator().convert(file, output_format).await?;

    let headers = [
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
        (header::CONTENT_LENGTH, artifact.size_bytes.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename),
        ),
        (CONVERSION_ID_HEADER, artifact.job_id.to_string()),
    ];
    let body = Body::from_stream(artifact.into_stream());

    Ok((StatusCode::OK, headers, body).into_response())
}

/// `GET /api/convert/progress/{id}`: server-sent progress events.
pub async fn progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .publisher()
        .subscribe(&id)
        .map(|progress| Ok(Event::default().data(progress.to_string())));

    Sse::new(events)
}
