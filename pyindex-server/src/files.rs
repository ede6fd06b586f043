//! Distribution file downloads.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use pyindex_core::normalize;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::{AppError, AppResult, AppState};

fn content_disposition(filename: &str) -> AppResult<HeaderValue> {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\""))
        .map_err(|e| AppError::InternalError(format!("invalid Content-Disposition: {e}")))
}

/// `GET {prefix}/files/{project}/{filename}`
///
/// Streams the stored bytes unchanged. The project segment is normalized, so
/// any spelling of the project name resolves to the same file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path((project, filename)): Path<(String, String)>,
) -> AppResult<Response> {
    let project = normalize(&project);
    let stored = state.engine.open(&project, &filename).await?;
    info!(project = %project, filename = %filename, size = stored.size, "Serving distribution file");

    let body = Body::from_stream(ReaderStream::new(stored.file));
    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(stored.size)),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)?),
        ],
        body,
    )
        .into_response())
}
