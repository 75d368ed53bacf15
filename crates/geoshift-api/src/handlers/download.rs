use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use geoshift_core::models::RequestId;
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::state::AppState;

/// Name the archive is offered under
const DOWNLOAD_NAME: &str = "result.zip";

/// Stream the result archive and schedule cleanup of the request
pub async fn handle_download(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id: RequestId = request_id
        .parse()
        .map_err(|_| ApiError::not_found("Not found").with_details(format!("Archive not found for request {}", request_id)))?;

    let archive = state.store.existing_archive(request_id)?;
    let file = tokio::fs::File::open(&archive).await.map_err(|e| {
        ApiError::internal("Failed to open archive").with_details(e.to_string())
    })?;

    tracing::info!(request_id = %request_id, archive = %archive.display(), "Delivering archive");

    // the open handle keeps streaming even if the purge unlinks the file first
    state.reaper.schedule(request_id);

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_NAME),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}
