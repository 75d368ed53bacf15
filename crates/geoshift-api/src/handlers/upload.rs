use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::{extract::Multipart, extract::State, Json};
use geoshift_core::models::UploadReceipt;
use geoshift_store::UploadPart;

use crate::error::ApiError;
use crate::services::UploadService;
use crate::state::AppState;

pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    let parts = extract_files(&mut multipart).await?;

    tracing::info!(
        file_count = parts.len(),
        files = ?parts.iter().map(|p| p.filename.as_str()).collect::<Vec<_>>(),
        "Received upload"
    );

    let receipt = UploadService::upload(&state, parts).await?;
    Ok(Json(receipt))
}

/// Every multipart field carrying a file name is an uploaded file
async fn extract_files(multipart: &mut Multipart) -> Result<Vec<UploadPart>, ApiError> {
    let mut parts = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to parse multipart form", e))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read file data", e))?;
        parts.push(UploadPart::new(filename, data.to_vec()));
    }

    if parts.is_empty() {
        return Err(ApiError::bad_request("No files provided")
            .with_details("Expected one or more 'files' fields in the multipart form"));
    }

    Ok(parts)
}

/// Keeps the status axum assigns, so an oversized body stays a 413
fn multipart_error(message: &str, err: MultipartError) -> ApiError {
    let mut error = ApiError::bad_request(message).with_details(err.body_text());
    error.status = err.status();
    error
}
