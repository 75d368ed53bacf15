use std::sync::Arc;

use axum::{extract::State, Json};
use geoshift_core::error::GeoshiftError;
use geoshift_core::models::{ProcessingResult, RequestId};

use crate::dto::ProcessRequest;
use crate::error::ApiError;
use crate::services::ProcessService;
use crate::state::AppState;

pub async fn handle_process(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessingResult>, ApiError> {
    tracing::info!(request_id = %request.request_id, filename = %request.filename, "Processing request");

    let request_id: RequestId = request.request_id.parse().map_err(|_| {
        ApiError::from(GeoshiftError::UploadNotFound {
            request_id: request.request_id.clone(),
        })
    })?;

    let result = ProcessService::process(&state, request_id, &request.filename).await?;
    Ok(Json(result))
}
