use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use geoshift_core::models::RequestId;

use crate::dto::PreviewQuery;
use crate::error::ApiError;
use crate::services::PreviewService;
use crate::state::AppState;

pub async fn handle_preview(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Html<String>, ApiError> {
    let request_id: RequestId = request_id.parse().map_err(|_| {
        ApiError::internal("Failed to render preview")
            .with_details(format!("No upload found for request {}", request_id))
    })?;

    let html = PreviewService::render(&state, request_id, &query.filename).await?;
    Ok(Html(html))
}
