use geoshift_core::error::GeoshiftError;
use geoshift_core::models::RequestId;
use geoshift_geo::preview::render_preview;
use geoshift_geo::transform::reproject_collection;

use crate::error::ApiError;
use crate::state::AppState;

/// Service for rendering preview maps
pub struct PreviewService;

impl PreviewService {
    /// Render the stored input as a map document in the target CRS.
    ///
    /// Nothing under the store is written. Every failure is reported as a
    /// server error.
    pub async fn render(state: &AppState, request_id: RequestId, filename: &str) -> Result<String, ApiError> {
        Self::try_render(state, request_id, filename).await.map_err(|e| {
            tracing::error!(request_id = %request_id, filename = %filename, error = %e, "Preview failed");
            ApiError::internal("Failed to render preview").with_details(e.to_string())
        })
    }

    async fn try_render(state: &AppState, request_id: RequestId, filename: &str) -> Result<String, GeoshiftError> {
        let source = state.store.source_files(request_id, filename)?;
        let collection = state.registry.read(&source).await?;
        let target = state.target_crs.clone();

        let html = tokio::task::spawn_blocking(move || {
            let reprojected = reproject_collection(collection, &target)?;
            render_preview(&reprojected.collection)
        })
        .await
        .map_err(|e| GeoshiftError::Serialization(format!("Preview task failed: {}", e)))??;

        tracing::info!(request_id = %request_id, filename = %filename, bytes = html.len(), "Rendered preview");
        Ok(html)
    }
}
