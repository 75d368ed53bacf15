use geoshift_core::error::{GeoshiftError, Result};
use geoshift_core::formats::ShapefileWriter;
use geoshift_core::models::{Crs, FeatureCollection, ProcessingResult, RequestId, TARGET_WKT};
use geoshift_geo::transform::{reproject_collection, Reprojection};
use geoshift_geo::validation::ensure_single_part;
use geoshift_store::{zip_directory, ArtifactStore};

use crate::error::ApiError;
use crate::state::AppState;

/// Service running the validate, reproject and package pipeline
pub struct ProcessService;

impl ProcessService {
    pub async fn process(
        state: &AppState,
        request_id: RequestId,
        filename: &str,
    ) -> std::result::Result<ProcessingResult, ApiError> {
        let source = state.store.source_files(request_id, filename)?;
        let collection = state.registry.read(&source).await?;

        tracing::info!(
            request_id = %request_id,
            filename = %filename,
            format = %collection.format_name,
            feature_count = collection.len(),
            "Read input"
        );

        let store = state.store.clone();
        let target = state.target_crs.clone();
        let result = tokio::task::spawn_blocking(move || package_collection(&store, request_id, collection, &target))
            .await
            .map_err(|e| ApiError::internal("Processing task failed").with_details(e.to_string()))?;

        match result {
            Ok(result) => {
                tracing::info!(
                    request_id = %request_id,
                    source_crs = %result.source_crs,
                    target_crs = %result.target_crs,
                    "Processed upload"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Processing failed");
                Err(e.into())
            }
        }
    }
}

/// Validate, reproject and package a collection for one request.
///
/// Validation runs before anything is written, so a rejected collection
/// leaves no output behind.
pub fn package_collection(
    store: &ArtifactStore,
    request_id: RequestId,
    collection: FeatureCollection,
    target: &Crs,
) -> Result<ProcessingResult> {
    ensure_single_part(&collection)?;

    let Reprojection {
        mut collection,
        source_crs,
        target_crs,
    } = reproject_collection(collection, target)?;

    let normalized = collection.normalize_temporal_columns();
    if !normalized.is_empty() {
        tracing::debug!(request_id = %request_id, columns = ?normalized, "Truncated datetime columns to dates");
    }

    let output_dir = store.prepare_output_dir(request_id)?;
    let written = ShapefileWriter::new(prj_for(&target_crs)).write(&collection, &output_dir)?;

    let archive_path = store.archive_path(request_id);
    let entries = zip_directory(&output_dir, &archive_path)?;
    if entries.len() != written.len() {
        return Err(GeoshiftError::Archive(format!(
            "Expected {} output files in archive, found {}",
            written.len(),
            entries.len()
        )));
    }

    Ok(ProcessingResult::new(archive_path, &source_crs, &target_crs))
}

fn prj_for(target: &Crs) -> String {
    if target.same_as(&Crs::target()) {
        TARGET_WKT.to_string()
    } else {
        target.definition().to_string()
    }
}
