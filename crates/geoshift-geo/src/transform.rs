//! CRS transformation of feature collections

use geo::MapCoords;
use geoshift_core::error::{GeoshiftError, Result};
use geoshift_core::models::{Crs, FeatureCollection};
use proj::Proj;

/// A reprojected collection plus the CRS pair reported to the user
#[derive(Debug, Clone)]
pub struct Reprojection {
    pub collection: FeatureCollection,
    pub source_crs: Crs,
    pub target_crs: Crs,
}

/// Reproject every geometry of `collection` to `target`.
///
/// A collection without CRS cannot be transformed. When the source already
/// is the target the coordinates are left untouched, but both identifiers are
/// still recorded.
pub fn reproject_collection(mut collection: FeatureCollection, target: &Crs) -> Result<Reprojection> {
    let source = collection.crs.clone().ok_or(GeoshiftError::UndefinedCrs)?;

    if source.same_as(target) {
        tracing::debug!(crs = %source, "Source CRS already matches target, skipping transform");
        collection.crs = Some(target.clone());
        return Ok(Reprojection {
            collection,
            source_crs: source,
            target_crs: target.clone(),
        });
    }

    let reprojection_error = |reason: String| GeoshiftError::Reprojection {
        from: source.identifier(),
        to: target.identifier(),
        reason,
    };

    let proj = Proj::new_known_crs(source.definition(), target.definition(), None)
        .map_err(|e| reprojection_error(format!("Failed to create projection: {}", e)))?;

    for (idx, feature) in collection.features.iter_mut().enumerate() {
        if let Some(geometry) = feature.geometry.take() {
            let transformed = reproject_geometry(&geometry, &proj)
                .map_err(|e| reprojection_error(format!("Feature {}: {}", idx, e)))?;
            feature.geometry = Some(transformed);
        }
    }

    tracing::info!(
        source_crs = %source,
        target_crs = %target,
        feature_count = collection.len(),
        "Reprojected feature collection"
    );

    collection.crs = Some(target.clone());
    Ok(Reprojection {
        collection,
        source_crs: source,
        target_crs: target.clone(),
    })
}

/// Transform every coordinate of a geometry; non-finite output is an error
pub fn reproject_geometry(
    geometry: &geo::Geometry<f64>,
    proj: &Proj,
) -> std::result::Result<geo::Geometry<f64>, String> {
    geometry.try_map_coords(|coord| {
        let (x, y) = proj
            .convert((coord.x, coord.y))
            .map_err(|e| format!("Projection failed: {}", e))?;
        if x.is_finite() && y.is_finite() {
            Ok(geo::Coord { x, y })
        } else {
            Err(format!("Projection of ({}, {}) is not finite", coord.x, coord.y))
        }
    })
}
