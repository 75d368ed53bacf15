//! Part-count validation of feature geometries

use geoshift_core::error::{GeoshiftError, Result};
use geoshift_core::models::{part_count, FeatureCollection, GeometryType};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// A rejected feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub feature_index: usize,
    pub geometry_type: GeometryType,
    pub parts: usize,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }
}

/// A geometry is rejected when it is a MultiPoint, MultiLineString or
/// MultiPolygon holding more than one part.
pub fn violates_part_rule(geometry: &geo::Geometry<f64>) -> bool {
    GeometryType::of(geometry).is_multi() && part_count(geometry) > 1
}

/// Fail on the first multi-part geometry.
///
/// Single-part multi geometries and every other type pass unchanged.
pub fn ensure_single_part(collection: &FeatureCollection) -> Result<()> {
    for (idx, feature) in collection.features.iter().enumerate() {
        if let Some(geometry) = &feature.geometry {
            if violates_part_rule(geometry) {
                let geometry_type = GeometryType::of(geometry);
                tracing::debug!(
                    feature_index = idx,
                    geometry_type = %geometry_type,
                    parts = part_count(geometry),
                    "Rejecting multi-part geometry"
                );
                return Err(GeoshiftError::MultiPartGeometry {
                    geometry_type: geometry_type.to_string(),
                    feature_index: idx,
                });
            }
        }
    }

    Ok(())
}

/// Report every multi-part geometry instead of stopping at the first
pub fn validate_collection(collection: &FeatureCollection) -> ValidationResult {
    let mut result = ValidationResult::valid();

    for (idx, feature) in collection.features.iter().enumerate() {
        if let Some(geometry) = feature.geometry.as_ref().filter(|g| violates_part_rule(g)) {
            result.add_error(ValidationError {
                feature_index: idx,
                geometry_type: GeometryType::of(geometry),
                parts: part_count(geometry),
            });
        }
    }

    result
}
