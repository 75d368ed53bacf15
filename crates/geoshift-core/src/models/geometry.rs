//! Geometry classification shared by readers, validator and writer.
//!
//! Features carry `geo::Geometry<f64>` directly; this module only adds the
//! type tag and part counting the pipeline reasons about.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometry type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Classify a geometry. `Line`, `Rect` and `Triangle` are reported as the
    /// simple type they serialize to.
    pub fn of(geometry: &geo::Geometry<f64>) -> Self {
        match geometry {
            geo::Geometry::Point(_) => GeometryType::Point,
            geo::Geometry::Line(_) | geo::Geometry::LineString(_) => GeometryType::LineString,
            geo::Geometry::Polygon(_) | geo::Geometry::Rect(_) | geo::Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            geo::Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            geo::Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            geo::Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            geo::Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// MultiPoint, MultiLineString or MultiPolygon
    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            GeometryType::MultiPoint | GeometryType::MultiLineString | GeometryType::MultiPolygon
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of parts of a geometry: members of a multi-geometry or collection,
/// 1 for everything else.
pub fn part_count(geometry: &geo::Geometry<f64>) -> usize {
    match geometry {
        geo::Geometry::MultiPoint(mp) => mp.0.len(),
        geo::Geometry::MultiLineString(mls) => mls.0.len(),
        geo::Geometry::MultiPolygon(mp) => mp.0.len(),
        geo::Geometry::GeometryCollection(gc) => gc.0.len(),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, MultiPoint, MultiPolygon};

    #[test]
    fn test_classification() {
        let p: geo::Geometry<f64> = point!(x: 1.0, y: 2.0).into();
        assert_eq!(GeometryType::of(&p), GeometryType::Point);
        assert!(!GeometryType::of(&p).is_multi());

        let ls: geo::Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)].into();
        assert_eq!(GeometryType::of(&ls), GeometryType::LineString);

        let mp: geo::Geometry<f64> =
            MultiPoint::new(vec![point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 1.0)]).into();
        assert_eq!(GeometryType::of(&mp), GeometryType::MultiPoint);
        assert!(GeometryType::of(&mp).is_multi());
        assert_eq!(part_count(&mp), 2);
    }

    #[test]
    fn test_single_part_multipolygon_counts_one() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let geom: geo::Geometry<f64> = MultiPolygon::new(vec![poly]).into();
        assert_eq!(part_count(&geom), 1);
        assert_eq!(GeometryType::of(&geom).to_string(), "MultiPolygon");
    }
}
