//! Part-count rule: a collection is rejected exactly when some MultiPoint,
//! MultiLineString or MultiPolygon holds more than one part, and never after
//! the first offending feature has been seen.

use geo::{LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geoshift_core::models::{Feature, FeatureCollection};
use geoshift_core::GeoshiftError;
use geoshift_geo::validation::{ensure_single_part, validate_collection};
use proptest::prelude::*;
use proptest::test_runner::Config;

#[derive(Debug, Clone, Copy)]
enum Shape {
    Point,
    Line,
    Polygon,
    MultiPoint(usize),
    MultiLine(usize),
    MultiPolygon(usize),
}

fn square(offset: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (offset, offset),
            (offset + 1.0, offset),
            (offset + 1.0, offset + 1.0),
            (offset, offset),
        ]),
        vec![],
    )
}

fn build(shape: Shape) -> geo::Geometry<f64> {
    let line = |i: usize| LineString::from(vec![(i as f64, 0.0), (i as f64, 1.0)]);
    match shape {
        Shape::Point => Point::new(0.0, 0.0).into(),
        Shape::Line => line(0).into(),
        Shape::Polygon => square(0.0).into(),
        Shape::MultiPoint(n) => {
            MultiPoint::new((0..n).map(|i| Point::new(i as f64, 0.0)).collect()).into()
        }
        Shape::MultiLine(n) => MultiLineString::new((0..n).map(line).collect()).into(),
        Shape::MultiPolygon(n) => {
            MultiPolygon::new((0..n).map(|i| square(i as f64 * 3.0)).collect()).into()
        }
    }
}

fn is_rejected(shape: Shape) -> bool {
    matches!(
        shape,
        Shape::MultiPoint(n) | Shape::MultiLine(n) | Shape::MultiPolygon(n) if n > 1
    )
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    prop_oneof![
        Just(Shape::Point),
        Just(Shape::Line),
        Just(Shape::Polygon),
        (1_usize..4).prop_map(Shape::MultiPoint),
        (1_usize..4).prop_map(Shape::MultiLine),
        (1_usize..4).prop_map(Shape::MultiPolygon),
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn rejection_matches_part_rule(shapes in prop::collection::vec(shape_strategy(), 0..8)) {
        let features = shapes.iter().map(|s| Feature::new(Some(build(*s)))).collect();
        let collection = FeatureCollection::new("t", "GeoJSON", None, vec![], features);

        let first_bad = shapes.iter().position(|s| is_rejected(*s));

        match (ensure_single_part(&collection), first_bad) {
            (Ok(()), None) => {}
            (Err(GeoshiftError::MultiPartGeometry { feature_index, .. }), Some(idx)) => {
                prop_assert_eq!(feature_index, idx);
            }
            (other, expected) => {
                prop_assert!(false, "got {:?}, expected first violation at {:?}", other, expected);
            }
        }

        let expected_count = shapes.iter().filter(|s| is_rejected(**s)).count();
        prop_assert_eq!(validate_collection(&collection).errors.len(), expected_count);
    }
}
