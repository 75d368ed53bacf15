//! CRS handling across the format readers
//!
//! - GeoJSON honours the legacy `crs` member and defaults to EPSG:4326
//! - KML/KMZ are always EPSG:4326
//! - Shapefiles take their CRS from the `.prj` companion

use geoshift_core::formats::*;
use geoshift_core::models::{Crs, TARGET_WKT};
use geoshift_core::GeoshiftError;
use std::fs;
use tempfile::TempDir;

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

#[tokio::test]
async fn test_geojson_with_crs() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("test.geojson");
    fs::write(
        &file_path,
        r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}, "properties": {}}
        ]
    }"#,
    )
    .unwrap();

    let result = GeoJsonReader
        .read(&SourceFiles::new(&file_path, "test.geojson"))
        .await
        .unwrap();

    assert_eq!(result.crs.unwrap().code, Some(3857), "Should extract EPSG:3857 from CRS field");
}

#[tokio::test]
async fn test_geojson_without_crs_defaults_to_4326() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("test.json");
    fs::write(
        &file_path,
        r#"{"type": "FeatureCollection", "features": []}"#,
    )
    .unwrap();

    let result = FormatRegistry::default()
        .read(&SourceFiles::new(&file_path, "test.json"))
        .await
        .unwrap();

    assert_eq!(result.crs, Some(Crs::wgs84()));
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_shapefile_round_trip_keeps_prj_crs() {
    let temp_dir = TempDir::new().unwrap();
    let features = vec![
        geoshift_core::models::Feature::new(Some(geo::Geometry::Point(geo::Point::new(-74.1, 4.6)))),
        geoshift_core::models::Feature::new(Some(geo::Geometry::Point(geo::Point::new(-75.5, 6.2)))),
    ];
    let collection = geoshift_core::models::FeatureCollection::new(
        "cities",
        "GeoJSON",
        Some(Crs::target()),
        vec![],
        features,
    );

    let out = temp_dir.path().join("out");
    ShapefileWriter::new(TARGET_WKT).write(&collection, &out).unwrap();

    let source = SourceFiles::new(out.join("processed.shp"), "processed.shp")
        .with_companion("shx", out.join("processed.shx"))
        .with_companion("prj", out.join("processed.prj"))
        .with_companion("dbf", out.join("processed.dbf"));

    let result = FormatRegistry::default().read(&source).await.unwrap();

    assert_eq!(result.format_name, "Shapefile");
    assert_eq!(result.crs.as_ref().unwrap().code, Some(4686));
    assert_eq!(result.len(), 2);
}

#[tokio::test]
async fn test_shapefile_esri_prj_and_missing_dbf() {
    let temp_dir = TempDir::new().unwrap();
    let collection = geoshift_core::models::FeatureCollection::new(
        "lines",
        "GeoJSON",
        Some(Crs::wgs84()),
        vec![],
        vec![geoshift_core::models::Feature::new(Some(geo::Geometry::LineString(
            vec![(0.0, 0.0), (1.0, 1.0)].into(),
        )))],
    );

    let out = temp_dir.path().join("out");
    ShapefileWriter::new(WGS84_PRJ).write(&collection, &out).unwrap();

    // Only the mandatory companions are registered
    let source = SourceFiles::new(out.join("processed.shp"), "lines.shp")
        .with_companion("shx", out.join("processed.shx"))
        .with_companion("prj", out.join("processed.prj"));

    let result = FormatRegistry::default().read(&source).await.unwrap();

    assert_eq!(result.name, "lines");
    assert_eq!(result.crs.unwrap().code, Some(4326));
    assert!(result.columns.is_empty());
}

#[tokio::test]
async fn test_shapefile_without_prj_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    let shp = temp_dir.path().join("a.shp");
    fs::write(&shp, b"stub").unwrap();

    let err = FormatRegistry::default()
        .read(&SourceFiles::new(&shp, "a.shp"))
        .await
        .unwrap_err();

    match err {
        GeoshiftError::FormatValidation { format, reason } => {
            assert_eq!(format, "Shapefile");
            assert!(reason.contains(".prj"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_kml_always_uses_4326() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("test.kml");
    fs::write(
        &file_path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Placemark><Point><coordinates>-74.0,4.6</coordinates></Point></Placemark>
</kml>"#,
    )
    .unwrap();

    let result = FormatRegistry::default()
        .read(&SourceFiles::new(&file_path, "test.kml"))
        .await
        .unwrap();

    assert_eq!(result.crs, Some(Crs::wgs84()));
    assert_eq!(result.len(), 1);
}
