//! End-to-end tests driving the router in-process
//!
//! Every test gets its own storage root, so tests never see each other's
//! artifacts.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use geo::polygon;
use geoshift_api::{create_router, AppState};
use geoshift_core::formats::ShapefileWriter;
use geoshift_core::models::{Feature, FeatureCollection};
use geoshift_store::ArtifactStore;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "geoshift-test-boundary";

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

const TWO_PART_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>split parcel</name>
      <MultiGeometry>
        <Polygon><outerBoundaryIs><LinearRing>
          <coordinates>-74.1,4.6 -74.0,4.6 -74.0,4.7 -74.1,4.6</coordinates>
        </LinearRing></outerBoundaryIs></Polygon>
        <Polygon><outerBoundaryIs><LinearRing>
          <coordinates>-73.9,4.6 -73.8,4.6 -73.8,4.7 -73.9,4.6</coordinates>
        </LinearRing></outerBoundaryIs></Polygon>
      </MultiGeometry>
    </Placemark>
  </Document>
</kml>"#;

const MERCATOR_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
  "features": [
    {"type": "Feature",
     "geometry": {"type": "Point", "coordinates": [-8237642.318702244, 512620.6540625974]},
     "properties": {"name": "plaza", "visited": "2024-03-01T10:30:00"}}
  ]
}"#;

fn test_app(reaper_delay: Duration) -> (Router, TempDir) {
    test_app_with_retention(reaper_delay, Duration::from_secs(3600))
}

fn test_app_with_retention(reaper_delay: Duration, retention: Duration) -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::open(dir.path().join("store")).unwrap();
    let state = Arc::new(AppState::new(store, reaper_delay).with_retention(retention));
    (create_router(state, 10 * 1024 * 1024), dir)
}

fn stored_entries(dir: &TempDir) -> Vec<String> {
    std::fs::read_dir(dir.path().join("store"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn multipart_request(files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n", name).as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn process_request(request_id: &str, filename: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"requestId": request_id, "filename": filename}).to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// `.shp`, `.shx` and `.prj` of a one-polygon layer in WGS 84
fn polygon_bundle() -> Vec<(String, Vec<u8>)> {
    let dir = TempDir::new().unwrap();
    let square = polygon![
        (x: -74.1, y: 4.6), (x: -74.0, y: 4.6), (x: -74.0, y: 4.7), (x: -74.1, y: 4.7)
    ];
    let collection = FeatureCollection::new(
        "parcels",
        "Shapefile",
        None,
        vec![],
        vec![Feature::new(Some(square.into()))],
    );
    ShapefileWriter::new(WGS84_PRJ).write(&collection, dir.path()).unwrap();

    ["shp", "shx", "prj"]
        .iter()
        .map(|ext| {
            let bytes = std::fs::read(dir.path().join(format!("processed.{}", ext))).unwrap();
            (format!("parcels.{}", ext), bytes)
        })
        .collect()
}

async fn upload(app: &Router, files: &[(&str, &[u8])]) -> Value {
    let (status, body) = send_json(app, multipart_request(files)).await;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _dir) = test_app(Duration::from_secs(20));
    let (status, body) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_shapefile_bundle_scenario() {
    let (app, _dir) = test_app(Duration::from_millis(200));
    let bundle = polygon_bundle();
    let files: Vec<(&str, &[u8])> = bundle.iter().map(|(n, b)| (n.as_str(), b.as_slice())).collect();

    let receipt = upload(&app, &files).await;
    let request_id = receipt["requestId"].as_str().unwrap().to_string();
    assert_eq!(receipt["canonicalFilename"], "parcels.shp");
    assert_eq!(receipt["storedFileNames"][0], format!("{}_parcels.shp", request_id));

    let (status, result) = send_json(&app, process_request(&request_id, "parcels.shp")).await;
    assert_eq!(status, StatusCode::OK, "process failed: {}", result);
    assert_eq!(result["sourceCrs"], "EPSG:4326 - WGS 84");
    assert_eq!(result["targetCrs"], "EPSG:4686 - MAGNA-SIRGAS");
    assert!(result["archivePath"].as_str().unwrap().ends_with(&format!("{}.zip", request_id)));

    let response = app.clone().oneshot(get(&format!("/download/{}", request_id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"result.zip\""
    );
    let archive = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!archive.is_empty());

    let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
    let mut names: Vec<String> = (0..zip.len()).map(|i| zip.by_index(i).unwrap().name().to_string()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["processed.cpg", "processed.dbf", "processed.prj", "processed.shp", "processed.shx"]
    );

    tokio::time::sleep(Duration::from_millis(600)).await;

    let (status, body) = send_json(&app, get(&format!("/download/{}", request_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
}

#[tokio::test]
async fn test_two_part_kml_multipolygon_rejected() {
    let (app, dir) = test_app(Duration::from_secs(20));
    let receipt = upload(&app, &[("zones.kml", TWO_PART_KML.as_bytes())]).await;
    let request_id = receipt["requestId"].as_str().unwrap();

    let (status, body) = send_json(&app, process_request(request_id, "zones.kml")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("MultiPolygon"), "{}", body);
    assert!(!dir.path().join("store").join(request_id).exists());
    assert!(!dir.path().join("store").join(format!("{}.zip", request_id)).exists());
}

#[tokio::test]
async fn test_undelivered_upload_is_purged_after_retention() {
    let (app, dir) = test_app_with_retention(Duration::from_secs(20), Duration::from_millis(150));
    let receipt = upload(&app, &[("zones.kml", TWO_PART_KML.as_bytes())]).await;
    let request_id = receipt["requestId"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, process_request(&request_id, "zones.kml")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stored_entries(&dir).len(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(stored_entries(&dir).is_empty(), "{:?}", stored_entries(&dir));
    let (status, body) = send_json(&app, process_request(&request_id, "zones.kml")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::open(dir.path().join("store")).unwrap();
    let app = create_router(Arc::new(AppState::new(store, Duration::from_secs(20))), 1024);

    let payload = vec![b'x'; 8 * 1024];
    let (status, body) = send(&app, multipart_request(&[("big.geojson", payload.as_slice())])).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{}", String::from_utf8_lossy(&body));
    assert!(stored_entries(&dir).is_empty());

    let (status, _) = send_json(&app, multipart_request(&[("small.geojson", b"{}".as_slice())])).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_incomplete_bundle_lists_missing_extensions() {
    let (app, dir) = test_app(Duration::from_secs(20));
    let bundle = polygon_bundle();

    let (status, body) = send_json(
        &app,
        multipart_request(&[(bundle[0].0.as_str(), bundle[0].1.as_slice())]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required files: .prj, .shx");
    assert_eq!(std::fs::read_dir(dir.path().join("store")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_geojson_reports_source_crs_and_reprocesses() {
    let (app, _dir) = test_app(Duration::from_secs(20));
    let receipt = upload(&app, &[("plaza.geojson", MERCATOR_GEOJSON.as_bytes())]).await;
    let request_id = receipt["requestId"].as_str().unwrap();

    let (status, first) = send_json(&app, process_request(request_id, "plaza.geojson")).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["sourceCrs"], "EPSG:3857 - WGS 84 / Pseudo-Mercator");
    assert_eq!(first["targetCrs"], "EPSG:4686 - MAGNA-SIRGAS");
    let shp_path = std::path::Path::new(first["archivePath"].as_str().unwrap())
        .with_extension("")
        .join("processed.shp");
    let first_shp = std::fs::read(&shp_path).unwrap();

    let (status, second) = send_json(&app, process_request(request_id, "plaza.geojson")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(std::fs::read(&shp_path).unwrap(), first_shp);
}

#[tokio::test]
async fn test_unknown_requests() {
    let (app, _dir) = test_app(Duration::from_secs(20));
    let unknown = "6f1c1d9e-52a4-4a59-9d51-0c8f8fb2b9b1";

    let (status, _) = send_json(&app, get(&format!("/download/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, get("/download/not-a-request")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(&app, process_request(unknown, "a.kml")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["details"].as_str().unwrap().contains(unknown));

    let (status, _) = send_json(&app, get(&format!("/preview/{}?filename=a.kml", unknown))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_preview_renders_map_without_touching_store() {
    let (app, dir) = test_app(Duration::from_secs(20));
    let receipt = upload(&app, &[("plaza.geojson", MERCATOR_GEOJSON.as_bytes())]).await;
    let request_id = receipt["requestId"].as_str().unwrap();
    let before = std::fs::read_dir(dir.path().join("store")).unwrap().count();

    let response = app
        .clone()
        .oneshot(get(&format!("/preview/{}?filename=plaza.geojson", request_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    let html = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(html.contains("Geographic Layer"));
    assert!(html.contains("plaza"));
    assert_eq!(std::fs::read_dir(dir.path().join("store")).unwrap().count(), before);
}
