//! GeoJSON format reader implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;

use crate::error::{GeoshiftError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{blocking, FormatReader, FormatValidation, SourceFiles};
use crate::models::{AttributeValue, Crs, Feature, FeatureCollection};

const FORMAT: &str = "GeoJSON";

/// GeoJSON format reader
pub struct GeoJsonReader;

#[async_trait]
impl FormatReader for GeoJsonReader {
    async fn read(&self, source: &SourceFiles) -> Result<FeatureCollection> {
        let source = source.clone();
        blocking(move || read_geojson(&source)).await
    }

    fn supported_extensions(&self) -> &[&str] {
        &["geojson", "json"]
    }

    fn format_name(&self) -> &str {
        FORMAT
    }

    async fn validate(&self, source: &SourceFiles) -> Result<FormatValidation> {
        let primary = source.primary.clone();
        blocking(move || {
            let validation = FormatValidator::validate_file_exists(&primary);
            if !validation.is_valid() {
                return Ok(validation);
            }

            Ok(FormatValidator::merge_validations(vec![
                validation,
                FormatValidator::validate_json_structure(&primary),
            ]))
        })
        .await
    }
}

fn read_geojson(source: &SourceFiles) -> Result<FeatureCollection> {
    let content = fs::read_to_string(&source.primary)?;

    let geojson: geojson::GeoJson = content.parse().map_err(|e| GeoshiftError::FormatValidation {
        format: FORMAT.to_string(),
        reason: format!("Failed to parse GeoJSON: {}", e),
    })?;

    let (features, column_order, crs) = extract_features_and_crs(geojson)?;

    Ok(FeatureCollection::new(
        source.dataset_name(),
        FORMAT,
        Some(crs),
        column_order,
        features,
    ))
}

fn extract_features_and_crs(
    geojson: geojson::GeoJson,
) -> Result<(Vec<Feature>, Vec<String>, Crs)> {
    let mut column_order = Vec::new();

    match geojson {
        geojson::GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|fm| fm.get("crs"))
                .and_then(crs_from_member)
                .unwrap_or_else(Crs::wgs84);

            let features = fc
                .features
                .into_iter()
                .enumerate()
                .map(|(idx, feature)| convert_feature(feature, idx, &mut column_order))
                .collect::<Result<Vec<_>>>()?;

            Ok((features, column_order, crs))
        }
        geojson::GeoJson::Feature(feature) => {
            let crs = feature
                .foreign_members
                .as_ref()
                .and_then(|fm| fm.get("crs"))
                .and_then(crs_from_member)
                .unwrap_or_else(Crs::wgs84);
            let feature = convert_feature(feature, 0, &mut column_order)?;
            Ok((vec![feature], column_order, crs))
        }
        geojson::GeoJson::Geometry(geometry) => {
            let geometry = convert_geometry(geometry, 0)?;
            Ok((vec![Feature::new(Some(geometry))], column_order, Crs::wgs84()))
        }
    }
}

fn convert_feature(
    feature: geojson::Feature,
    idx: usize,
    column_order: &mut Vec<String>,
) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(|geometry| convert_geometry(geometry, idx))
        .transpose()?;

    let mut converted = Feature::new(geometry);
    for (key, value) in feature.properties.unwrap_or_default() {
        if !column_order.contains(&key) {
            column_order.push(key.clone());
        }
        converted.properties.insert(key, attribute_from_json(value));
    }

    Ok(converted)
}

fn convert_geometry(geometry: geojson::Geometry, idx: usize) -> Result<geo::Geometry<f64>> {
    geo::Geometry::<f64>::try_from(geometry.value).map_err(|e| {
        GeoshiftError::format(FORMAT, format!("Invalid geometry at feature {}: {}", idx, e))
    })
}

/// Legacy `crs` member: `{"type": "name", "properties": {"name": "EPSG:x"}}`
fn crs_from_member(crs: &serde_json::Value) -> Option<Crs> {
    crs.get("properties")
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str())
        .and_then(Crs::from_identifier)
}

/// Map a JSON property onto a typed attribute, recognising ISO dates and
/// timestamps held in strings.
pub fn attribute_from_json(value: serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null,
        serde_json::Value::Bool(b) => AttributeValue::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Integer(i),
            None => n.as_f64().map(AttributeValue::Float).unwrap_or(AttributeValue::Null),
        },
        serde_json::Value::String(s) => sniff_temporal(&s).unwrap_or(AttributeValue::Text(s)),
        nested => AttributeValue::Text(nested.to_string()),
    }
}

fn sniff_temporal(s: &str) -> Option<AttributeValue> {
    if s.len() < 10 || !s.as_bytes()[..10].iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    }) {
        return None;
    }

    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(AttributeValue::Date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(AttributeValue::DateTime(dt.naive_local()));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(AttributeValue::DateTime)
}

/// Render a collection as a GeoJSON FeatureCollection.
///
/// Attribute values go through [`AttributeValue::to_json`]; features without
/// geometry keep a null geometry.
pub fn to_geojson_collection(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .features
        .iter()
        .map(|feature| {
            let properties: geojson::JsonObject = feature
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();

            geojson::Feature {
                bbox: None,
                geometry: feature
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
