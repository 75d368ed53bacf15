//! KML and KMZ format readers
//!
//! KML is always WGS 84. Placemarks are collected from nested documents and
//! folders; their name, description, folder path and extended data become
//! attributes. A KMZ is a zip archive whose main document (`doc.kml`, or the
//! first `.kml` entry) is read the same way.

use async_trait::async_trait;
use kml::types::{Coord, Element, Geometry as KmlGeometry, Placemark};
use kml::Kml;
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{GeoshiftError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{blocking, FormatReader, FormatValidation, SourceFiles};
use crate::models::{AttributeValue, Crs, Feature, FeatureCollection};

/// KML format reader
pub struct KmlReader;

#[async_trait]
impl FormatReader for KmlReader {
    async fn read(&self, source: &SourceFiles) -> Result<FeatureCollection> {
        let source = source.clone();
        blocking(move || {
            let content = fs::read_to_string(&source.primary).map_err(|e| {
                GeoshiftError::format("KML", format!("Failed to open KML file: {}", e))
            })?;

            parse_kml_document(&content, source.dataset_name(), "KML")
        })
        .await
    }

    fn supported_extensions(&self) -> &[&str] {
        &["kml"]
    }

    fn format_name(&self) -> &str {
        "KML"
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
                FormatValidator::validate_xml_structure(&primary),
            ]))
        })
        .await
    }
}

/// KMZ (zipped KML) format reader
pub struct KmzReader;

impl KmzReader {
    /// Extract the main KML document from the archive
    fn extract_document(path: &Path) -> Result<String> {
        let file = fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| GeoshiftError::format("KMZ", format!("Not a valid KMZ archive: {}", e)))?;

        let names: Vec<String> = archive.file_names().map(String::from).collect();
        let entry = names
            .iter()
            .find(|n| n.eq_ignore_ascii_case("doc.kml"))
            .or_else(|| names.iter().find(|n| n.to_ascii_lowercase().ends_with(".kml")))
            .ok_or_else(|| GeoshiftError::format("KMZ", "Archive contains no .kml document"))?
            .clone();

        let mut content = String::new();
        archive
            .by_name(&entry)
            .map_err(|e| GeoshiftError::format("KMZ", format!("Failed to open {}: {}", entry, e)))?
            .read_to_string(&mut content)?;

        Ok(content)
    }
}

#[async_trait]
impl FormatReader for KmzReader {
    async fn read(&self, source: &SourceFiles) -> Result<FeatureCollection> {
        let source = source.clone();
        blocking(move || {
            let content = KmzReader::extract_document(&source.primary)?;
            parse_kml_document(&content, source.dataset_name(), "KMZ")
        })
        .await
    }

    fn supported_extensions(&self) -> &[&str] {
        &["kmz"]
    }

    fn format_name(&self) -> &str {
        "KMZ"
    }

    async fn validate(&self, source: &SourceFiles) -> Result<FormatValidation> {
        let primary = source.primary.clone();
        blocking(move || {
            let validation = FormatValidator::validate_file_exists(&primary);
            if !validation.is_valid() {
                return Ok(validation);
            }

            let inner = match KmzReader::extract_document(&primary) {
                Ok(content) => FormatValidator::validate_xml_str(&content),
                Err(e) => FormatValidation {
                    errors: vec![e.to_string()],
                    warnings: Vec::new(),
                },
            };

            Ok(FormatValidator::merge_validations(vec![validation, inner]))
        })
        .await
    }
}

fn parse_kml_document(content: &str, name: String, format: &str) -> Result<FeatureCollection> {
    let kml: Kml = content.parse().map_err(|e| GeoshiftError::FormatValidation {
        format: format.to_string(),
        reason: format!("Failed to parse KML: {}", e),
    })?;

    let mut collector = PlacemarkCollector::default();
    collector.visit(&kml, &[])?;

    Ok(FeatureCollection::new(
        name,
        format,
        Some(Crs::wgs84()),
        collector.column_order,
        collector.features,
    ))
}

#[derive(Default)]
struct PlacemarkCollector {
    features: Vec<Feature>,
    column_order: Vec<String>,
}

impl PlacemarkCollector {
    /// Walk documents and folders, keeping the folder hierarchy
    fn visit(&mut self, kml: &Kml, folder_path: &[String]) -> Result<()> {
        match kml {
            Kml::KmlDocument(doc) => {
                for element in &doc.elements {
                    self.visit(element, folder_path)?;
                }
            }
            Kml::Document { elements, .. } => {
                for element in elements {
                    self.visit(element, folder_path)?;
                }
            }
            Kml::Folder { attrs, elements } => {
                let mut path = folder_path.to_vec();
                if let Some(name) = container_name(elements).or_else(|| attrs.get("name").cloned())
                {
                    path.push(name);
                }
                for element in elements {
                    self.visit(element, &path)?;
                }
            }
            Kml::Placemark(placemark) => self.add_placemark(placemark, folder_path)?,
            _ => {}
        }

        Ok(())
    }

    fn add_placemark(&mut self, placemark: &Placemark, folder_path: &[String]) -> Result<()> {
        let geometry = placemark
            .geometry
            .as_ref()
            .map(|g| convert_geometry(g, self.features.len()))
            .transpose()?;

        let mut feature = Feature::new(geometry);

        if let Some(name) = &placemark.name {
            self.set(&mut feature, "name", AttributeValue::Text(name.clone()));
        }
        if let Some(description) = &placemark.description {
            self.set(&mut feature, "description", AttributeValue::Text(description.clone()));
        }
        if !folder_path.is_empty() {
            self.set(&mut feature, "folder_path", AttributeValue::Text(folder_path.join("/")));
        }

        for child in placemark.children.iter().filter(|c| c.name == "ExtendedData") {
            for (key, value) in extended_data(child) {
                let value = value.map(AttributeValue::Text).unwrap_or(AttributeValue::Null);
                self.set(&mut feature, &key, value);
            }
        }

        self.features.push(feature);
        Ok(())
    }

    fn set(&mut self, feature: &mut Feature, key: &str, value: AttributeValue) {
        if !self.column_order.iter().any(|c| c == key) {
            self.column_order.push(key.to_string());
        }
        feature.properties.insert(key.to_string(), value);
    }
}

/// `<name>` child of a document or folder
fn container_name(elements: &[Kml]) -> Option<String> {
    elements.iter().find_map(|e| match e {
        Kml::Element(el) if el.name == "name" => el.content.clone(),
        _ => None,
    })
}

/// Pairs from `<Data name="k"><value>v</value></Data>` and
/// `<SchemaData><SimpleData name="k">v</SimpleData></SchemaData>`
fn extended_data(element: &Element) -> Vec<(String, Option<String>)> {
    let mut pairs = Vec::new();

    for child in &element.children {
        match child.name.as_str() {
            "Data" => {
                if let Some(key) = child.attrs.get("name") {
                    let value = child
                        .children
                        .iter()
                        .find(|c| c.name == "value")
                        .and_then(|c| c.content.clone());
                    pairs.push((key.clone(), value));
                }
            }
            "SchemaData" => {
                for simple in child.children.iter().filter(|c| c.name == "SimpleData") {
                    if let Some(key) = simple.attrs.get("name") {
                        pairs.push((key.clone(), simple.content.clone()));
                    }
                }
            }
            _ => {}
        }
    }

    pairs
}

fn convert_geometry(geometry: &KmlGeometry, idx: usize) -> Result<geo::Geometry<f64>> {
    match geometry {
        KmlGeometry::Point(point) => Ok(geo::Geometry::Point(to_point(&point.coord))),
        KmlGeometry::LineString(line) => Ok(geo::Geometry::LineString(to_line(&line.coords))),
        KmlGeometry::LinearRing(ring) => Ok(geo::Geometry::LineString(to_line(&ring.coords))),
        KmlGeometry::Polygon(polygon) => Ok(geo::Geometry::Polygon(geo::Polygon::new(
            to_line(&polygon.outer.coords),
            polygon.inner.iter().map(|ring| to_line(&ring.coords)).collect(),
        ))),
        KmlGeometry::MultiGeometry(multi) => {
            let members = multi
                .geometries
                .iter()
                .map(|g| convert_geometry(g, idx))
                .collect::<Result<Vec<_>>>()?;
            Ok(collapse_multi_geometry(members))
        }
        _ => Err(GeoshiftError::format(
            "KML",
            format!("Unsupported geometry type at placemark {}", idx),
        )),
    }
}

/// Homogeneous members become the matching Multi* type, anything else a
/// GeometryCollection.
fn collapse_multi_geometry(members: Vec<geo::Geometry<f64>>) -> geo::Geometry<f64> {
    if !members.is_empty() {
        if members.iter().all(|g| matches!(g, geo::Geometry::Point(_))) {
            let points = members
                .into_iter()
                .filter_map(|g| geo::Point::try_from(g).ok())
                .collect::<Vec<_>>();
            return geo::Geometry::MultiPoint(geo::MultiPoint::new(points));
        }
        if members.iter().all(|g| matches!(g, geo::Geometry::LineString(_))) {
            let lines = members
                .into_iter()
                .filter_map(|g| geo::LineString::try_from(g).ok())
                .collect::<Vec<_>>();
            return geo::Geometry::MultiLineString(geo::MultiLineString::new(lines));
        }
        if members.iter().all(|g| matches!(g, geo::Geometry::Polygon(_))) {
            let polygons = members
                .into_iter()
                .filter_map(|g| geo::Polygon::try_from(g).ok())
                .collect::<Vec<_>>();
            return geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons));
        }
    }

    geo::Geometry::GeometryCollection(geo::GeometryCollection::new_from(members))
}

fn to_point(coord: &Coord) -> geo::Point<f64> {
    geo::Point::new(coord.x, coord.y)
}

fn to_line(coords: &[Coord]) -> geo::LineString<f64> {
    coords.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>().into()
}
