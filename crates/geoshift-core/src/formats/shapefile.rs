//! Shapefile format reader implementation
//!
//! Shapefiles consist of multiple component files. The `.shx` index and the
//! `.prj` projection must be part of the source; the `.dbf` attribute table
//! is optional.

use async_trait::async_trait;
use chrono::NaiveDate;
use shapefile::dbase::FieldValue as DbaseFieldValue;
use shapefile::{PolygonRing, Shape, ShapeReader};
use std::fs::{self, File};
use std::io::BufReader;

use crate::error::{GeoshiftError, Result};
use crate::formats::validation::FormatValidator;
use crate::formats::{blocking, FormatReader, FormatValidation, SourceFiles};
use crate::models::{AttributeValue, Crs, Feature, FeatureCollection};

const FORMAT: &str = "Shapefile";

/// Shapefile format reader
pub struct ShapefileFormatReader;

#[async_trait]
impl FormatReader for ShapefileFormatReader {
    async fn read(&self, source: &SourceFiles) -> Result<FeatureCollection> {
        let source = source.clone();
        blocking(move || ShapefileFormatReader.read_bundle(&source)).await
    }

    fn supported_extensions(&self) -> &[&str] {
        &["shp"]
    }

    fn format_name(&self) -> &str {
        FORMAT
    }

    /// Existence checks only; the files themselves are opened by `read`
    async fn validate(&self, source: &SourceFiles) -> Result<FormatValidation> {
        let validation = FormatValidator::validate_file_exists(&source.primary);
        if !validation.is_valid() {
            return Ok(validation);
        }

        let component_validation =
            FormatValidator::validate_companions(source, &["shx", "prj"], &["dbf"]);

        Ok(FormatValidator::merge_validations(vec![validation, component_validation]))
    }
}

impl ShapefileFormatReader {
    fn read_bundle(&self, source: &SourceFiles) -> Result<FeatureCollection> {
        let crs = self.extract_crs(source)?;

        let shx_path = source
            .companion("shx")
            .ok_or_else(|| GeoshiftError::format(FORMAT, "Missing required component file: .shx"))?;

        let shape_reader = ShapeReader::with_shx(
            BufReader::new(File::open(&source.primary)?),
            BufReader::new(File::open(shx_path)?),
        )
        .map_err(|e| GeoshiftError::format(FORMAT, format!("Failed to open Shapefile: {}", e)))?;

        let (features, column_order) = match source.companion("dbf") {
            Some(dbf_path) if dbf_path.exists() => {
                let dbase_reader = shapefile::dbase::Reader::new(BufReader::new(File::open(dbf_path)?))
                    .map_err(|e| {
                        GeoshiftError::format(FORMAT, format!("Failed to open .dbf file: {}", e))
                    })?;
                let column_order = dbase_reader
                    .fields()
                    .iter()
                    .map(|f| f.name().to_string())
                    .filter(|name| name != "DeletionFlag")
                    .collect();

                let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);
                (self.read_features(&mut reader)?, column_order)
            }
            _ => {
                tracing::debug!(file = %source.logical_name, "No .dbf file, reading geometry only");
                (self.read_shapes(shape_reader)?, Vec::new())
            }
        };

        Ok(FeatureCollection::new(
            source.dataset_name(),
            FORMAT,
            Some(crs),
            column_order,
            features,
        ))
    }

    /// CRS from the `.prj` companion
    fn extract_crs(&self, source: &SourceFiles) -> Result<Crs> {
        let prj_path = source
            .companion("prj")
            .ok_or_else(|| GeoshiftError::format(FORMAT, "Missing required component file: .prj"))?;

        let prj_content = fs::read_to_string(prj_path).map_err(|e| {
            GeoshiftError::format(FORMAT, format!("Failed to read .prj file: {}", e))
        })?;

        if prj_content.trim().is_empty() {
            return Err(GeoshiftError::UndefinedCrs);
        }

        Ok(Crs::from_wkt(&prj_content))
    }

    fn read_features(
        &self,
        reader: &mut shapefile::Reader<BufReader<File>, BufReader<File>>,
    ) -> Result<Vec<Feature>> {
        let mut features = Vec::new();

        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result.map_err(|e| {
                GeoshiftError::format(FORMAT, format!("Failed to read feature: {}", e))
            })?;

            let mut feature = Feature::new(convert_shape(&shape, features.len())?);
            for (name, value) in record {
                feature.properties.insert(name, convert_dbase_value(value));
            }
            features.push(feature);
        }

        Ok(features)
    }

    fn read_shapes(&self, mut reader: ShapeReader<BufReader<File>>) -> Result<Vec<Feature>> {
        let mut features = Vec::new();

        for result in reader.iter_shapes() {
            let shape = result.map_err(|e| {
                GeoshiftError::format(FORMAT, format!("Failed to read shape: {}", e))
            })?;
            features.push(Feature::new(convert_shape(&shape, features.len())?));
        }

        Ok(features)
    }
}

/// Planar access shared by the 2D, M and Z point types; M and Z are dropped.
trait XY {
    fn xy(&self) -> (f64, f64);
}

impl XY for shapefile::Point {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl XY for shapefile::PointM {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl XY for shapefile::PointZ {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

fn to_line<P: XY>(points: &[P]) -> geo::LineString<f64> {
    points.iter().map(XY::xy).collect::<Vec<_>>().into()
}

fn polyline_geometry<P: XY>(parts: &[Vec<P>]) -> geo::Geometry<f64> {
    let mut lines: Vec<geo::LineString<f64>> = parts.iter().map(|p| to_line(p)).collect();
    if lines.len() == 1 {
        geo::Geometry::LineString(lines.remove(0))
    } else {
        geo::Geometry::MultiLineString(geo::MultiLineString::new(lines))
    }
}

/// Each outer ring starts a polygon; inner rings attach to the preceding one.
fn polygon_geometry<P: XY>(rings: &[PolygonRing<P>], idx: usize) -> Result<geo::Geometry<f64>> {
    let mut polygons: Vec<(geo::LineString<f64>, Vec<geo::LineString<f64>>)> = Vec::new();

    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push((to_line(points), Vec::new())),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some((_, holes)) => holes.push(to_line(points)),
                None => {
                    return Err(GeoshiftError::format(
                        FORMAT,
                        format!("Polygon at feature {} starts with an inner ring", idx),
                    ))
                }
            },
        }
    }

    let mut polygons: Vec<geo::Polygon<f64>> = polygons
        .into_iter()
        .map(|(exterior, holes)| geo::Polygon::new(exterior, holes))
        .collect();

    if polygons.len() == 1 {
        Ok(geo::Geometry::Polygon(polygons.remove(0)))
    } else {
        Ok(geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons)))
    }
}

fn multipoint_geometry<P: XY>(points: &[P]) -> geo::Geometry<f64> {
    geo::Geometry::MultiPoint(
        points
            .iter()
            .map(|p| geo::Point::from(p.xy()))
            .collect::<Vec<_>>()
            .into(),
    )
}

/// Convert a shape to a geometry; null shapes have none
fn convert_shape(shape: &Shape, idx: usize) -> Result<Option<geo::Geometry<f64>>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => geo::Geometry::Point(p.xy().into()),
        Shape::PointM(p) => geo::Geometry::Point(p.xy().into()),
        Shape::PointZ(p) => geo::Geometry::Point(p.xy().into()),
        Shape::Polyline(line) => polyline_geometry(line.parts()),
        Shape::PolylineM(line) => polyline_geometry(line.parts()),
        Shape::PolylineZ(line) => polyline_geometry(line.parts()),
        Shape::Polygon(polygon) => polygon_geometry(polygon.rings(), idx)?,
        Shape::PolygonM(polygon) => polygon_geometry(polygon.rings(), idx)?,
        Shape::PolygonZ(polygon) => polygon_geometry(polygon.rings(), idx)?,
        Shape::Multipoint(mp) => multipoint_geometry(mp.points()),
        Shape::MultipointM(mp) => multipoint_geometry(mp.points()),
        Shape::MultipointZ(mp) => multipoint_geometry(mp.points()),
        Shape::Multipatch(_) => {
            return Err(GeoshiftError::format(
                FORMAT,
                format!("Multipatch geometry at feature {} is not supported", idx),
            ))
        }
    };

    Ok(Some(geometry))
}

/// Convert dBase field value to a typed attribute
fn convert_dbase_value(value: DbaseFieldValue) -> AttributeValue {
    match value {
        DbaseFieldValue::Character(Some(s)) => AttributeValue::Text(s),
        DbaseFieldValue::Memo(s) => AttributeValue::Text(s),
        DbaseFieldValue::Numeric(Some(n)) => numeric_attribute(n),
        DbaseFieldValue::Float(Some(f)) => AttributeValue::Float(f as f64),
        DbaseFieldValue::Double(d) => AttributeValue::Float(d),
        DbaseFieldValue::Currency(c) => AttributeValue::Float(c),
        DbaseFieldValue::Integer(i) => AttributeValue::Integer(i as i64),
        DbaseFieldValue::Logical(Some(b)) => AttributeValue::Boolean(b),
        DbaseFieldValue::Date(Some(date)) => dbase_date(&date),
        // dBase timestamps keep their calendar date only
        DbaseFieldValue::DateTime(dt) => dbase_date(&dt.date()),
        _ => AttributeValue::Null,
    }
}

/// Whole numbers read from numeric fields are integers
fn numeric_attribute(n: f64) -> AttributeValue {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        AttributeValue::Integer(n as i64)
    } else {
        AttributeValue::Float(n)
    }
}

fn dbase_date(date: &shapefile::dbase::Date) -> AttributeValue {
    NaiveDate::from_ymd_opt(date.year() as i32, date.month(), date.day())
        .map(AttributeValue::Date)
        .unwrap_or(AttributeValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeometryType;

    #[test]
    fn test_supported_extensions() {
        let reader = ShapefileFormatReader;
        assert_eq!(reader.supported_extensions(), &["shp"]);
        assert_eq!(reader.format_name(), "Shapefile");
    }

    #[tokio::test]
    async fn test_validation_missing_companions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let shp = temp_dir.path().join("a.shp");
        fs::write(&shp, b"stub").unwrap();

        let validation = ShapefileFormatReader
            .validate(&SourceFiles::new(&shp, "a.shp"))
            .await
            .unwrap();

        assert_eq!(validation.errors.len(), 2);
        assert!(validation.has_warnings());
    }

    #[test]
    fn test_polygon_rings_split_into_multipolygon() {
        let square = |o: f64| {
            vec![
                shapefile::Point::new(o, o),
                shapefile::Point::new(o, o + 1.0),
                shapefile::Point::new(o + 1.0, o + 1.0),
                shapefile::Point::new(o, o),
            ]
        };
        let rings = vec![PolygonRing::Outer(square(0.0)), PolygonRing::Outer(square(5.0))];
        let geometry = polygon_geometry(&rings, 0).unwrap();
        assert_eq!(GeometryType::of(&geometry), GeometryType::MultiPolygon);

        let rings = vec![PolygonRing::Outer(square(0.0)), PolygonRing::Inner(square(0.2))];
        let geometry = polygon_geometry(&rings, 0).unwrap();
        assert_eq!(GeometryType::of(&geometry), GeometryType::Polygon);

        let rings = vec![PolygonRing::Inner(square(0.0))];
        assert!(polygon_geometry(&rings, 3).is_err());
    }

    #[test]
    fn test_null_shape_has_no_geometry() {
        assert_eq!(convert_shape(&Shape::NullShape, 0).unwrap(), None);
    }

    #[test]
    fn test_convert_dbase_values() {
        assert_eq!(convert_dbase_value(DbaseFieldValue::Numeric(Some(12.0))), AttributeValue::Integer(12));
        assert_eq!(convert_dbase_value(DbaseFieldValue::Numeric(Some(1.5))), AttributeValue::Float(1.5));
        assert_eq!(convert_dbase_value(DbaseFieldValue::Character(None)), AttributeValue::Null);
        assert_eq!(
            convert_dbase_value(DbaseFieldValue::Date(Some(shapefile::dbase::Date::new(9, 3, 2024)))),
            AttributeValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        );
    }
}
