//! ESRI Shapefile writer
//!
//! Writes a feature collection as `processed.{shp,shx,dbf,prj,cpg}` into an
//! output directory. All features must map onto one shape type and every
//! feature needs a geometry.

use chrono::Datelike;
use geo::Winding;
use shapefile::dbase::{self, FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::record::EsriShape;
use shapefile::{Multipoint, Point, Polygon, PolygonRing, Polyline};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GeoshiftError, Result};
use crate::models::{AttributeValue, ColumnKind, FeatureCollection, GeometryType};

/// File stem of every written Shapefile
pub const OUTPUT_STEM: &str = "processed";

const MAX_FIELD_NAME: usize = 10;
const MAX_CHARACTER_LEN: usize = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeKind {
    Point,
    MultiPoint,
    Polyline,
    Polygon,
}

impl ShapeKind {
    fn of(geometry: &geo::Geometry<f64>, idx: usize) -> Result<Self> {
        match GeometryType::of(geometry) {
            GeometryType::Point => Ok(ShapeKind::Point),
            GeometryType::MultiPoint => Ok(ShapeKind::MultiPoint),
            GeometryType::LineString | GeometryType::MultiLineString => Ok(ShapeKind::Polyline),
            GeometryType::Polygon | GeometryType::MultiPolygon => Ok(ShapeKind::Polygon),
            GeometryType::GeometryCollection => Err(GeoshiftError::Serialization(format!(
                "GeometryCollection at feature {} cannot be written to a Shapefile",
                idx
            ))),
        }
    }
}

/// Shapefile writer with a fixed projection definition
pub struct ShapefileWriter {
    prj_wkt: String,
}

struct Field {
    column: String,
    dbf_name: String,
    kind: ColumnKind,
}

impl ShapefileWriter {
    /// Writer whose `.prj` will contain `prj_wkt`
    pub fn new(prj_wkt: impl Into<String>) -> Self {
        Self { prj_wkt: prj_wkt.into() }
    }

    /// Write `collection` into `dir` and return the written files, sorted.
    ///
    /// Datetime columns are rejected; normalize them to dates first.
    pub fn write(&self, collection: &FeatureCollection, dir: &Path) -> Result<Vec<PathBuf>> {
        if collection.is_empty() {
            return Err(GeoshiftError::Serialization(
                "Collection has no features to write".to_string(),
            ));
        }

        let kind = self.shape_kind(collection)?;
        let fields = self.plan_fields(collection)?;
        let table = self.table_builder(&fields)?;
        let records = collection
            .features
            .iter()
            .map(|feature| {
                let mut record = Record::default();
                for field in &fields {
                    record.insert(
                        field.dbf_name.clone(),
                        field_value(
                            feature.properties.get(&field.column).unwrap_or(&AttributeValue::Null),
                            field.kind,
                        ),
                    );
                }
                record
            })
            .collect::<Vec<_>>();

        fs::create_dir_all(dir)?;
        let shp_path = dir.join(format!("{}.shp", OUTPUT_STEM));
        let geometries = collection.features.iter().filter_map(|f| f.geometry.as_ref());

        match kind {
            ShapeKind::Point => {
                let shapes = geometries.filter_map(to_point).collect::<Vec<_>>();
                write_shapes(&shp_path, table, &shapes, &records)?;
            }
            ShapeKind::MultiPoint => {
                let shapes = geometries.filter_map(to_multipoint).collect::<Vec<_>>();
                write_shapes(&shp_path, table, &shapes, &records)?;
            }
            ShapeKind::Polyline => {
                let shapes = geometries
                    .enumerate()
                    .map(|(idx, g)| to_polyline(g, idx))
                    .collect::<Result<Vec<_>>>()?;
                write_shapes(&shp_path, table, &shapes, &records)?;
            }
            ShapeKind::Polygon => {
                let shapes = geometries.filter_map(to_polygon).collect::<Vec<_>>();
                write_shapes(&shp_path, table, &shapes, &records)?;
            }
        }

        fs::write(dir.join(format!("{}.prj", OUTPUT_STEM)), &self.prj_wkt)?;
        fs::write(dir.join(format!("{}.cpg", OUTPUT_STEM)), "UTF-8")?;

        let mut written: Vec<PathBuf> = ["shp", "shx", "dbf", "prj", "cpg"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", OUTPUT_STEM, ext)))
            .collect();
        written.sort();

        tracing::debug!(
            dir = %dir.display(),
            features = collection.len(),
            shape = ?kind,
            "Wrote Shapefile"
        );

        Ok(written)
    }

    /// The single shape kind shared by every feature
    fn shape_kind(&self, collection: &FeatureCollection) -> Result<ShapeKind> {
        let mut kind: Option<ShapeKind> = None;

        for (idx, feature) in collection.features.iter().enumerate() {
            let geometry = feature.geometry.as_ref().ok_or_else(|| {
                GeoshiftError::Serialization(format!("Feature {} has no geometry", idx))
            })?;
            let this = ShapeKind::of(geometry, idx)?;
            match kind {
                None => kind = Some(this),
                Some(existing) if existing != this => {
                    return Err(GeoshiftError::Serialization(format!(
                        "Mixed geometry kinds: {:?} and {:?} cannot share one Shapefile",
                        existing, this
                    )))
                }
                Some(_) => {}
            }
        }

        kind.ok_or_else(|| GeoshiftError::Serialization("Collection has no geometries".to_string()))
    }

    fn plan_fields(&self, collection: &FeatureCollection) -> Result<Vec<Field>> {
        let mut taken = HashSet::new();
        let mut fields = Vec::with_capacity(collection.columns.len());

        for column in &collection.columns {
            if column.kind == ColumnKind::DateTime {
                return Err(GeoshiftError::Serialization(format!(
                    "Column '{}' holds date-times, which dBase cannot store",
                    column.name
                )));
            }
            let dbf_name = dbf_field_name(&column.name, &mut taken);
            fields.push(Field {
                column: column.name.clone(),
                dbf_name,
                kind: column.kind,
            });
        }

        Ok(fields)
    }

    fn table_builder(&self, fields: &[Field]) -> Result<TableWriterBuilder> {
        let mut builder = TableWriterBuilder::new();

        for field in fields {
            let name = FieldName::try_from(field.dbf_name.as_str()).map_err(|_| {
                GeoshiftError::Serialization(format!("Invalid dBase field name '{}'", field.dbf_name))
            })?;
            builder = match field.kind {
                ColumnKind::Text => builder.add_character_field(name, MAX_CHARACTER_LEN as u8),
                ColumnKind::Integer => builder.add_numeric_field(name, 18, 0),
                ColumnKind::Float => builder.add_numeric_field(name, 24, 15),
                ColumnKind::Boolean => builder.add_logical_field(name),
                ColumnKind::Date | ColumnKind::DateTime => builder.add_date_field(name),
            };
        }

        Ok(builder)
    }
}

fn write_shapes<S: EsriShape>(
    path: &Path,
    table: TableWriterBuilder,
    shapes: &[S],
    records: &[Record],
) -> Result<()> {
    let mut writer = shapefile::Writer::from_path(path, table)
        .map_err(|e| GeoshiftError::Serialization(format!("Failed to create Shapefile: {}", e)))?;

    for (shape, record) in shapes.iter().zip(records) {
        writer
            .write_shape_and_record(shape, record)
            .map_err(|e| GeoshiftError::Serialization(format!("Failed to write feature: {}", e)))?;
    }

    Ok(())
}

/// dBase names: at most 10 bytes, unique ignoring case
fn dbf_field_name(column: &str, taken: &mut HashSet<String>) -> String {
    let base = if column.is_empty() { "field" } else { column };

    let mut candidate = truncate_bytes(base, MAX_FIELD_NAME).to_string();
    let mut n = 1;
    while taken.contains(&candidate.to_ascii_uppercase()) {
        let suffix = format!("_{}", n);
        candidate = format!("{}{}", truncate_bytes(base, MAX_FIELD_NAME - suffix.len()), suffix);
        n += 1;
    }

    taken.insert(candidate.to_ascii_uppercase());
    candidate
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn field_value(value: &AttributeValue, kind: ColumnKind) -> FieldValue {
    match kind {
        ColumnKind::Text => FieldValue::Character(
            value.to_text().map(|s| truncate_bytes(&s, MAX_CHARACTER_LEN).to_string()),
        ),
        ColumnKind::Integer | ColumnKind::Float => FieldValue::Numeric(match value {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }),
        ColumnKind::Boolean => FieldValue::Logical(match value {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }),
        ColumnKind::Date | ColumnKind::DateTime => FieldValue::Date(match value {
            AttributeValue::Date(d) => Some(dbase::Date::new(d.day(), d.month(), d.year() as u32)),
            _ => None,
        }),
    }
}

fn point_of(c: geo::Coord<f64>) -> Point {
    Point::new(c.x, c.y)
}

fn to_point(geometry: &geo::Geometry<f64>) -> Option<Point> {
    match geometry {
        geo::Geometry::Point(p) => Some(point_of(p.0)),
        _ => None,
    }
}

fn to_multipoint(geometry: &geo::Geometry<f64>) -> Option<Multipoint> {
    match geometry {
        geo::Geometry::MultiPoint(mp) => Some(Multipoint::new(mp.iter().map(|p| point_of(p.0)).collect())),
        _ => None,
    }
}

fn to_polyline(geometry: &geo::Geometry<f64>, idx: usize) -> Result<Polyline> {
    let lines: Vec<geo::LineString<f64>> = match geometry {
        geo::Geometry::Line(line) => vec![vec![line.start, line.end].into()],
        geo::Geometry::LineString(ls) => vec![ls.clone()],
        geo::Geometry::MultiLineString(mls) => mls.0.clone(),
        _ => Vec::new(),
    };

    if lines.is_empty() || lines.iter().any(|l| l.0.len() < 2) {
        return Err(GeoshiftError::Serialization(format!(
            "Line at feature {} needs at least two points per part",
            idx
        )));
    }

    Ok(Polyline::with_parts(
        lines.iter().map(|l| l.coords().copied().map(point_of).collect()).collect(),
    ))
}

fn to_polygon(geometry: &geo::Geometry<f64>) -> Option<Polygon> {
    let polygons: Vec<geo::Polygon<f64>> = match geometry {
        geo::Geometry::Polygon(p) => vec![p.clone()],
        geo::Geometry::Rect(r) => vec![r.to_polygon()],
        geo::Geometry::Triangle(t) => vec![t.to_polygon()],
        geo::Geometry::MultiPolygon(mp) => mp.0.clone(),
        _ => return None,
    };

    // Shapefile rings: outer clockwise, holes counter-clockwise
    let mut rings = Vec::new();
    for polygon in polygons {
        let (mut exterior, interiors) = polygon.into_inner();
        exterior.make_cw_winding();
        rings.push(PolygonRing::Outer(exterior.coords().copied().map(point_of).collect()));
        for mut interior in interiors {
            interior.make_ccw_winding();
            rings.push(PolygonRing::Inner(interior.coords().copied().map(point_of).collect()));
        }
    }

    Some(Polygon::with_rings(rings))
}
