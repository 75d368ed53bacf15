//! In-memory feature collection produced by the format readers.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::crs::Crs;

/// Typed attribute value of a single feature
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl AttributeValue {
    /// Column kind this value implies, `None` for nulls
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Text(_) => Some(ColumnKind::Text),
            AttributeValue::Integer(_) => Some(ColumnKind::Integer),
            AttributeValue::Float(_) => Some(ColumnKind::Float),
            AttributeValue::Boolean(_) => Some(ColumnKind::Boolean),
            AttributeValue::Date(_) => Some(ColumnKind::Date),
            AttributeValue::DateTime(_) => Some(ColumnKind::DateTime),
        }
    }

    /// JSON representation, dates as ISO 8601 strings
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Null => serde_json::Value::Null,
            AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
            AttributeValue::Integer(i) => serde_json::Value::from(*i),
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::Boolean(b) => serde_json::Value::Bool(*b),
            AttributeValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            AttributeValue::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }

    /// Plain text rendering used when a value lands in a text column
    pub fn to_text(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Text(s) => Some(s.clone()),
            other => match other.to_json() {
                serde_json::Value::String(s) => Some(s),
                value => Some(value.to_string()),
            },
        }
    }
}

/// Attribute column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ColumnKind {
    /// Widen two observed kinds into one that holds both
    pub fn merge(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            (Date, DateTime) | (DateTime, Date) => DateTime,
            _ => Text,
        }
    }

    pub fn is_temporal_with_time(&self) -> bool {
        matches!(self, ColumnKind::DateTime)
    }
}

/// Attribute column of a feature collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// A geometry plus its attribute record
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<geo::Geometry<f64>>,
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: Option<geo::Geometry<f64>>) -> Self {
        Self { geometry, properties: BTreeMap::new() }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// Ingested geometries + attribute columns + CRS tag, held in memory
/// for the duration of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    /// Dataset name, usually the input file stem
    pub name: String,

    /// Format the collection was read from (e.g. "Shapefile")
    pub format_name: String,

    /// Source CRS, `None` when the input carries no CRS information
    pub crs: Option<Crs>,

    /// Ordered attribute schema
    pub columns: Vec<Column>,

    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Build a collection and infer its column schema.
    ///
    /// `column_order` lists column names in source order; names not listed
    /// there are appended in the order they are first seen.
    pub fn new(
        name: impl Into<String>,
        format_name: impl Into<String>,
        crs: Option<Crs>,
        column_order: Vec<String>,
        features: Vec<Feature>,
    ) -> Self {
        let mut order = column_order;
        for feature in &features {
            for key in feature.properties.keys() {
                if !order.contains(key) {
                    order.push(key.clone());
                }
            }
        }

        let columns = order
            .into_iter()
            .map(|name| {
                let kind = features
                    .iter()
                    .filter_map(|f| f.properties.get(&name).and_then(AttributeValue::kind))
                    .reduce(ColumnKind::merge)
                    .unwrap_or(ColumnKind::Text);
                Column { name, kind }
            })
            .collect();

        Self {
            name: name.into(),
            format_name: format_name.into(),
            crs,
            columns,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Coerce every datetime column to date-only values.
    ///
    /// Time of day is dropped. Returns the names of the columns that changed.
    pub fn normalize_temporal_columns(&mut self) -> Vec<String> {
        let mut changed = Vec::new();

        for column in self.columns.iter_mut().filter(|c| c.kind.is_temporal_with_time()) {
            column.kind = ColumnKind::Date;
            for feature in &mut self.features {
                if let Some(value) = feature.properties.get_mut(&column.name) {
                    if let AttributeValue::DateTime(dt) = value {
                        *value = AttributeValue::Date(dt.date());
                    }
                }
            }
            changed.push(column.name.clone());
        }

        changed
    }
}
