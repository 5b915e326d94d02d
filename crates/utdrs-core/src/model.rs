//! Typed telemetry data model
//!
//! データ種別タグ、列スキーマ、型付き値、正規化済みレコード

use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::DetectionError;

/// Telemetry family a dataset belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Network,
    Endpoint,
    Authentication,
    Email,
    ThreatIntelligence,
}

impl DataType {
    /// Every recognized data type, in declaration order
    pub const ALL: [DataType; 5] = [
        DataType::Network,
        DataType::Endpoint,
        DataType::Authentication,
        DataType::Email,
        DataType::ThreatIntelligence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Network => "network",
            DataType::Endpoint => "endpoint",
            DataType::Authentication => "authentication",
            DataType::Email => "email",
            DataType::ThreatIntelligence => "threat_intelligence",
        }
    }

    /// Comma separated list of valid tags, for client-facing messages
    pub fn valid_tags() -> String {
        DataType::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DetectionError::UnknownDataType(s.to_string()))
    }
}

/// Semantic type of a canonical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Timestamp,
    Text,
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered column layout of a record set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    /// Positions and names of every numeric column
    pub fn numeric_columns(&self) -> Vec<(usize, &str)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ColumnKind::Numeric)
            .map(|(i, c)| (i, c.name.as_str()))
            .collect()
    }

    /// Copy of this schema with one more trailing column
    pub fn with_column(&self, column: ColumnSpec) -> Schema {
        let mut columns = self.columns.clone();
        columns.push(column);
        Schema { columns }
    }
}

/// Typed cell value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

// Floats compare bitwise so that rows can be deduplicated by full equality
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Text(s) => s.hash(state),
            Value::Number(n) => n.to_bits().hash(state),
            Value::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(""),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_OUTPUT_FORMAT)),
        }
    }
}

const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// Largest integer a JSON number round-trips exactly
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Timestamp(ts) => {
                serializer.collect_str(&ts.format(TIMESTAMP_OUTPUT_FORMAT))
            }
        }
    }
}

/// One normalized row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    /// Zero-based position of the row in the source dataset
    pub index: usize,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(index: usize, values: Vec<Value>) -> Self {
        Self { index, values }
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }
}

/// Schema plus rows; serializes as a JSON array of objects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    schema: Schema,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Value of `column` in row `row`
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let position = self.schema.position(column)?;
        self.records.get(row)?.get(position)
    }

    /// All values of one column, in row order
    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        match self.schema.position(column) {
            Some(position) => self
                .records
                .iter()
                .filter_map(|r| r.get(position))
                .collect(),
            None => Vec::new(),
        }
    }
}

struct RowRef<'a> {
    schema: &'a Schema,
    record: &'a Record,
}

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.schema.len()))?;
        for (spec, value) in self.schema.columns().iter().zip(&self.record.values) {
            map.serialize_entry(&spec.name, value)?;
        }
        map.end()
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(&RowRef {
                schema: &self.schema,
                record,
            })?;
        }
        seq.end()
    }
}

/// Normalized, typed view of a raw dataset for one data type
#[derive(Debug, Clone)]
pub struct CanonicalProjection {
    data_type: DataType,
    rows: RecordSet,
}

impl CanonicalProjection {
    pub fn new(data_type: DataType, schema: Schema, records: Vec<Record>) -> Self {
        Self {
            data_type,
            rows: RecordSet::new(schema, records),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn schema(&self) -> &Schema {
        self.rows.schema()
    }

    pub fn records(&self) -> &[Record] {
        self.rows.records()
    }

    pub fn rows(&self) -> &RecordSet {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
