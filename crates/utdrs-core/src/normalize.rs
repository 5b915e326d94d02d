//! Schema normalization
//!
//! 生レコードをデータ種別ごとの正規化スキーマに変換する
//! (必須列の検証、型変換、派生列の計算)

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::DetectionError;
use crate::model::{CanonicalProjection, ColumnKind, ColumnSpec, DataType, Record, Schema, Value};
use crate::record::RawRecordSet;

/// Name of the network column derived from per-source packet totals
pub const TRAFFIC_VOLUME: &str = "traffic_volume";

const TIMESTAMP: &str = "timestamp";

/// How a raw cell is turned into a typed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Verbatim,
    Number,
    /// Number with an optional trailing `%`
    Percent,
    /// Memory size converted to megabytes (`KB`, `MB`, `GB`, `TB`; bare numbers are MB)
    Megabytes,
    Timestamp,
    /// Computed after all rows are coerced
    Derived,
}

#[derive(Debug, Clone, Copy)]
struct CanonicalColumn {
    name: &'static str,
    kind: ColumnKind,
    coercion: Coercion,
}

const fn column(name: &'static str, kind: ColumnKind, coercion: Coercion) -> CanonicalColumn {
    CanonicalColumn { name, kind, coercion }
}

const fn categorical(name: &'static str) -> CanonicalColumn {
    column(name, ColumnKind::Categorical, Coercion::Verbatim)
}

const fn text(name: &'static str) -> CanonicalColumn {
    column(name, ColumnKind::Text, Coercion::Verbatim)
}

const TIMESTAMP_COLUMN: CanonicalColumn = column(TIMESTAMP, ColumnKind::Timestamp, Coercion::Timestamp);

/// Required input columns and projected output for one data type
struct Layout {
    required: &'static [&'static str],
    output: &'static [CanonicalColumn],
}

static NETWORK: Layout = Layout {
    required: &[
        TIMESTAMP,
        "source_ip",
        "destination_ip",
        "protocol",
        "packet_size",
        "ttl",
        "flags",
        "bandwidth_usage",
    ],
    output: &[
        categorical("source_ip"),
        categorical("destination_ip"),
        categorical("protocol"),
        column("packet_size", ColumnKind::Numeric, Coercion::Number),
        column("ttl", ColumnKind::Numeric, Coercion::Number),
        categorical("flags"),
        categorical("bandwidth_usage"),
        column(TRAFFIC_VOLUME, ColumnKind::Numeric, Coercion::Derived),
    ],
};

static ENDPOINT: Layout = Layout {
    required: &[TIMESTAMP, "user", "process_name", "cpu_usage", "memory_usage"],
    output: &[
        TIMESTAMP_COLUMN,
        categorical("user"),
        categorical("process_name"),
        column("cpu_usage", ColumnKind::Numeric, Coercion::Percent),
        column("memory_usage", ColumnKind::Numeric, Coercion::Megabytes),
    ],
};

static AUTHENTICATION: Layout = Layout {
    required: &[TIMESTAMP, "user_id", "login_status", "geolocation", "auth_method"],
    output: &[
        TIMESTAMP_COLUMN,
        categorical("user_id"),
        categorical("login_status"),
        categorical("geolocation"),
        categorical("auth_method"),
    ],
};

static EMAIL: Layout = Layout {
    required: &[TIMESTAMP, "sender", "receiver", "subject", "links_in_email", "file_type"],
    output: &[
        TIMESTAMP_COLUMN,
        categorical("sender"),
        categorical("receiver"),
        text("subject"),
        text("links_in_email"),
        categorical("file_type"),
    ],
};

static THREAT_INTELLIGENCE: Layout = Layout {
    required: &[
        TIMESTAMP,
        "ip_address",
        "domain",
        "signature_id",
        "hash",
        "url",
        "email_pattern",
    ],
    output: &[
        TIMESTAMP_COLUMN,
        categorical("ip_address"),
        categorical("domain"),
        categorical("signature_id"),
        text("hash"),
        text("url"),
        text("email_pattern"),
    ],
};

fn layout(data_type: DataType) -> &'static Layout {
    match data_type {
        DataType::Network => &NETWORK,
        DataType::Endpoint => &ENDPOINT,
        DataType::Authentication => &AUTHENTICATION,
        DataType::Email => &EMAIL,
        DataType::ThreatIntelligence => &THREAT_INTELLIGENCE,
    }
}

/// Input columns a dataset of `data_type` must provide
pub fn required_columns(data_type: DataType) -> &'static [&'static str] {
    layout(data_type).required
}

/// Typed output schema produced for `data_type`
pub fn canonical_schema(data_type: DataType) -> Schema {
    Schema::new(
        layout(data_type)
            .output
            .iter()
            .map(|c| ColumnSpec::new(c.name, c.kind))
            .collect(),
    )
}

/// Normalize a raw dataset into the canonical projection for `data_type`
pub fn normalize(raw: &RawRecordSet, data_type: DataType) -> Result<CanonicalProjection, DetectionError> {
    let layout = layout(data_type);

    // 変換前に必須列をすべて検証する
    let missing: Vec<&str> = layout
        .required
        .iter()
        .copied()
        .filter(|name| !raw.has_column(name))
        .collect();
    if !missing.is_empty() {
        return Err(DetectionError::data_format(
            missing.join(", "),
            format!("missing required column(s) for {} data", data_type),
        ));
    }

    info!("Normalizing {} rows of {} data", raw.len(), data_type);

    // Timestamps are validated for every type, projected or not
    let timestamps = (0..raw.len())
        .map(|row| coerce_timestamp(raw, row))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(raw.len());
    for (row, timestamp) in timestamps.into_iter().enumerate() {
        let mut values = Vec::with_capacity(layout.output.len());
        for column in layout.output {
            let value = match column.coercion {
                Coercion::Timestamp => Value::Timestamp(timestamp),
                Coercion::Derived => Value::Null,
                Coercion::Verbatim => match raw.cell(row, column.name) {
                    Some(cell) => Value::Text(cell.to_string()),
                    None => Value::Null,
                },
                Coercion::Number => Value::Number(coerce_number(raw, row, column.name, parse_number)?),
                Coercion::Percent => Value::Number(coerce_number(raw, row, column.name, parse_percent)?),
                Coercion::Megabytes => {
                    Value::Number(coerce_number(raw, row, column.name, parse_megabytes)?)
                }
            };
            values.push(value);
        }
        records.push(Record::new(row, values));
    }

    let schema = canonical_schema(data_type);
    if data_type == DataType::Network {
        derive_traffic_volume(&schema, &mut records)?;
    }

    debug!("Normalized schema: {:?}", schema.names());
    Ok(CanonicalProjection::new(data_type, schema, records))
}

/// Parse a timestamp into a timezone-naive instant
///
/// Offsets are converted to UTC before the zone is dropped.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    let input = input.trim();
    if let Some(ts) = FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
    {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parse a finite number
pub fn parse_number(input: &str) -> Option<f64> {
    input.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a percentage such as `45%` or `45`
pub fn parse_percent(input: &str) -> Option<f64> {
    let input = input.trim();
    parse_number(input.strip_suffix('%').unwrap_or(input))
}

/// Parse a memory size into megabytes (`300KB`, `512MB`, `2.5 GB`, `1TB`)
///
/// A bare number is taken as megabytes. Any other suffix is rejected.
pub fn parse_megabytes(input: &str) -> Option<f64> {
    const UNITS: &[(&str, f64)] = &[
        ("KB", 1.0 / 1024.0),
        ("MB", 1.0),
        ("GB", 1024.0),
        ("TB", 1024.0 * 1024.0),
    ];

    let input = input.trim();
    let split = input
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let factor = if unit.is_empty() {
        1.0
    } else {
        UNITS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(unit))
            .map(|(_, factor)| *factor)?
    };

    parse_number(number).map(|n| n * factor)
}

fn coerce_timestamp(raw: &RawRecordSet, row: usize) -> Result<NaiveDateTime, DetectionError> {
    let cell = raw
        .cell(row, TIMESTAMP)
        .ok_or_else(|| DetectionError::data_format(TIMESTAMP, format!("missing value in row {}", row)))?;

    parse_timestamp(cell).ok_or_else(|| {
        DetectionError::data_format(TIMESTAMP, format!("unparseable timestamp '{}' in row {}", cell, row))
    })
}

fn coerce_number(
    raw: &RawRecordSet,
    row: usize,
    column: &str,
    parse: fn(&str) -> Option<f64>,
) -> Result<f64, DetectionError> {
    let cell = raw
        .cell(row, column)
        .ok_or_else(|| DetectionError::data_format(column, format!("missing numeric value in row {}", row)))?;

    parse(cell).ok_or_else(|| {
        DetectionError::data_format(column, format!("non-numeric value '{}' in row {}", cell, row))
    })
}

/// traffic_volume = sum of packet_size grouped by source_ip
fn derive_traffic_volume(schema: &Schema, records: &mut [Record]) -> Result<(), DetectionError> {
    let position = |name: &str| {
        schema
            .position(name)
            .ok_or_else(|| DetectionError::InternalProcessing(format!("network schema lacks '{}'", name)))
    };
    let source = position("source_ip")?;
    let size = position("packet_size")?;
    let volume = position(TRAFFIC_VOLUME)?;

    let mut totals: HashMap<Option<String>, f64> = HashMap::new();
    for record in records.iter() {
        let key = record.values[source].as_str().map(str::to_string);
        let packet_size = record.values[size].as_f64().unwrap_or(0.0);
        *totals.entry(key).or_insert(0.0) += packet_size;
    }

    for record in records.iter_mut() {
        let key = record.values[source].as_str().map(str::to_string);
        record.values[volume] = Value::Number(totals.get(&key).copied().unwrap_or(0.0));
    }

    Ok(())
}
