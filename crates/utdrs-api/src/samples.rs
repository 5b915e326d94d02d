//! Bundled sample datasets

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use utdrs_core::error::DetectionError;
use utdrs_core::model::DataType;
use utdrs_core::record::RawRecordSet;

/// `<dir>/sample_<data_type>_data.csv`
pub fn sample_path(dir: &Path, data_type: DataType) -> PathBuf {
    dir.join(format!("sample_{}_data.csv", data_type))
}

/// Load a sample dataset without normalizing it
pub fn load_sample(dir: &Path, data_type: DataType) -> Result<RawRecordSet, DetectionError> {
    RawRecordSet::from_csv_path(sample_path(dir, data_type))
}

/// Rows as JSON objects in header order; missing cells become null
pub fn rows_as_json(raw: &RawRecordSet) -> Vec<Value> {
    raw.rows()
        .iter()
        .map(|row| {
            let object: Map<String, Value> = raw
                .headers()
                .iter()
                .zip(row)
                .map(|(header, cell)| {
                    let value = cell.clone().map(Value::String).unwrap_or(Value::Null);
                    (header.clone(), value)
                })
                .collect();
            Value::Object(object)
        })
        .collect()
}
