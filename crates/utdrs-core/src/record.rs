//! Raw tabular input as read from delimited text

use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::DetectionError;

/// Untyped rows in source order, one optional string per cell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecordSet {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawRecordSet {
    /// Build from headers and rows; every row must have one cell per header
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self, DetectionError> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(DetectionError::data_format(
                format!("<row {}>", i),
                format!("expected {} fields, found {}", headers.len(), row.len()),
            ));
        }
        Ok(Self { headers, rows })
    }

    /// Convenience constructor from string literals; empty strings become missing cells
    pub fn from_rows<H, R, C>(headers: H, rows: R) -> Result<Self, DetectionError>
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| non_empty(cell.as_ref())).collect())
            .collect();
        Self::new(headers, rows)
    }

    /// Read a CSV document with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, DetectionError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            rows.push(record.iter().map(non_empty).collect());
        }

        debug!("Loaded {} rows with {} columns", rows.len(), headers.len());
        Self::new(headers, rows)
    }

    /// Read a CSV file from disk
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn from_csv_str(data: &str) -> Result<Self, DetectionError> {
        Self::from_csv_reader(data.as_bytes())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell of `row` under `column`, `None` when the cell or the column is missing
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

fn non_empty(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
