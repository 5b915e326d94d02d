//! Numeric feature extraction and standardization

use serde::Serialize;
use tracing::debug;
use utdrs_core::error::DetectionError;
use utdrs_core::model::CanonicalProjection;

/// Mean and population standard deviation fitted on one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub mean: f64,
    pub std_dev: f64,
}

impl ColumnStats {
    fn standardize(&self, value: f64) -> f64 {
        if self.std_dev == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std_dev
        }
    }
}

/// Standardized numeric rows, aligned with the projection's rows
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    stats: Vec<ColumnStats>,
    rows: Vec<Vec<f64>>,
}

impl DenseMatrix {
    /// Build from already standardized rows
    pub fn new(stats: Vec<ColumnStats>, rows: Vec<Vec<f64>>) -> Self {
        Self { stats, rows }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.stats.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn stats(&self) -> &[ColumnStats] {
        &self.stats
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.stats.len()
    }

    pub fn get(&self, row: usize, feature: usize) -> f64 {
        self.rows[row][feature]
    }
}

/// Output of [`vectorize`]
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMatrix {
    /// The projection has no numeric columns
    Empty,
    Dense(DenseMatrix),
}

impl FeatureMatrix {
    pub fn is_empty(&self) -> bool {
        matches!(self, FeatureMatrix::Empty)
    }

    pub fn as_dense(&self) -> Option<&DenseMatrix> {
        match self {
            FeatureMatrix::Dense(matrix) => Some(matrix),
            FeatureMatrix::Empty => None,
        }
    }
}

/// Standardize every numeric column of `projection`
///
/// Statistics are fit on the rows given here and nowhere else. Normalization
/// guarantees numeric columns hold finite numbers, so any other cell is an
/// internal error.
pub fn vectorize(projection: &CanonicalProjection) -> Result<FeatureMatrix, DetectionError> {
    let numeric = projection.schema().numeric_columns();
    if numeric.is_empty() {
        debug!("{} projection has no numeric columns", projection.data_type());
        return Ok(FeatureMatrix::Empty);
    }

    let records = projection.records();
    let mut stats = Vec::with_capacity(numeric.len());
    let mut raw_columns = Vec::with_capacity(numeric.len());

    for (position, name) in numeric {
        let column = records
            .iter()
            .map(|r| {
                r.get(position).and_then(|v| v.as_f64()).ok_or_else(|| {
                    DetectionError::InternalProcessing(format!(
                        "column '{}' has a non-numeric value in row {}",
                        name, r.index
                    ))
                })
            })
            .collect::<Result<Vec<f64>, DetectionError>>()?;
        let (mean, std_dev) = calculate_stats(&column);

        raw_columns.push(column);
        stats.push(ColumnStats {
            name: name.to_string(),
            mean,
            std_dev,
        });
    }

    let rows = (0..records.len())
        .map(|row| {
            stats
                .iter()
                .zip(&raw_columns)
                .map(|(s, column)| s.standardize(column[row]))
                .collect()
        })
        .collect();

    debug!("Vectorized {} rows over {:?}", records.len(), stats.iter().map(|s| &s.name).collect::<Vec<_>>());
    Ok(FeatureMatrix::Dense(DenseMatrix::new(stats, rows)))
}

fn calculate_stats(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use utdrs_core::model::{ColumnKind, ColumnSpec, DataType, Record, Schema, Value};

    fn projection(schema: Schema, rows: Vec<Vec<Value>>) -> CanonicalProjection {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| Record::new(i, values))
            .collect();
        CanonicalProjection::new(DataType::Endpoint, schema, records)
    }

    #[test]
    fn test_no_numeric_columns_is_empty() {
        let schema = Schema::new(vec![ColumnSpec::new("user_id", ColumnKind::Categorical)]);
        let p = projection(schema, vec![vec![Value::Text("alice".to_string())]]);
        assert!(vectorize(&p).unwrap().is_empty());
    }

    #[test]
    fn test_constant_column_standardizes_to_zero() {
        let schema = Schema::new(vec![
            ColumnSpec::new("ttl", ColumnKind::Numeric),
            ColumnSpec::new("packet_size", ColumnKind::Numeric),
        ]);
        let p = projection(
            schema,
            vec![
                vec![Value::Number(64.0), Value::Number(1.0)],
                vec![Value::Number(64.0), Value::Number(2.0)],
                vec![Value::Number(64.0), Value::Number(3.0)],
            ],
        );

        let matrix = vectorize(&p).unwrap();
        let dense = matrix.as_dense().unwrap();
        assert_eq!(dense.columns(), vec!["ttl", "packet_size"]);
        for row in dense.rows() {
            assert_eq!(row[0], 0.0);
        }
        assert_eq!(dense.stats()[0].std_dev, 0.0);
    }

    #[test]
    fn test_population_standard_deviation() {
        let schema = Schema::new(vec![ColumnSpec::new("cpu_usage", ColumnKind::Numeric)]);
        let p = projection(
            schema,
            vec![vec![Value::Number(2.0)], vec![Value::Number(4.0)]],
        );

        let matrix = vectorize(&p).unwrap();
        let dense = matrix.as_dense().unwrap();
        assert_eq!(dense.stats()[0].mean, 3.0);
        assert_eq!(dense.stats()[0].std_dev, 1.0);
        assert_eq!(dense.get(0, 0), -1.0);
        assert_eq!(dense.get(1, 0), 1.0);
    }

    #[test]
    fn test_only_numeric_kinds_are_selected() {
        let schema = Schema::new(vec![
            ColumnSpec::new("user", ColumnKind::Categorical),
            ColumnSpec::new("memory_usage", ColumnKind::Numeric),
        ]);
        let p = projection(
            schema,
            vec![vec![Value::Text("42".to_string()), Value::Number(100.0)]],
        );

        let matrix = vectorize(&p).unwrap();
        assert_eq!(matrix.as_dense().unwrap().n_features(), 1);
    }

    #[test]
    fn test_non_numeric_cell_is_internal_error() {
        let schema = Schema::new(vec![ColumnSpec::new("packet_size", ColumnKind::Numeric)]);
        let p = projection(
            schema,
            vec![vec![Value::Number(1500.0)], vec![Value::Text("jumbo".to_string())]],
        );

        match vectorize(&p).unwrap_err() {
            DetectionError::InternalProcessing(message) => {
                assert!(message.contains("packet_size"));
                assert!(message.contains("row 1"));
            }
            other => panic!("Expected InternalProcessing, got {:?}", other),
        }
    }

    #[test]
    fn test_null_cell_is_internal_error() {
        let schema = Schema::new(vec![ColumnSpec::new("ttl", ColumnKind::Numeric)]);
        let p = projection(schema, vec![vec![Value::Number(64.0)], vec![Value::Null]]);
        assert!(matches!(vectorize(&p), Err(DetectionError::InternalProcessing(_))));
    }
}
