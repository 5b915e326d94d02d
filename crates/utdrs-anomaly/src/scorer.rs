//! Outlier labelling on top of the isolation forest

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utdrs_core::error::DetectionError;

use crate::forest::IsolationForest;
use crate::vectorizer::DenseMatrix;

/// Isolation forest configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of isolation trees
    pub n_estimators: usize,

    /// Subsample size per tree, capped at the row count
    pub max_samples: usize,

    /// Expected outlier fraction in (0, 0.5]
    pub contamination: f64,

    /// Minimum number of rows required to fit
    pub min_samples: usize,

    /// Fixed seed for reproducible scoring
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            min_samples: 2,
            seed: None,
        }
    }
}

impl ForestConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.n_estimators == 0 {
            return Err(DetectionError::InvalidConfiguration(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectionError::InvalidConfiguration(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.min_samples < 2 {
            return Err(DetectionError::InvalidConfiguration(
                "min_samples must be at least 2".to_string(),
            ));
        }
        if self.max_samples < 2 {
            return Err(DetectionError::InvalidConfiguration(
                "max_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Binary outcome of scoring one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyLabel {
    Inlier,
    Outlier,
}

/// Score and label for one matrix row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredRow {
    /// Row position in the matrix
    pub row: usize,
    pub score: f64,
    pub label: AnomalyLabel,
}

impl ScoredRow {
    pub fn is_outlier(&self) -> bool {
        self.label == AnomalyLabel::Outlier
    }
}

/// Fit a forest on `matrix` and label every row
///
/// The threshold is the `1 - contamination` quantile of the scores; a row is an
/// outlier only when its score is strictly above it, so equal scores never split.
pub fn fit_and_score(matrix: &DenseMatrix, config: &ForestConfig) -> Result<Vec<ScoredRow>, DetectionError> {
    config.validate()?;

    let rows = matrix.n_rows();
    if rows < config.min_samples {
        return Err(DetectionError::InsufficientData {
            rows,
            required: config.min_samples,
        });
    }

    let mut rng = config.rng();
    let forest = IsolationForest::fit(matrix, config.n_estimators, config.max_samples, &mut rng);
    debug!(
        "Fitted {} trees with sample size {}",
        forest.n_trees(),
        forest.sample_size()
    );

    let scores: Vec<f64> = matrix.rows().iter().map(|row| forest.score(row)).collect();
    let threshold = quantile(&scores, 1.0 - config.contamination);

    let scored: Vec<ScoredRow> = scores
        .into_iter()
        .enumerate()
        .map(|(row, score)| ScoredRow {
            row,
            score,
            label: if score > threshold {
                AnomalyLabel::Outlier
            } else {
                AnomalyLabel::Inlier
            },
        })
        .collect();

    info!(
        "{} of {} rows above threshold {:.4}",
        scored.iter().filter(|s| s.is_outlier()).count(),
        rows,
        threshold
    );
    Ok(scored)
}

/// Linearly interpolated quantile, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
