//! Detection pipeline: normalize, score, match, assemble

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, info_span};
use utdrs_anomaly::{fit_and_score, vectorize, FeatureMatrix, ForestConfig};
use utdrs_core::error::DetectionError;
use utdrs_core::model::{
    CanonicalProjection, ColumnKind, ColumnSpec, DataType, Record, RecordSet, Value,
};
use utdrs_core::normalize::normalize;
use utdrs_core::record::RawRecordSet;
use utdrs_rules::{match_known_threats, RuleRegistry, RuleSet};
use uuid::Uuid;

use crate::config::PipelineConfig;

/// Column appended to every anomaly row
pub const ANOMALY_SCORE_COLUMN: &str = "anomaly_score";

/// Combined count at which risk becomes high
pub const HIGH_RISK_THRESHOLD: usize = 5;

/// Pipeline step, used for error provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Normalize,
    AnomalyScoring,
    RuleMatching,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Normalize => "normalize",
            Stage::AnomalyScoring => "anomaly_scoring",
            Stage::RuleMatching => "rule_matching",
        };
        f.write_str(name)
    }
}

/// Results computed before a later stage failed
#[derive(Debug, Clone, Serialize)]
pub struct PartialDetection {
    pub anomalies: RecordSet,
    pub total_anomalies: usize,
}

/// A [`DetectionError`] tagged with the stage that raised it
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: DetectionError,
    pub partial: Option<PartialDetection>,
}

impl PipelineError {
    pub fn new(stage: Stage, source: DetectionError) -> Self {
        Self {
            stage,
            source,
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: PartialDetection) -> Self {
        self.partial = Some(partial);
        self
    }

    pub fn is_client_error(&self) -> bool {
        self.source.is_client_error()
    }
}

/// Overall risk derived from the two result counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `low` when nothing was found, `high` from five combined findings
    pub fn from_counts(anomalies: usize, known_threats: usize) -> Self {
        match anomalies + known_threats {
            0 => RiskLevel::Low,
            n if n >= HIGH_RISK_THRESHOLD => RiskLevel::High,
            _ => RiskLevel::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one analysis
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    analysis_id: Uuid,
    data_type: DataType,
    total_rows: usize,
    anomalies: RecordSet,
    known_threats: RecordSet,
    total_anomalies: usize,
    total_known_threats: usize,
    risk_level: RiskLevel,
}

impl DetectionResult {
    fn new(
        analysis_id: Uuid,
        data_type: DataType,
        total_rows: usize,
        anomalies: RecordSet,
        known_threats: RecordSet,
    ) -> Self {
        let total_anomalies = anomalies.len();
        let total_known_threats = known_threats.len();
        Self {
            analysis_id,
            data_type,
            total_rows,
            anomalies,
            known_threats,
            total_anomalies,
            total_known_threats,
            risk_level: RiskLevel::from_counts(total_anomalies, total_known_threats),
        }
    }

    pub fn analysis_id(&self) -> Uuid {
        self.analysis_id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn anomalies(&self) -> &RecordSet {
        &self.anomalies
    }

    pub fn known_threats(&self) -> &RecordSet {
        &self.known_threats
    }

    pub fn total_anomalies(&self) -> usize {
        self.total_anomalies
    }

    pub fn total_known_threats(&self) -> usize {
        self.total_known_threats
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }
}

/// Stateless detection pipeline
///
/// Holds only configuration, so one instance can serve concurrent analyses.
#[derive(Debug)]
pub struct DetectionPipeline {
    config: PipelineConfig,
    registry: RuleRegistry,
}

impl DetectionPipeline {
    /// Build a pipeline after validating its configuration
    pub fn new(config: PipelineConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        let registry = RuleRegistry::from_rule_set(&config.rules);
        info!(
            "Detection pipeline ready: {} trees, contamination {}, {} rule(s)",
            config.forest.n_estimators,
            config.forest.contamination,
            registry.len()
        );
        Ok(Self { config, registry })
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Run every stage over one dataset
    pub fn analyze(&self, raw: &RawRecordSet, data_type: DataType) -> Result<DetectionResult, PipelineError> {
        let analysis_id = Uuid::new_v4();
        let span = info_span!("analysis", analysis_id = %analysis_id, data_type = %data_type);
        let _guard = span.enter();

        info!("Starting analysis of {} rows", raw.len());

        let result = self.run(analysis_id, raw, data_type);
        match &result {
            Ok(result) => info!(
                "Analysis complete: {} anomalies, {} known threats, risk {}",
                result.total_anomalies(),
                result.total_known_threats(),
                result.risk_level()
            ),
            Err(e) => error!("Analysis failed: {}", e),
        }
        result
    }

    /// Parse `tag`, load the CSV at `path` and analyze it
    pub fn analyze_path(&self, path: impl AsRef<Path>, tag: &str) -> Result<DetectionResult, PipelineError> {
        let data_type: DataType = tag
            .parse()
            .map_err(|e| PipelineError::new(Stage::Ingest, e))?;
        self.analyze_file(path, data_type)
    }

    /// Load the CSV at `path` and analyze it as `data_type`
    pub fn analyze_file(&self, path: impl AsRef<Path>, data_type: DataType) -> Result<DetectionResult, PipelineError> {
        let path = path.as_ref();
        debug!("Loading {}", path.display());
        let raw = RawRecordSet::from_csv_path(path).map_err(|e| PipelineError::new(Stage::Ingest, e))?;
        self.analyze(&raw, data_type)
    }

    fn run(&self, analysis_id: Uuid, raw: &RawRecordSet, data_type: DataType) -> Result<DetectionResult, PipelineError> {
        // 空データは「異常なし」と区別する
        if raw.is_empty() {
            return Err(PipelineError::new(
                Stage::Ingest,
                DetectionError::InsufficientData {
                    rows: 0,
                    required: self.config.forest.min_samples,
                },
            ));
        }

        let projection = normalize(raw, data_type).map_err(|e| PipelineError::new(Stage::Normalize, e))?;
        debug!("Normalized {} rows", projection.len());

        let anomalies = score_anomalies(&projection, &self.config.forest)
            .map_err(|e| PipelineError::new(Stage::AnomalyScoring, e))?;
        debug!("Anomaly scoring flagged {} rows", anomalies.len());

        let known_threats = match match_known_threats(&projection, &self.registry) {
            Ok(threats) => threats,
            Err(e) => {
                let partial = PartialDetection {
                    total_anomalies: anomalies.len(),
                    anomalies,
                };
                return Err(PipelineError::new(Stage::RuleMatching, e).with_partial(partial));
            }
        };
        debug!("Rule matching found {} rows", known_threats.len());

        Ok(DetectionResult::new(
            analysis_id,
            data_type,
            projection.len(),
            anomalies,
            known_threats,
        ))
    }
}

/// Outlier rows of `projection`, each extended with its isolation score
fn score_anomalies(projection: &CanonicalProjection, forest: &ForestConfig) -> Result<RecordSet, DetectionError> {
    let schema = projection
        .schema()
        .with_column(ColumnSpec::new(ANOMALY_SCORE_COLUMN, ColumnKind::Numeric));

    let matrix = match vectorize(projection)? {
        FeatureMatrix::Empty => return Ok(RecordSet::empty(schema)),
        FeatureMatrix::Dense(matrix) => matrix,
    };

    let scored = fit_and_score(&matrix, forest)?;
    let records = projection.records();

    let outliers = scored
        .iter()
        .filter(|s| s.is_outlier())
        .map(|s| {
            let record = records.get(s.row).ok_or_else(|| {
                DetectionError::InternalProcessing(format!("scored row {} has no source record", s.row))
            })?;
            let mut values = record.values.clone();
            values.push(Value::Number(s.score));
            Ok(Record::new(record.index, values))
        })
        .collect::<Result<Vec<_>, DetectionError>>()?;

    Ok(RecordSet::new(schema, outliers))
}

/// Builder for [`DetectionPipeline`]
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forest(mut self, forest: ForestConfig) -> Self {
        self.config.forest = forest;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.forest.seed = Some(seed);
        self
    }

    pub fn contamination(mut self, contamination: f64) -> Self {
        self.config.forest.contamination = contamination;
        self
    }

    /// Replace the whole rule set
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.config.rules = rules;
        self
    }

    pub fn build(self) -> Result<DetectionPipeline, DetectionError> {
        DetectionPipeline::new(self.config)
    }
}
