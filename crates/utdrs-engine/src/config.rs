//! Pipeline configuration

use serde::{Deserialize, Serialize};
use utdrs_anomaly::ForestConfig;
use utdrs_core::error::DetectionError;
use utdrs_rules::RuleSet;

/// Immutable settings shared by every analysis of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub forest: ForestConfig,

    #[serde(default)]
    pub rules: RuleSet,
}

impl PipelineConfig {
    pub fn new(forest: ForestConfig, rules: RuleSet) -> Self {
        Self { forest, rules }
    }

    /// Check both the forest parameters and the rule definitions
    pub fn validate(&self) -> Result<(), DetectionError> {
        self.forest.validate()?;
        self.rules
            .validate()
            .map_err(|e| DetectionError::InvalidConfiguration(e.to_string()))
    }
}
