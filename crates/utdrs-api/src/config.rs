//! Layered application configuration
//!
//! 既定値 → 設定ファイル (TOML/JSON) → `UTDRS_` 環境変数 の順に上書きする

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use utdrs_anomaly::ForestConfig;
use utdrs_core::error::DetectionError;
use utdrs_core::model::DataType;
use utdrs_engine::PipelineConfig;
use utdrs_rules::{RuleDefinition, RuleSet};

use crate::server::ServerConfig;

/// Environment variable prefix, e.g. `UTDRS_SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "UTDRS";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub detection: DetectionConfig,
    pub rules: RulesConfig,
    pub logging: LoggingConfig,
}

/// Anomaly scoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub min_samples: usize,
    pub seed: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let forest = ForestConfig::default();
        Self {
            n_estimators: forest.n_estimators,
            max_samples: forest.max_samples,
            contamination: forest.contamination,
            min_samples: forest.min_samples,
            seed: forest.seed,
        }
    }
}

impl From<&DetectionConfig> for ForestConfig {
    fn from(config: &DetectionConfig) -> Self {
        ForestConfig {
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
            contamination: config.contamination,
            min_samples: config.min_samples,
            seed: config.seed,
        }
    }
}

/// Known-threat rule sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Start from the built-in signatures
    pub include_builtin: bool,

    /// JSON rule set file, applied over the built-ins
    pub file: Option<PathBuf>,

    /// Rules written directly in the configuration file, applied last
    pub inline: BTreeMap<DataType, Vec<RuleDefinition>>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            include_builtin: true,
            file: None,
            inline: BTreeMap::new(),
        }
    }
}

impl RulesConfig {
    /// Combine every source into the active rule set
    ///
    /// A data type present in a later source replaces that type's earlier rules.
    pub fn resolve(&self) -> Result<RuleSet, DetectionError> {
        let mut rules = if self.include_builtin {
            RuleSet::builtin()
        } else {
            RuleSet::empty()
        };

        if let Some(path) = &self.file {
            let json = std::fs::read_to_string(path)?;
            let from_file = RuleSet::from_json(&json)
                .map_err(|e| DetectionError::InvalidConfiguration(format!("{}: {}", path.display(), e)))?;
            debug!("Loaded {} rule(s) from {}", from_file.len(), path.display());
            rules = rules.overlay(from_file);
        }

        if !self.inline.is_empty() {
            rules = rules.overlay(RuleSet {
                rules: self.inline.clone(),
            });
        }

        Ok(rules)
    }
}

/// Log output settings for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load defaults, then an optional file, then `UTDRS_*` environment variables
    ///
    /// A file that is named explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Pipeline settings derived from the detection and rules sections
    pub fn pipeline_config(&self) -> Result<PipelineConfig, DetectionError> {
        let config = PipelineConfig::new(ForestConfig::from(&self.detection), self.rules.resolve()?);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_map_onto_forest() {
        let config = AppConfig::default();
        let pipeline = config.pipeline_config().unwrap();
        assert_eq!(pipeline.forest, ForestConfig::default());
        assert_eq!(pipeline.rules, RuleSet::builtin());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[detection]
contamination = 0.05
seed = 7

[rules]
include_builtin = false

[[rules.inline.network]]
name = "telnet"
predicate = {{ type = "Equals", config = {{ field = "protocol", value = "TELNET" }} }}
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, ServerConfig::default().host);
        assert_eq!(config.detection.seed, Some(7));
        assert_eq!(config.detection.n_estimators, 100);

        let pipeline = config.pipeline_config().unwrap();
        assert_eq!(pipeline.forest.contamination, 0.05);
        assert_eq!(pipeline.rules.len(), 1);
        assert!(pipeline.rules.for_type(DataType::Email).is_empty());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("utdrs.toml");

        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_rules_file_overrides_builtin_type() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rules": {{"email": [{{"name": "zip", "predicate": {{"type": "Equals", "config": {{"field": "file_type", "value": "zip"}}}}}}]}}}}"#
        )
        .unwrap();

        let rules = RulesConfig {
            file: Some(file.path().to_path_buf()),
            ..RulesConfig::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(rules.for_type(DataType::Email)[0].name, "zip");
        assert_eq!(rules.for_type(DataType::Authentication).len(), 1);
    }

    #[test]
    fn test_invalid_detection_is_rejected() {
        let mut config = AppConfig::default();
        config.detection.contamination = 0.75;
        assert!(matches!(
            config.pipeline_config(),
            Err(DetectionError::InvalidConfiguration(_))
        ));
    }
}
