//! # UTDRS - Unified Threat Detection and Response System
//!
//! セキュリティテレメトリ (CSV) に対する異常検知と既知脅威マッチングのスタック
//!
//! A dataset tagged with one of five data types (network, endpoint,
//! authentication, email, threat_intelligence) is normalized into a canonical
//! projection, scored with an isolation forest, and matched against a
//! configurable set of known-threat rules.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use utdrs::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let pipeline = DetectionPipeline::builder().seed(42).build()?;
//!     let result = pipeline.analyze_path("data/sample_network_data.csv", "network")?;
//!
//!     println!(
//!         "{} anomalies, {} known threats, risk {}",
//!         result.total_anomalies(),
//!         result.total_known_threats(),
//!         result.risk_level()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`utdrs-core`**: Raw records, data types, canonical schemas and normalization
//! - **`utdrs-rules`**: Known-threat rule trait, predicate DSL and registry
//! - **`utdrs-anomaly`**: Feature vectorization and isolation forest scoring
//! - **`utdrs-engine`**: Pipeline orchestration and detection results
//! - **`utdrs-observability`**: Health checks and analysis metrics
//! - **`utdrs-api`**: REST API, configuration and dashboard serving
//! - **`utdrs-cli`**: Command-line interface
//!
//! ## Feature Flags
//!
//! - `full` (default): All crates included
//! - `core`, `rules`, `anomaly`, `engine`, `observability`, `api`, `cli`: individual crates

#[cfg(feature = "utdrs-core")]
pub use utdrs_core as core;

#[cfg(feature = "utdrs-rules")]
pub use utdrs_rules as rules;

#[cfg(feature = "utdrs-anomaly")]
pub use utdrs_anomaly as anomaly;

#[cfg(feature = "utdrs-engine")]
pub use utdrs_engine as engine;

#[cfg(feature = "utdrs-observability")]
pub use utdrs_observability as observability;

#[cfg(feature = "utdrs-api")]
pub use utdrs_api as api;

#[cfg(feature = "utdrs-cli")]
pub use utdrs_cli as cli;

// Convenience re-exports for common types (feature-gated)
#[cfg(feature = "utdrs-core")]
pub use utdrs_core::{DataType, DetectionError, RawRecordSet};

#[cfg(feature = "utdrs-engine")]
pub use utdrs_engine::{DetectionPipeline, DetectionResult, PipelineConfig, PipelineError, RiskLevel, Stage};

#[cfg(feature = "utdrs-rules")]
pub use utdrs_rules::{RuleRegistry, RuleSet, ThreatRule};

#[cfg(feature = "utdrs-anomaly")]
pub use utdrs_anomaly::ForestConfig;

// Commonly used external dependencies
pub use anyhow;
pub use serde;
pub use serde_json;

/// Prelude module for convenient imports
///
/// ```rust
/// use utdrs::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "utdrs-core")]
    pub use crate::{DataType, DetectionError, RawRecordSet};

    #[cfg(feature = "utdrs-engine")]
    pub use crate::{DetectionPipeline, DetectionResult, PipelineConfig, PipelineError, RiskLevel, Stage};

    #[cfg(feature = "utdrs-rules")]
    pub use crate::{RuleRegistry, RuleSet, ThreatRule};

    #[cfg(feature = "utdrs-anomaly")]
    pub use crate::ForestConfig;

    pub use anyhow::Result;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::Value;
}

/// Current version of UTDRS
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basic liveness information for embedding applications
pub fn health_check() -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "version": VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "modules": {
            "core": cfg!(feature = "utdrs-core"),
            "rules": cfg!(feature = "utdrs-rules"),
            "anomaly": cfg!(feature = "utdrs-anomaly"),
            "engine": cfg!(feature = "utdrs-engine"),
            "observability": cfg!(feature = "utdrs-observability"),
            "api": cfg!(feature = "utdrs-api"),
            "cli": cfg!(feature = "utdrs-cli"),
        }
    })
}
