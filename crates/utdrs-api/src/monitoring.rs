//! Health monitor backed by the detection pipeline and analysis counters

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use utdrs_core::model::DataType;
use utdrs_engine::DetectionPipeline;
use utdrs_observability::{
    overall_status, AnalysisCounters, DetectionMetrics, HealthCheck, HealthMonitor, HealthStatus,
};

use crate::samples::sample_path;
use crate::server::ServerConfig;

// 失敗率がこれを超えると degraded
const DEGRADED_ERROR_RATE_PERCENT: f64 = 50.0;
const MIN_ANALYSES_FOR_ERROR_RATE: u64 = 10;

pub struct PipelineMonitor {
    pipeline: Arc<DetectionPipeline>,
    counters: Arc<AnalysisCounters>,
    config: ServerConfig,
}

impl PipelineMonitor {
    pub fn new(pipeline: Arc<DetectionPipeline>, counters: Arc<AnalysisCounters>, config: ServerConfig) -> Self {
        Self {
            pipeline,
            counters,
            config,
        }
    }

    fn check_pipeline(&self) -> HealthCheck {
        let started = Instant::now();
        let config = self.pipeline.config();
        HealthCheck::new("pipeline", HealthStatus::Up)
            .with_details(serde_json::json!({
                "n_estimators": config.forest.n_estimators,
                "contamination": config.forest.contamination,
                "rules": self.pipeline.registry().len(),
            }))
            .with_duration(started)
    }

    fn check_sample_data(&self) -> HealthCheck {
        let started = Instant::now();
        let missing: Vec<&str> = DataType::ALL
            .iter()
            .filter(|t| !sample_path(&self.config.sample_dir, **t).is_file())
            .map(|t| t.as_str())
            .collect();

        let check = if missing.is_empty() {
            HealthCheck::new("sample_data", HealthStatus::Up)
        } else {
            HealthCheck::new("sample_data", HealthStatus::Degraded)
                .with_message(format!("Missing sample data for: {}", missing.join(", ")))
        };
        check.with_duration(started)
    }

    fn check_dashboard(&self) -> HealthCheck {
        let started = Instant::now();
        let check = if self.config.static_dir.is_dir() {
            HealthCheck::new("dashboard", HealthStatus::Up)
        } else {
            HealthCheck::new("dashboard", HealthStatus::Degraded).with_message(format!(
                "Static directory {} not found",
                self.config.static_dir.display()
            ))
        };
        check.with_duration(started)
    }

    fn check_error_rate(&self) -> HealthCheck {
        let metrics = self.counters.snapshot();
        let degraded = metrics.analyses_total >= MIN_ANALYSES_FOR_ERROR_RATE
            && metrics.error_rate_percent > DEGRADED_ERROR_RATE_PERCENT;

        let status = if degraded { HealthStatus::Degraded } else { HealthStatus::Up };
        HealthCheck::new("analyses", status).with_message(format!(
            "{} of {} analyses failed",
            metrics.analyses_failed, metrics.analyses_total
        ))
    }
}

#[async_trait]
impl HealthMonitor for PipelineMonitor {
    async fn get_overall_health(&self) -> HealthStatus {
        overall_status(&self.run_health_checks().await)
    }

    async fn run_health_checks(&self) -> Vec<HealthCheck> {
        vec![
            self.check_pipeline(),
            self.check_sample_data(),
            self.check_dashboard(),
            self.check_error_rate(),
        ]
    }

    async fn get_metrics(&self) -> DetectionMetrics {
        self.counters.snapshot()
    }
}
