//! Health and analysis metrics abstractions and Axum routes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl HealthCheck {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            timestamp: Utc::now(),
            duration_ms: 0,
            message: None,
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_duration(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Worst status of a set of checks; no checks means up
pub fn overall_status(checks: &[HealthCheck]) -> HealthStatus {
    checks.iter().fold(HealthStatus::Up, |acc, check| match (acc, check.status) {
        (HealthStatus::Down, _) | (_, HealthStatus::Down) => HealthStatus::Down,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Up,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionMetrics {
    pub timestamp: DateTime<Utc>,
    pub analyses_total: u64,
    pub analyses_failed: u64,
    pub rows_analyzed: u64,
    pub anomalies_total: u64,
    pub known_threats_total: u64,
    pub error_rate_percent: f64,
    pub uptime_seconds: u64,
    pub analyses_by_data_type: BTreeMap<String, u64>,
    pub failures_by_stage: BTreeMap<String, u64>,
}

/// Process-wide analysis counters
///
/// 解析ごとの状態は持たず、累計値のみ保持する
#[derive(Debug)]
pub struct AnalysisCounters {
    started: Instant,
    analyses_total: AtomicU64,
    analyses_failed: AtomicU64,
    rows_analyzed: AtomicU64,
    anomalies_total: AtomicU64,
    known_threats_total: AtomicU64,
    by_data_type: Mutex<BTreeMap<String, u64>>,
    by_stage: Mutex<BTreeMap<String, u64>>,
}

impl AnalysisCounters {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            analyses_total: AtomicU64::new(0),
            analyses_failed: AtomicU64::new(0),
            rows_analyzed: AtomicU64::new(0),
            anomalies_total: AtomicU64::new(0),
            known_threats_total: AtomicU64::new(0),
            by_data_type: Mutex::new(BTreeMap::new()),
            by_stage: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_success(&self, data_type: &str, rows: usize, anomalies: usize, known_threats: usize) {
        self.analyses_total.fetch_add(1, Ordering::Relaxed);
        self.rows_analyzed.fetch_add(rows as u64, Ordering::Relaxed);
        self.anomalies_total.fetch_add(anomalies as u64, Ordering::Relaxed);
        self.known_threats_total.fetch_add(known_threats as u64, Ordering::Relaxed);
        bump(&self.by_data_type, data_type);
    }

    pub fn record_failure(&self, data_type: &str, stage: &str) {
        self.analyses_total.fetch_add(1, Ordering::Relaxed);
        self.analyses_failed.fetch_add(1, Ordering::Relaxed);
        bump(&self.by_data_type, data_type);
        bump(&self.by_stage, stage);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> DetectionMetrics {
        let total = self.analyses_total.load(Ordering::Relaxed);
        let failed = self.analyses_failed.load(Ordering::Relaxed);
        let error_rate_percent = if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64 * 100.0
        };

        DetectionMetrics {
            timestamp: Utc::now(),
            analyses_total: total,
            analyses_failed: failed,
            rows_analyzed: self.rows_analyzed.load(Ordering::Relaxed),
            anomalies_total: self.anomalies_total.load(Ordering::Relaxed),
            known_threats_total: self.known_threats_total.load(Ordering::Relaxed),
            error_rate_percent,
            uptime_seconds: self.uptime_seconds(),
            analyses_by_data_type: read(&self.by_data_type),
            failures_by_stage: read(&self.by_stage),
        }
    }
}

impl Default for AnalysisCounters {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(map: &Mutex<BTreeMap<String, u64>>, key: &str) {
    let mut guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard.entry(key.to_string()).or_insert(0) += 1;
}

fn read(map: &Mutex<BTreeMap<String, u64>>) -> BTreeMap<String, u64> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

#[async_trait::async_trait]
pub trait HealthMonitor: Send + Sync + 'static {
    async fn get_overall_health(&self) -> HealthStatus;
    async fn run_health_checks(&self) -> Vec<HealthCheck>;
    async fn get_metrics(&self) -> DetectionMetrics;
}

pub mod routes {
    use super::*;
    use axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::get,
        Router,
    };
    use std::sync::Arc;

    pub fn monitoring_routes(monitor: Arc<dyn HealthMonitor>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/health/detailed", get(health_detailed))
            .route("/metrics", get(metrics))
            .with_state(monitor)
    }

    async fn health(State(m): State<Arc<dyn HealthMonitor>>) -> impl IntoResponse {
        let status = m.get_overall_health().await;
        let status_code = match status {
            HealthStatus::Up => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status_code, Json(status))
    }

    async fn health_detailed(State(m): State<Arc<dyn HealthMonitor>>) -> impl IntoResponse {
        Json(m.run_health_checks().await)
    }

    async fn metrics(State(m): State<Arc<dyn HealthMonitor>>) -> impl IntoResponse {
        Json(m.get_metrics().await)
    }
}
