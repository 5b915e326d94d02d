//! API request handlers

use axum::{
    extract::{Extension, Multipart, Path},
    response::Json as JsonResponse,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use utdrs_core::model::DataType;
use utdrs_engine::{DetectionPipeline, DetectionResult, PipelineError, Stage};
use utdrs_observability::{AnalysisCounters, HealthMonitor};
use utdrs_rules::RuleSet;

use crate::models::*;
use crate::samples::{load_sample, rows_as_json, sample_path};
use crate::server::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DetectionPipeline>,
    pub counters: Arc<AnalysisCounters>,
    pub monitoring: Arc<dyn HealthMonitor>,
    pub config: Arc<ServerConfig>,
    pub start_time: Instant,
}

/// Welcome handler
pub async fn root(Extension(state): Extension<Arc<AppState>>) -> JsonResponse<WelcomeResponse> {
    JsonResponse(WelcomeResponse {
        message: "Welcome to the Unified Threat Detection and Response System".to_string(),
        dashboard_url: state.config.dashboard_url(),
    })
}

/// Health check handler
pub async fn health_check(Extension(state): Extension<Arc<AppState>>) -> JsonResponse<ApiResponse<HealthResponse>> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    JsonResponse(ApiResponse::success(response))
}

/// Multipart upload handler: `file` (CSV) and `data_type`
pub async fn analyze(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<JsonResponse<AnalyzeResponse>, ApiError> {
    let mut file: Option<Vec<u8>> = None;
    let mut tag: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                file = Some(bytes.to_vec());
            }
            Some("data_type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid data_type field: {}", e)))?;
                tag = Some(text.trim().to_string());
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    // タグ検証はファイル処理より先に行う
    let tag = tag.ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Missing data_type. Must be one of: {}",
            DataType::valid_tags()
        ))
    })?;
    let data_type: DataType = tag.parse()?;
    let bytes = file.ok_or_else(|| ApiError::BadRequest("Missing file upload".to_string()))?;

    info!("Received {} bytes of {} data", bytes.len(), data_type);

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || analyze_upload(&pipeline, &bytes, data_type))
        .await
        .map_err(|e| ApiError::Internal(format!("Analysis task failed: {}", e)))?;

    match outcome {
        Ok(result) => {
            state.counters.record_success(
                data_type.as_str(),
                result.total_rows(),
                result.total_anomalies(),
                result.total_known_threats(),
            );
            Ok(JsonResponse(AnalyzeResponse::from(result)))
        }
        Err(e) => {
            warn!("Analysis of {} upload failed: {}", data_type, e);
            state
                .counters
                .record_failure(data_type.as_str(), &e.stage.to_string());
            Err(ApiError::Pipeline(e))
        }
    }
}

/// Stage the upload in a temp file owned by this call and run the pipeline on it
fn analyze_upload(
    pipeline: &DetectionPipeline,
    bytes: &[u8],
    data_type: DataType,
) -> Result<DetectionResult, PipelineError> {
    let ingest = |e: std::io::Error| PipelineError::new(Stage::Ingest, e.into());

    let mut staged = tempfile::NamedTempFile::new().map_err(ingest)?;
    staged.write_all(bytes).map_err(ingest)?;
    staged.flush().map_err(ingest)?;

    pipeline.analyze_file(staged.path(), data_type)
}

/// Sample dataset handler
pub async fn sample_data(
    Extension(state): Extension<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<JsonResponse<Vec<serde_json::Value>>, ApiError> {
    let data_type: DataType = tag.parse()?;
    let dir = state.config.sample_dir.clone();

    if !sample_path(&dir, data_type).is_file() {
        return Err(ApiError::NotFound(format!("No sample data for {}", data_type)));
    }

    let raw = tokio::task::spawn_blocking(move || load_sample(&dir, data_type))
        .await
        .map_err(|e| ApiError::Internal(format!("Sample loading task failed: {}", e)))??;

    Ok(JsonResponse(rows_as_json(&raw)))
}

/// Active rule set handler
pub async fn list_rules(Extension(state): Extension<Arc<AppState>>) -> JsonResponse<ApiResponse<RuleSet>> {
    JsonResponse(ApiResponse::success(state.pipeline.config().rules.clone()))
}
