//! API request/response models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use utdrs_core::error::DetectionError;
use utdrs_core::model::{DataType, RecordSet};
use utdrs_engine::{DetectionResult, PartialDetection, PipelineError, RiskLevel, Stage};

/// Generic API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// `GET /` body
#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub dashboard_url: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct AnalysisSummary {
    pub risk_level: RiskLevel,
}

/// `POST /api/analyze` body
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: String,
    pub data_type: DataType,
    pub total_rows: usize,
    pub anomalies: RecordSet,
    pub known_threats: RecordSet,
    pub total_anomalies: usize,
    pub total_known_threats: usize,
    pub risk_level: RiskLevel,
    pub summary: AnalysisSummary,
}

impl From<DetectionResult> for AnalyzeResponse {
    fn from(result: DetectionResult) -> Self {
        Self {
            analysis_id: result.analysis_id().to_string(),
            data_type: result.data_type(),
            total_rows: result.total_rows(),
            anomalies: result.anomalies().clone(),
            known_threats: result.known_threats().clone(),
            total_anomalies: result.total_anomalies(),
            total_known_threats: result.total_known_threats(),
            risk_level: result.risk_level(),
            summary: AnalysisSummary {
                risk_level: result.risk_level(),
            },
        }
    }
}

/// Error body: `{ success: false, error, stage, partial? }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialDetection>,
}

/// Errors returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => detection_status(&e.source),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP status for a detection failure
pub fn detection_status(error: &DetectionError) -> StatusCode {
    match error {
        DetectionError::UnknownDataType(_) | DetectionError::DataFormat { .. } => StatusCode::BAD_REQUEST,
        DetectionError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DetectionError::InternalProcessing(_)
        | DetectionError::InvalidConfiguration(_)
        | DetectionError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DetectionError> for ApiError {
    fn from(error: DetectionError) -> Self {
        match error {
            DetectionError::UnknownDataType(_) => ApiError::BadRequest(error.to_string()),
            other => ApiError::Pipeline(PipelineError::new(Stage::Ingest, other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match &self {
            ApiError::Pipeline(e) => e.source.to_string(),
            other => other.to_string(),
        };

        let (stage, partial) = match self {
            ApiError::Pipeline(e) => (Some(e.stage), e.partial),
            _ => (None, None),
        };

        let body = ErrorBody {
            success: false,
            error,
            stage,
            partial,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            detection_status(&DetectionError::UnknownDataType("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            detection_status(&DetectionError::data_format("ttl", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            detection_status(&DetectionError::InsufficientData { rows: 0, required: 2 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            detection_status(&DetectionError::InternalProcessing("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            detection_status(&DetectionError::InvalidConfiguration("bad".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_pipeline_error_keeps_stage() {
        let err = ApiError::from(PipelineError::new(
            Stage::Normalize,
            DetectionError::data_format("packet_size", "not a number"),
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_api_response_constructors() {
        let ok = ApiResponse::success(3);
        assert!(ok.success);
        assert_eq!(ok.data, Some(3));

        let err: ApiResponse<()> = ApiResponse::error("nope".to_string());
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("nope"));
    }
}
