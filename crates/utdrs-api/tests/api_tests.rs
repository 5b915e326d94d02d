// API integration tests for utdrs-api

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::path::Path;
use tower::ServiceExt;
use utdrs_api::{DetectionServer, ServerConfig};
use utdrs_engine::DetectionPipeline;

const BOUNDARY: &str = "utdrs-test-boundary";

const AUTH_CSV: &str = "timestamp,user_id,login_status,geolocation,auth_method\n\
2025-04-01T12:00:00,alice,success,US,password\n\
2025-04-01T12:01:00,bob,failed,US,password\n\
2025-04-01T12:02:00,carol,failed,DE,mfa\n";

const NETWORK_CSV: &str = "timestamp,source_ip,destination_ip,protocol,packet_size,ttl,flags,bandwidth_usage\n\
2025-04-01 12:00:00,192.168.1.100,10.0.0.1,TCP,1500,64,SYN,high\n\
2025-04-01 12:01:00,192.168.1.101,10.0.0.1,TCP,1400,64,ACK,medium\n\
2025-04-01 12:02:00,192.168.1.102,10.0.0.1,UDP,5000,64,SYN,high\n";

fn app(sample_dir: &Path) -> Router {
    let config = ServerConfig {
        sample_dir: sample_dir.to_path_buf(),
        static_dir: sample_dir.to_path_buf(),
        ..ServerConfig::default()
    };
    let pipeline = DetectionPipeline::builder().seed(42).build().unwrap();
    DetectionServer::new(config, pipeline).create_app()
}

fn multipart_body(data_type: Option<&str>, csv: Option<&str>) -> Body {
    let mut body = String::new();
    if let Some(data_type) = data_type {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"data_type\"\r\n\r\n{data_type}\r\n"
        ));
    }
    if let Some(csv) = csv {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Body::from(body)
}

fn analyze_request(data_type: Option<&str>, csv: Option<&str>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(data_type, csv))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_points_to_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["dashboard_url"].as_str().unwrap().ends_with("/dashboard/"));
}

#[tokio::test]
async fn test_analyze_authentication_upload() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(Some("authentication"), Some(AUTH_CSV)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data_type"], "authentication");
    assert_eq!(json["total_rows"], 3);
    assert_eq!(json["total_anomalies"], 0);
    assert_eq!(json["total_known_threats"], 2);
    assert_eq!(json["risk_level"], "medium");
    assert_eq!(json["summary"]["risk_level"], "medium");
    assert_eq!(json["known_threats"][0]["user_id"], "bob");
    assert_eq!(json["known_threats"][1]["user_id"], "carol");
    assert!(json["analysis_id"].is_string());
}

#[tokio::test]
async fn test_analyze_network_upload_scores_outlier() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(Some("network"), Some(NETWORK_CSV)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total_anomalies"], 1);
    assert_eq!(json["anomalies"][0]["packet_size"], 5000);
    assert!(json["anomalies"][0]["anomaly_score"].is_f64());
}

#[tokio::test]
async fn test_unknown_data_type_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(Some("firewall"), Some(AUTH_CSV)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("threat_intelligence"));
}

#[tokio::test]
async fn test_missing_data_type_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(None, Some(AUTH_CSV)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_column_reports_stage() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(Some("email"), Some(AUTH_CSV)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["stage"], "normalize");
    assert!(json["error"].as_str().unwrap().contains("sender"));
}

#[tokio::test]
async fn test_header_only_upload_is_422() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(analyze_request(
            Some("authentication"),
            Some("timestamp,user_id,login_status,geolocation,auth_method\n"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["stage"], "ingest");
}

#[tokio::test]
async fn test_sample_data_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sample_authentication_data.csv"), AUTH_CSV).unwrap();
    let app = app(dir.path());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/sample-data/authentication")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 3);
    assert_eq!(json[1]["login_status"], "failed");

    let missing = app
        .clone()
        .oneshot(Request::builder().uri("/api/sample-data/email").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let unknown = app
        .oneshot(Request::builder().uri("/api/sample-data/firewall").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_count_analyses() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let _ = app
        .clone()
        .oneshot(analyze_request(Some("authentication"), Some(AUTH_CSV)))
        .await
        .unwrap();
    let _ = app
        .clone()
        .oneshot(analyze_request(Some("email"), Some(AUTH_CSV)))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/monitoring/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["analyses_total"], 2);
    assert_eq!(json["analyses_failed"], 1);
    assert_eq!(json["known_threats_total"], 2);
    assert_eq!(json["failures_by_stage"]["normalize"], 1);
}

#[tokio::test]
async fn test_rules_endpoint_lists_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::builder().uri("/api/rules").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["rules"]["authentication"][0]["name"], "failed_login");
}

#[tokio::test]
async fn test_dashboard_serves_static_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>dashboard</html>").unwrap();

    let response = app(dir.path())
        .oneshot(Request::builder().uri("/dashboard/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bundled_dashboard_renders_rows_as_text() {
    let static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../static");
    let config = ServerConfig {
        static_dir,
        ..ServerConfig::default()
    };
    let pipeline = DetectionPipeline::builder().seed(42).build().unwrap();
    let response = DetectionServer::new(config, pipeline)
        .create_app()
        .oneshot(Request::builder().uri("/dashboard/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();

    // CSV のセル値をマークアップとして解釈させない
    assert!(!html.contains("innerHTML"));
    assert!(!html.contains("outerHTML"));
    assert!(!html.contains("insertAdjacentHTML"));
    assert!(html.contains("textContent"));
    assert!(html.contains("createElement"));
}
