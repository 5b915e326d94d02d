//! HTTP server implementation

use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use utdrs_engine::DetectionPipeline;
use utdrs_observability::{AnalysisCounters, HealthMonitor};

use crate::handlers::AppState;
use crate::monitoring::PipelineMonitor;
use crate::routes::create_router;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Directory served under `/dashboard`
    pub static_dir: PathBuf,

    /// Directory holding `sample_{data_type}_data.csv`
    pub sample_dir: PathBuf,

    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
            sample_dir: PathBuf::from("data"),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    pub fn address(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid server address {}:{}: {}", self.host, self.port, e))
    }

    /// Browser-facing dashboard URL
    pub fn dashboard_url(&self) -> String {
        let host = if self.host == "0.0.0.0" { "localhost" } else { self.host.as_str() };
        format!("http://{}:{}/dashboard/", host, self.port)
    }
}

/// Detection API server
pub struct DetectionServer {
    config: ServerConfig,
    app_state: AppState,
}

impl DetectionServer {
    /// Create a server with its own counters and pipeline monitor
    pub fn new(config: ServerConfig, pipeline: DetectionPipeline) -> Self {
        let pipeline = Arc::new(pipeline);
        let counters = Arc::new(AnalysisCounters::new());
        let monitoring: Arc<dyn HealthMonitor> = Arc::new(PipelineMonitor::new(
            pipeline.clone(),
            counters.clone(),
            config.clone(),
        ));
        Self::with_monitor(config, pipeline, counters, monitoring)
    }

    /// Create a server with a custom health monitor
    pub fn with_monitor(
        config: ServerConfig,
        pipeline: Arc<DetectionPipeline>,
        counters: Arc<AnalysisCounters>,
        monitoring: Arc<dyn HealthMonitor>,
    ) -> Self {
        if !config.static_dir.is_dir() {
            warn!("Static directory {} does not exist", config.static_dir.display());
        }

        let app_state = AppState {
            pipeline,
            counters,
            monitoring,
            config: Arc::new(config.clone()),
            start_time: Instant::now(),
        };

        Self { config, app_state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Create the application router
    pub fn create_app(&self) -> Router {
        create_router(Arc::new(self.app_state.clone()))
    }

    /// Start the server
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = self.config.address()?;
        let app = self.create_app();

        info!("Starting detection API server on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        info!("Dashboard available at {}", self.config.dashboard_url());

        axum::serve(listener, app).await.map_err(|e| {
            error!("Server error: {}", e);
            e.into()
        })
    }

    /// Run the server with graceful shutdown
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = self.config.address()?;
        let app = self.create_app();

        info!("Starting detection API server on {} with graceful shutdown", addr);

        let listener = TcpListener::bind(addr).await?;
        info!("Dashboard available at {}", self.config.dashboard_url());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                e.into()
            })
    }
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parsing() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(config.address().unwrap().port(), 9000);
        assert_eq!(config.dashboard_url(), "http://127.0.0.1:9000/dashboard/");

        let bad = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad.address().is_err());
    }

    #[test]
    fn test_wildcard_host_dashboard_url() {
        assert_eq!(ServerConfig::default().dashboard_url(), "http://localhost:8000/dashboard/");
    }
}
