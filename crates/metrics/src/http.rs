use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::collector::MetricsCollector;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Scrape endpoint for the consolidation workers
pub struct MetricsServer {
    collector: Arc<MetricsCollector>,
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(collector: Arc<MetricsCollector>, addr: SocketAddr) -> Self {
        Self { collector, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `/metrics` and `/health` routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(self.collector.clone())
    }

    /// Bind and serve until the task is dropped
    pub async fn serve(self) -> Result<(), MetricsServerError> {
        let app = self.router();
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| MetricsServerError::Bind {
                addr: self.addr,
                reason: e.to_string(),
            })?;

        info!(addr = %self.addr, "Metrics server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| MetricsServerError::Serve(e.to_string()))
    }
}

/// Run the metrics server in the background
pub fn spawn_metrics_server(
    collector: Arc<MetricsCollector>,
    addr: SocketAddr,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let server = MetricsServer::new(collector, addr);
    tokio::spawn(async move {
        server.serve().await?;
        Ok(())
    })
}

async fn metrics_handler(State(collector): State<Arc<MetricsCollector>>) -> Response {
    match collector.export_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    active_consolidations: i64,
}

async fn health_handler(State(collector): State<Arc<MetricsCollector>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        active_consolidations: collector.active_consolidations(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("failed to bind metrics server to {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("metrics server stopped: {0}")]
    Serve(String),
}
