//! Metrics and monitoring for dustsweep
//!
//! Prometheus metrics for consolidation jobs, chain steps, quotes and bridge
//! tracking, an HTTP endpoint for scraping, and tracing initialisation with
//! per-job correlation ids.
//!
//! # Example
//!
//! ```no_run
//! use dustsweep_metrics::{MetricsCollector, MetricsServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let collector = Arc::new(MetricsCollector::new()?);
//!     collector.record_consolidation_started();
//!
//!     let server = MetricsServer::new(collector.clone(), "0.0.0.0:9090".parse()?);
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{MetricsCollector, MetricsError};
pub use http::{spawn_metrics_server, MetricsServer, MetricsServerError};
pub use self::tracing::{
    init_tracing, ConsolidationSpan, CorrelationId, LogFormat, MetricsLayer, TracingError,
};
