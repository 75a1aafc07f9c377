use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::collector::MetricsCollector;

const DEFAULT_FILTER: &str = "info,dustsweep=debug";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`; with neither set the filter is `info,dustsweep=debug`.
pub fn init_tracing(
    level: Option<&str>,
    format: LogFormat,
    collector: Option<Arc<MetricsCollector>>,
) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_FILTER)))
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .json()
    });
    let pretty_layer =
        (format == LogFormat::Pretty).then(|| fmt::layer().with_target(true).with_level(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(collector.map(MetricsLayer::new))
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    Ok(())
}

/// Counts error-level events per component
pub struct MetricsLayer {
    collector: Arc<MetricsCollector>,
}

impl MetricsLayer {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::ERROR {
            self.collector.record_error(component_of(metadata.target()));
        }
    }
}

/// Crate name of a tracing target, e.g. `dustsweep_engine` for `dustsweep_engine::engine`
fn component_of(target: &str) -> &str {
    target.split("::").next().unwrap_or(target)
}

/// Correlation ID for tracking a job across components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span context for one consolidation job execution
#[derive(Debug, Clone)]
pub struct ConsolidationSpan {
    pub correlation_id: CorrelationId,
    pub consolidation_id: String,
    pub user_id: String,
}

impl ConsolidationSpan {
    pub fn new(consolidation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            consolidation_id: consolidation_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Span to instrument the job's future with
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "consolidation",
            correlation_id = %self.correlation_id,
            consolidation_id = %self.consolidation_id,
            user_id = %self.user_id,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_generation() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
    }

    #[test]
    fn test_consolidation_span_creation() {
        let span = ConsolidationSpan::new("cons-123", "user-456");

        assert_eq!(span.consolidation_id, "cons-123");
        assert_eq!(span.user_id, "user-456");
        let _ = span.span();
    }

    #[test]
    fn test_component_of_target() {
        assert_eq!(component_of("dustsweep_engine::engine"), "dustsweep_engine");
        assert_eq!(component_of("dustsweep_status"), "dustsweep_status");
    }

    #[test]
    fn test_error_events_counted_per_component() {
        let collector =
            Arc::new(MetricsCollector::with_registry(prometheus::Registry::new()).unwrap());
        init_tracing(Some("warn"), LogFormat::Json, Some(collector.clone())).unwrap();

        tracing::error!(target: "dustsweep_engine::engine", "step failed");
        tracing::warn!(target: "dustsweep_engine::engine", "not counted");

        let text = collector.export_metrics().unwrap();
        assert!(text.contains("dustsweep_errors_total{component=\"dustsweep_engine\"} 1"));

        // the global subscriber can only be installed once
        assert!(init_tracing(None, LogFormat::Pretty, None).is_err());
    }

    #[test]
    fn test_log_format_parses_lowercase() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
