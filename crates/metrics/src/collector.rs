use std::sync::Arc;
use std::time::Duration;

use dustsweep_types::{BridgeProvider, BridgeStatus, Chain, ConsolidationState, FailureStage};
use prometheus::{Encoder, Registry, TextEncoder};

use crate::metrics::{ConsolidationMetrics, GLOBAL_METRICS};

/// Metrics collector for the consolidation pipeline
pub struct MetricsCollector {
    registry: Registry,
    metrics: Arc<ConsolidationMetrics>,
}

impl MetricsCollector {
    /// Collector backed by the process-wide default registry
    pub fn new() -> Result<Self, MetricsError> {
        let metrics = GLOBAL_METRICS
            .as_ref()
            .map_err(|e| MetricsError::RegistryError(e.clone()))?;
        Ok(Self {
            registry: prometheus::default_registry().clone(),
            metrics: metrics.clone(),
        })
    }

    /// Collector with its own metric set registered on `registry`
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let metrics = ConsolidationMetrics::register(&registry)
            .map_err(|e| MetricsError::RegistryError(e.to_string()))?;
        Ok(Self {
            registry,
            metrics: Arc::new(metrics),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONSOLIDATION METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_consolidation_started(&self) {
        self.metrics.consolidations_started.inc();
        self.metrics.active_consolidations.inc();
    }

    /// Record a job leaving the worker with its final state
    pub fn record_consolidation_finished(&self, state: ConsolidationState, duration: Duration) {
        let state_str = match state {
            ConsolidationState::Queued => "queued",
            ConsolidationState::Executing => "executing",
            ConsolidationState::Completed => "completed",
            ConsolidationState::PartialSuccess => "partial_success",
            ConsolidationState::Failed => "failed",
        };

        self.metrics
            .consolidations_finished
            .with_label_values(&[state_str])
            .inc();
        self.metrics.active_consolidations.dec();
        self.metrics
            .consolidation_duration
            .observe(duration.as_millis() as f64);
    }

    /// Jobs started and not yet finished
    pub fn active_consolidations(&self) -> i64 {
        self.metrics.active_consolidations.get()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CHAIN METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record one swap or bridge step
    pub fn record_chain_step(
        &self,
        chain: Chain,
        stage: FailureStage,
        success: bool,
        duration: Duration,
    ) {
        let stage_str = match stage {
            FailureStage::Swap => "swap",
            FailureStage::Bridge => "bridge",
        };
        let outcome = if success { "success" } else { "failure" };

        self.metrics
            .chain_operations
            .with_label_values(&[chain.as_str(), stage_str, outcome])
            .inc();
        self.metrics
            .chain_step_duration
            .with_label_values(&[stage_str])
            .observe(duration.as_millis() as f64);
    }

    pub fn record_chain_skipped(&self, chain: Chain) {
        self.metrics
            .chains_skipped
            .with_label_values(&[chain.as_str()])
            .inc();
    }

    pub fn record_chain_retry(&self, chain: Chain) {
        self.metrics
            .chain_retries
            .with_label_values(&[chain.as_str()])
            .inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUOTE AND BRIDGE METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record a quote request; `failure` names why no plan was produced
    pub fn record_quote(&self, latency: Duration, failure: Option<&str>) {
        self.metrics.quote_requests.inc();
        self.metrics.quote_latency.observe(latency.as_millis() as f64);

        if let Some(reason) = failure {
            self.metrics
                .quote_failures
                .with_label_values(&[reason])
                .inc();
        }
    }

    pub fn record_bridge_status(&self, provider: BridgeProvider, status: &BridgeStatus) {
        let status_str = match status {
            BridgeStatus::Pending => "pending",
            BridgeStatus::Completed { .. } => "completed",
            BridgeStatus::Failed { .. } => "failed",
            BridgeStatus::Refunded { .. } => "refunded",
        };

        self.metrics
            .bridge_status_checks
            .with_label_values(&[provider.as_str(), status_str])
            .inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn record_error(&self, component: &str) {
        self.metrics.errors.with_label_values(&[component]).inc();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingError(e.to_string()))
    }
}

/// Metrics error types
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding error: {0}")]
    EncodingError(String),
    #[error("registry error: {0}")]
    RegistryError(String),
}
