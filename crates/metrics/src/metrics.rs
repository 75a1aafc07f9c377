use lazy_static::lazy_static;
use prometheus::{
    histogram_opts, opts, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
};
use std::sync::Arc;

/// Every metric the consolidation pipeline exports
pub struct ConsolidationMetrics {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONSOLIDATION METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Jobs picked up by a worker
    pub consolidations_started: IntCounter,

    /// Jobs finished, by final state
    pub consolidations_finished: IntCounterVec,

    /// Jobs currently executing
    pub active_consolidations: IntGauge,

    /// Job wall time in milliseconds
    pub consolidation_duration: Histogram,

    // ═══════════════════════════════════════════════════════════════════════════
    // CHAIN METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Swap and bridge steps, by chain, stage and outcome
    pub chain_operations: IntCounterVec,

    /// Swap and bridge step latency in milliseconds
    pub chain_step_duration: HistogramVec,

    /// Chains dropped during optimization
    pub chains_skipped: IntCounterVec,

    /// Failed chains re-enqueued
    pub chain_retries: IntCounterVec,

    // ═══════════════════════════════════════════════════════════════════════════
    // QUOTE AND BRIDGE METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Consolidation quotes requested
    pub quote_requests: IntCounter,

    /// Quotes that produced no plan, by reason
    pub quote_failures: IntCounterVec,

    /// Quote generation latency in milliseconds
    pub quote_latency: Histogram,

    /// Bridge settlement status checks, by provider and observed status
    pub bridge_status_checks: IntCounterVec,

    // ═══════════════════════════════════════════════════════════════════════════
    // SYSTEM METRICS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Error-level log events, by component
    pub errors: IntCounterVec,
}

impl ConsolidationMetrics {
    /// Create the metric set and register it with `registry`
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self {
            consolidations_started: IntCounter::with_opts(opts!(
                "dustsweep_consolidations_started_total",
                "Total consolidation jobs started"
            ))?,
            consolidations_finished: IntCounterVec::new(
                opts!(
                    "dustsweep_consolidations_finished_total",
                    "Total consolidation jobs finished by final state"
                ),
                &["state"],
            )?,
            active_consolidations: IntGauge::with_opts(opts!(
                "dustsweep_consolidations_active",
                "Consolidation jobs currently executing"
            ))?,
            consolidation_duration: Histogram::with_opts(histogram_opts!(
                "dustsweep_consolidation_duration_ms",
                "Consolidation job duration in milliseconds",
                vec![1000.0, 5000.0, 15000.0, 30000.0, 60000.0, 180000.0, 600000.0]
            ))?,
            chain_operations: IntCounterVec::new(
                opts!(
                    "dustsweep_chain_operations_total",
                    "Chain swap and bridge steps by outcome"
                ),
                &["chain", "stage", "outcome"],
            )?,
            chain_step_duration: HistogramVec::new(
                histogram_opts!(
                    "dustsweep_chain_step_duration_ms",
                    "Chain swap and bridge step duration in milliseconds",
                    vec![100.0, 500.0, 1000.0, 5000.0, 15000.0, 60000.0, 120000.0]
                ),
                &["stage"],
            )?,
            chains_skipped: IntCounterVec::new(
                opts!(
                    "dustsweep_chains_skipped_total",
                    "Source chains skipped during optimization"
                ),
                &["chain"],
            )?,
            chain_retries: IntCounterVec::new(
                opts!("dustsweep_chain_retries_total", "Failed chains retried"),
                &["chain"],
            )?,
            quote_requests: IntCounter::with_opts(opts!(
                "dustsweep_quote_requests_total",
                "Total consolidation quotes requested"
            ))?,
            quote_failures: IntCounterVec::new(
                opts!(
                    "dustsweep_quote_failures_total",
                    "Consolidation quotes that produced no plan"
                ),
                &["reason"],
            )?,
            quote_latency: Histogram::with_opts(histogram_opts!(
                "dustsweep_quote_latency_ms",
                "Consolidation quote latency in milliseconds",
                vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 10000.0]
            ))?,
            bridge_status_checks: IntCounterVec::new(
                opts!(
                    "dustsweep_bridge_status_checks_total",
                    "Bridge settlement status checks"
                ),
                &["provider", "status"],
            )?,
            errors: IntCounterVec::new(
                opts!("dustsweep_errors_total", "Error events by component"),
                &["component"],
            )?,
        };

        registry.register(Box::new(metrics.consolidations_started.clone()))?;
        registry.register(Box::new(metrics.consolidations_finished.clone()))?;
        registry.register(Box::new(metrics.active_consolidations.clone()))?;
        registry.register(Box::new(metrics.consolidation_duration.clone()))?;
        registry.register(Box::new(metrics.chain_operations.clone()))?;
        registry.register(Box::new(metrics.chain_step_duration.clone()))?;
        registry.register(Box::new(metrics.chains_skipped.clone()))?;
        registry.register(Box::new(metrics.chain_retries.clone()))?;
        registry.register(Box::new(metrics.quote_requests.clone()))?;
        registry.register(Box::new(metrics.quote_failures.clone()))?;
        registry.register(Box::new(metrics.quote_latency.clone()))?;
        registry.register(Box::new(metrics.bridge_status_checks.clone()))?;
        registry.register(Box::new(metrics.errors.clone()))?;

        Ok(metrics)
    }
}

lazy_static! {
    /// Process-wide metric set on the default prometheus registry
    pub static ref GLOBAL_METRICS: Result<Arc<ConsolidationMetrics>, String> =
        ConsolidationMetrics::register(prometheus::default_registry())
            .map(Arc::new)
            .map_err(|e| e.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_on_one_registry_fails() {
        let registry = Registry::new();
        assert!(ConsolidationMetrics::register(&registry).is_ok());
        assert!(ConsolidationMetrics::register(&registry).is_err());
    }

    #[test]
    fn test_global_metrics_available() {
        assert!(GLOBAL_METRICS.is_ok());
    }
}
