//! Core configuration structures for dustsweep

use dustsweep_metrics::LogFormat;
use dustsweep_types::PriorityMode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Process-level settings
    #[serde(default)]
    pub service: ServiceSettings,

    /// Per-chain overrides keyed by chain name
    #[serde(default)]
    pub chains: HashMap<String, ChainSettings>,

    #[serde(default)]
    pub optimizer: OptimizerSettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    /// Bridge settlement polling
    #[serde(default)]
    pub tracking: TrackingSettings,

    /// Retention of plans, jobs, results and status records
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Serve `/metrics` and `/health`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    #[serde(default = "default_max_chains")]
    pub max_chains_per_consolidation: usize,

    /// Priority applied when a quote request names none
    #[serde(default)]
    pub default_priority: PriorityMode,
}

/// Overrides for one chain's economics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Swap gas cost in USD
    #[serde(default)]
    pub gas_estimate_usd: Option<Decimal>,

    /// Stablecoin bridged from this chain instead of canonical USDC
    #[serde(default)]
    pub stablecoin_address: Option<String>,

    #[serde(default)]
    pub stablecoin_decimals: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Chains holding less than this are not swept
    #[serde(default = "default_min_sweep_value_usd")]
    pub min_sweep_value_usd: Decimal,

    #[serde(default = "default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,

    #[serde(default = "default_dex_fee_rate")]
    pub dex_fee_rate: Decimal,

    /// Output/input ratio below which a plan is flagged unprofitable
    #[serde(default = "default_min_output_ratio")]
    pub min_output_ratio: Decimal,

    /// Slippage tolerance requested from bridge quotes
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Jobs processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Job starts allowed per second
    #[serde(default = "default_jobs_per_second")]
    pub jobs_per_second: u32,

    /// Upper bound on a single swap or bridge submission
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Polls before a bridge is declared timed out
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_plan_ttl_secs")]
    pub plan_ttl_secs: u64,

    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,

    /// Events kept per consolidation
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Consolidations kept per user
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_max_chains() -> usize {
    10
}

fn default_min_sweep_value_usd() -> Decimal {
    Decimal::ONE
}

fn default_quote_timeout_ms() -> u64 {
    10_000
}

fn default_dex_fee_rate() -> Decimal {
    Decimal::new(3, 3) // 0.3%
}

fn default_min_output_ratio() -> Decimal {
    Decimal::new(8, 1)
}

fn default_slippage() -> Decimal {
    Decimal::new(5, 3) // 0.5%
}

fn default_concurrency() -> usize {
    3
}

fn default_jobs_per_second() -> u32 {
    5
}

fn default_step_timeout_secs() -> u64 {
    120
}

fn default_initial_delay_secs() -> u64 {
    15
}

fn default_max_delay_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    60
}

fn default_plan_ttl_secs() -> u64 {
    30 * 60
}

fn default_job_ttl_secs() -> u64 {
    60 * 60
}

fn default_result_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_status_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_events() -> usize {
    100
}

fn default_max_history() -> usize {
    500
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_enabled: default_true(),
            metrics_addr: default_metrics_addr(),
            max_chains_per_consolidation: default_max_chains(),
            default_priority: PriorityMode::default(),
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            min_sweep_value_usd: default_min_sweep_value_usd(),
            quote_timeout_ms: default_quote_timeout_ms(),
            dex_fee_rate: default_dex_fee_rate(),
            min_output_ratio: default_min_output_ratio(),
            slippage: default_slippage(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            jobs_per_second: default_jobs_per_second(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            plan_ttl_secs: default_plan_ttl_secs(),
            job_ttl_secs: default_job_ttl_secs(),
            result_ttl_secs: default_result_ttl_secs(),
            status_ttl_secs: default_status_ttl_secs(),
            max_events: default_max_events(),
            max_history: default_max_history(),
        }
    }
}
