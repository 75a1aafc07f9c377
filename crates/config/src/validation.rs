//! Configuration validation

use crate::{AppConfig, ChainSettings, ConfigError, Result};
use dustsweep_types::Chain;
use rust_decimal::Decimal;
use std::net::SocketAddr;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Service
    if let Err(e) = validate_log_level(&config.service.log_level) {
        errors.push(e);
    }

    if config.service.metrics_enabled
        && config.service.metrics_addr.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "service.metrics_addr",
            format!("invalid socket address '{}'", config.service.metrics_addr),
        ));
    }

    if config.service.max_chains_per_consolidation == 0 {
        errors.push(ValidationError::new(
            "service.max_chains_per_consolidation",
            "must be greater than 0",
        ));
    }

    // Chains
    for (chain_name, settings) in &config.chains {
        if let Err(e) = chain_name.parse::<Chain>() {
            errors.push(ValidationError::new(
                format!("chains.{chain_name}"),
                e.to_string(),
            ));
            continue;
        }
        if let Err(e) = validate_chain_settings(settings) {
            errors.push(ValidationError::new(format!("chains.{chain_name}"), e));
        }
    }

    // Optimizer
    let optimizer = &config.optimizer;
    if optimizer.min_sweep_value_usd <= Decimal::ZERO {
        errors.push(ValidationError::new(
            "optimizer.min_sweep_value_usd",
            "must be greater than 0",
        ));
    }

    if optimizer.quote_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "optimizer.quote_timeout_ms",
            "must be greater than 0",
        ));
    }

    if optimizer.dex_fee_rate < Decimal::ZERO || optimizer.dex_fee_rate >= Decimal::ONE {
        errors.push(ValidationError::new(
            "optimizer.dex_fee_rate",
            "must be in [0, 1)",
        ));
    }

    if optimizer.min_output_ratio <= Decimal::ZERO || optimizer.min_output_ratio > Decimal::ONE {
        errors.push(ValidationError::new(
            "optimizer.min_output_ratio",
            "must be in (0, 1]",
        ));
    }

    if optimizer.slippage <= Decimal::ZERO || optimizer.slippage > Decimal::new(5, 1) {
        errors.push(ValidationError::new(
            "optimizer.slippage",
            "must be in (0, 0.5]",
        ));
    }

    // Worker
    if config.worker.concurrency == 0 {
        errors.push(ValidationError::new(
            "worker.concurrency",
            "must be greater than 0",
        ));
    }

    if config.worker.jobs_per_second == 0 {
        errors.push(ValidationError::new(
            "worker.jobs_per_second",
            "must be greater than 0",
        ));
    }

    if config.worker.step_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "worker.step_timeout_secs",
            "must be greater than 0",
        ));
    }

    // Tracking
    if config.tracking.initial_delay_secs == 0 {
        errors.push(ValidationError::new(
            "tracking.initial_delay_secs",
            "must be greater than 0",
        ));
    }

    if config.tracking.max_delay_secs < config.tracking.initial_delay_secs {
        errors.push(ValidationError::new(
            "tracking.max_delay_secs",
            "must be >= initial_delay_secs",
        ));
    }

    if config.tracking.max_attempts == 0 {
        errors.push(ValidationError::new(
            "tracking.max_attempts",
            "must be greater than 0",
        ));
    }

    // Cache
    let ttls = [
        ("cache.plan_ttl_secs", config.cache.plan_ttl_secs),
        ("cache.job_ttl_secs", config.cache.job_ttl_secs),
        ("cache.result_ttl_secs", config.cache.result_ttl_secs),
        ("cache.status_ttl_secs", config.cache.status_ttl_secs),
    ];
    for (field, ttl) in ttls {
        if ttl == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    // job payloads must outlive the plan they were built from
    if config.cache.job_ttl_secs < config.cache.plan_ttl_secs {
        errors.push(ValidationError::new(
            "cache.job_ttl_secs",
            "must be >= plan_ttl_secs",
        ));
    }

    if config.cache.max_events == 0 {
        errors.push(ValidationError::new(
            "cache.max_events",
            "must be greater than 0",
        ));
    }

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate one chain's overrides
pub fn validate_chain_settings(settings: &ChainSettings) -> std::result::Result<(), String> {
    if let Some(gas) = settings.gas_estimate_usd {
        if gas < Decimal::ZERO {
            return Err("gas_estimate_usd cannot be negative".to_string());
        }
    }

    if let Some(address) = &settings.stablecoin_address {
        validate_address(address)?;
    }

    if let Some(decimals) = settings.stablecoin_decimals {
        if decimals > 36 {
            return Err("stablecoin_decimals must be <= 36".to_string());
        }
    }

    Ok(())
}

/// Validate a 20-byte hex token address
pub fn validate_address(address: &str) -> std::result::Result<(), String> {
    let hex = address
        .strip_prefix("0x")
        .ok_or_else(|| format!("address '{address}' must start with 0x"))?;

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{address}' must be 40 hex characters"));
    }

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "service.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
