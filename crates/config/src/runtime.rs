//! Conversion of the loaded file into the configs each crate consumes

use dustsweep_engine::{EngineConfig, ServiceConfig};
use dustsweep_optimizer::tables::fallback_bridge_asset;
use dustsweep_optimizer::{BridgeAsset, ChainEconomics, ChainTable, OptimizerConfig};
use dustsweep_queue::WorkerConfig;
use dustsweep_ratelimit::PollBackoff;
use dustsweep_status::TrackerConfig;
use dustsweep_types::Chain;
use std::net::SocketAddr;
use std::time::Duration;

use crate::{AppConfig, ChainSettings, ConfigError, Result};

impl AppConfig {
    pub fn optimizer_config(&self) -> Result<OptimizerConfig> {
        Ok(OptimizerConfig {
            min_sweep_value_usd: self.optimizer.min_sweep_value_usd,
            quote_timeout: Duration::from_millis(self.optimizer.quote_timeout_ms),
            dex_fee_rate: self.optimizer.dex_fee_rate,
            min_output_ratio: self.optimizer.min_output_ratio,
            slippage: self.optimizer.slippage,
            chains: self.chain_table()?,
        })
    }

    /// Chain overrides layered over the built-in gas and stablecoin tables
    pub fn chain_table(&self) -> Result<ChainTable> {
        let mut table = ChainTable::new();
        for (name, settings) in &self.chains {
            let chain: Chain = name
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("chains.{name}: {e}")))?;
            table = table.with_override(chain, chain_economics(chain, settings));
        }
        Ok(table)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            step_timeout: Duration::from_secs(self.worker.step_timeout_secs),
            result_ttl: Duration::from_secs(self.cache.result_ttl_secs),
            tracking_delay: Duration::from_secs(self.tracking.initial_delay_secs),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_chains_per_consolidation: self.service.max_chains_per_consolidation,
            plan_ttl: Duration::from_secs(self.cache.plan_ttl_secs),
            job_ttl: Duration::from_secs(self.cache.job_ttl_secs),
            default_priority: self.service.default_priority,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::default()
            .with_concurrency(self.worker.concurrency)
            .with_jobs_per_second(self.worker.jobs_per_second)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            status_ttl: Duration::from_secs(self.cache.status_ttl_secs),
            max_events: self.cache.max_events,
            max_history: self.cache.max_history,
        }
    }

    pub fn tracking_backoff(&self) -> PollBackoff {
        PollBackoff::new(
            Duration::from_secs(self.tracking.initial_delay_secs),
            Duration::from_secs(self.tracking.max_delay_secs),
            self.tracking.max_attempts,
        )
    }

    /// Address for the metrics server, `None` when metrics are disabled
    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>> {
        if !self.service.metrics_enabled {
            return Ok(None);
        }
        self.service
            .metrics_addr
            .parse()
            .map(Some)
            .map_err(|e| {
                ConfigError::ValidationError(format!(
                    "service.metrics_addr: invalid address '{}': {e}",
                    self.service.metrics_addr
                ))
            })
    }
}

fn chain_economics(chain: Chain, settings: &ChainSettings) -> ChainEconomics {
    // unset stablecoin fields fall back to the canonical USDC deployment
    let native_stablecoin =
        if settings.stablecoin_address.is_some() || settings.stablecoin_decimals.is_some() {
            let fallback = fallback_bridge_asset(chain);
            Some(BridgeAsset::new(
                settings
                    .stablecoin_address
                    .clone()
                    .unwrap_or(fallback.address),
                settings.stablecoin_decimals.unwrap_or(fallback.decimals),
            ))
        } else {
            None
        };

    ChainEconomics {
        gas_estimate_usd: settings.gas_estimate_usd,
        native_stablecoin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_defaults_match_runtime_defaults() {
        let config = AppConfig::default();

        let optimizer = config.optimizer_config().unwrap();
        let builtin = OptimizerConfig::default();
        assert_eq!(optimizer.min_sweep_value_usd, builtin.min_sweep_value_usd);
        assert_eq!(optimizer.quote_timeout, builtin.quote_timeout);
        assert_eq!(optimizer.dex_fee_rate, builtin.dex_fee_rate);
        assert_eq!(optimizer.min_output_ratio, builtin.min_output_ratio);
        assert_eq!(optimizer.slippage, builtin.slippage);

        let engine = config.engine_config();
        assert_eq!(engine.step_timeout, EngineConfig::default().step_timeout);
        assert_eq!(engine.tracking_delay, EngineConfig::default().tracking_delay);

        assert_eq!(config.tracking_backoff(), PollBackoff::default());
        assert_eq!(
            config.service_config().plan_ttl,
            ServiceConfig::default().plan_ttl
        );
    }

    #[test]
    fn test_chain_overrides() {
        let mut config = AppConfig::default();
        config.chains.insert(
            "ethereum".into(),
            ChainSettings {
                gas_estimate_usd: Some(Decimal::new(250, 2)),
                ..Default::default()
            },
        );
        config.chains.insert(
            "bsc".into(),
            ChainSettings {
                stablecoin_address: Some("0x55d398326f99059fF775485246999027B3197955".into()),
                stablecoin_decimals: Some(18),
                ..Default::default()
            },
        );

        let table = config.chain_table().unwrap();
        assert_eq!(table.gas_estimate_usd(Chain::Ethereum), Decimal::new(250, 2));
        assert_eq!(table.gas_estimate_usd(Chain::Base), Decimal::new(5, 2));
        assert_eq!(
            table.bridge_asset(Chain::Bsc).address,
            "0x55d398326f99059fF775485246999027B3197955"
        );
        assert_eq!(table.bridge_asset(Chain::Bsc).decimals, 18);
    }

    #[test]
    fn test_unknown_chain_rejected() {
        let mut config = AppConfig::default();
        config.chains.insert("solana".into(), ChainSettings::default());
        assert!(matches!(
            config.chain_table(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("solana")
        ));
    }

    #[test]
    fn test_metrics_addr() {
        let mut config = AppConfig::default();
        assert_eq!(
            config.metrics_addr().unwrap(),
            Some("0.0.0.0:9090".parse().unwrap())
        );

        config.service.metrics_enabled = false;
        assert_eq!(config.metrics_addr().unwrap(), None);
    }
}
