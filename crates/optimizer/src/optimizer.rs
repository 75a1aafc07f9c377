use dustsweep_types::{
    usd_to_base_units, BridgeQuote, Chain, ChainBridgePlan, ChainConsolidationPlan,
    ChainOptimizationResult, ConsolidationOptimizationResult, ConsolidationSource,
    ExecutionPriority, PriorityMode, RouteRequest, DEX_FEE_RATE,
};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::scoring::{calculate_chain_priority, rank_quotes};
use crate::tables::ChainTable;
use crate::{BridgeQuoteSource, QuoteError};

/// Sources worth less than this are never swept
pub const MIN_SWEEP_VALUE_USD: Decimal = Decimal::ONE;

/// Minimum output/input ratio for a consolidation to count as profitable
pub const MIN_OUTPUT_RATIO: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

const DEFAULT_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Optimizer tuning
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub min_sweep_value_usd: Decimal,
    /// Deadline for a single quote-source call
    pub quote_timeout: Duration,
    pub dex_fee_rate: Decimal,
    pub min_output_ratio: Decimal,
    pub slippage: Decimal,
    pub chains: ChainTable,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_sweep_value_usd: MIN_SWEEP_VALUE_USD,
            quote_timeout: Duration::from_secs(10),
            dex_fee_rate: DEX_FEE_RATE,
            min_output_ratio: MIN_OUTPUT_RATIO,
            slippage: DEFAULT_SLIPPAGE,
            chains: ChainTable::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn with_min_sweep_value(mut self, value: Decimal) -> Self {
        self.min_sweep_value_usd = value;
        self
    }

    pub fn with_quote_timeout(mut self, timeout: Duration) -> Self {
        self.quote_timeout = timeout;
        self
    }

    pub fn with_chains(mut self, chains: ChainTable) -> Self {
        self.chains = chains;
        self
    }
}

/// Expected result of swapping a chain's dust into its bridgeable asset
#[derive(Debug, Clone, PartialEq)]
pub struct SwapEstimate {
    pub output_token: String,
    pub output_amount: BigUint,
    pub output_value_usd: Decimal,
    pub fee_usd: Decimal,
    pub gas_estimate_usd: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profitability {
    pub profitable: bool,
    /// output / input
    pub ratio: Decimal,
    /// output - fees
    pub net_value_usd: Decimal,
}

/// Decides which chains to sweep, which bridge each uses, and in what order
pub struct ConsolidationOptimizer {
    quote_source: Arc<dyn BridgeQuoteSource>,
    config: OptimizerConfig,
}

impl ConsolidationOptimizer {
    pub fn new(quote_source: Arc<dyn BridgeQuoteSource>, config: OptimizerConfig) -> Self {
        Self {
            quote_source,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn quote_source(&self) -> &Arc<dyn BridgeQuoteSource> {
        &self.quote_source
    }

    /// Evaluate every source and rank the survivors for execution
    pub async fn optimize(
        &self,
        sources: &[ConsolidationSource],
        destination_chain: Chain,
        destination_token: &str,
        user_address: &str,
        mode: PriorityMode,
    ) -> ConsolidationOptimizationResult {
        let futures: Vec<_> = sources
            .iter()
            .map(|source| {
                self.optimize_chain(source, destination_chain, destination_token, user_address, mode)
            })
            .collect();

        let chain_results = futures::future::join_all(futures).await;

        let mut ranked: Vec<(Chain, ExecutionPriority)> = chain_results
            .iter()
            .filter(|r| !r.is_skipped())
            .map(|r| (r.chain, r.execution_priority))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1));

        let mut estimated_total_fees_usd = Decimal::ZERO;
        let mut estimated_total_time_seconds = 0;
        for result in chain_results.iter().filter(|r| !r.is_skipped()) {
            estimated_total_fees_usd += self.config.chains.gas_estimate_usd(result.chain);
            if let Some(best) = result.best_option() {
                estimated_total_fees_usd += best.fee_usd;
                estimated_total_time_seconds =
                    estimated_total_time_seconds.max(best.estimated_time_seconds);
            }
        }

        info!(
            sources = sources.len(),
            included = ranked.len(),
            destination = %destination_chain,
            strategy = %mode,
            "Optimized consolidation"
        );

        ConsolidationOptimizationResult {
            chain_results,
            execution_order: ranked.into_iter().map(|(chain, _)| chain).collect(),
            estimated_total_fees_usd,
            estimated_total_time_seconds,
            strategy: mode,
        }
    }

    async fn optimize_chain(
        &self,
        source: &ConsolidationSource,
        destination_chain: Chain,
        destination_token: &str,
        user_address: &str,
        mode: PriorityMode,
    ) -> ChainOptimizationResult {
        let chain = source.chain;
        let value = source.total_value_usd;
        let min = self.config.min_sweep_value_usd;

        if value < min {
            debug!(chain = %chain, value = %value, "Below sweep minimum");
            return ChainOptimizationResult::skipped(
                chain,
                format!("Value ${value:.2} is below the ${min:.2} minimum"),
            );
        }

        if chain == destination_chain {
            return ChainOptimizationResult::same_chain(chain);
        }

        let gas = self.config.chains.gas_estimate_usd(chain);
        let net = value - gas;
        if net < min {
            debug!(chain = %chain, value = %value, gas = %gas, "Unprofitable after gas");
            return ChainOptimizationResult::skipped(
                chain,
                format!(
                    "Unprofitable after gas: ${value:.2} - ${gas:.2} gas = ${net:.2}, below the ${min:.2} minimum"
                ),
            );
        }

        let asset = self.config.chains.bridge_asset(chain);
        let request = RouteRequest {
            source_chain: chain,
            destination_chain,
            source_token: asset.address,
            destination_token: destination_token.to_string(),
            amount: usd_to_base_units(source.estimated_output_usd, asset.decimals),
            user_address: user_address.to_string(),
            slippage: self.config.slippage,
        };

        let quotes = self.fetch_routes(&request).await;
        if quotes.is_empty() {
            return ChainOptimizationResult::skipped(
                chain,
                format!("No bridge routes available from {chain} to {destination_chain}"),
            );
        }

        let bridge_options = rank_quotes(quotes, mode);
        let execution_priority = ExecutionPriority::Scored(calculate_chain_priority(
            gas,
            value,
            mode,
            bridge_options.first(),
        ));

        ChainOptimizationResult {
            chain,
            recommended_bridge: bridge_options.first().map(|b| b.provider),
            bridge_options,
            execution_priority,
            skip_reason: None,
        }
    }

    /// Fetch routes under the quote deadline; failures degrade to no routes
    async fn fetch_routes(&self, request: &RouteRequest) -> Vec<BridgeQuote> {
        let timeout = self.config.quote_timeout;
        let result = tokio::time::timeout(timeout, self.quote_source.get_all_routes(request))
            .await
            .unwrap_or(Err(QuoteError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }));

        match result {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(
                    source_chain = %request.source_chain,
                    destination_chain = %request.destination_chain,
                    error = %e,
                    "Bridge quote request failed"
                );
                Vec::new()
            }
        }
    }

    /// Turn an optimization into concrete per-chain plans, ascending by priority
    pub fn build_chain_plans(
        &self,
        optimization: &ConsolidationOptimizationResult,
        sources: &[ConsolidationSource],
        destination_chain: Chain,
    ) -> Vec<ChainConsolidationPlan> {
        let mut plans = Vec::new();

        for result in optimization.chain_results.iter().filter(|r| !r.is_skipped()) {
            let Some(source) = sources.iter().find(|s| s.chain == result.chain) else {
                warn!(chain = %result.chain, "No source for optimized chain");
                continue;
            };

            let swap = self.calculate_swap_output(source, destination_chain);

            let bridge = if source.chain == destination_chain {
                None
            } else {
                let Some(best) = result.best_option() else {
                    warn!(chain = %source.chain, "Cross-chain result without bridge options");
                    continue;
                };
                Some(ChainBridgePlan {
                    provider: best.provider,
                    quote: best.quote.clone(),
                    input_amount: swap.output_amount.clone(),
                    output_amount: best.output_amount.clone(),
                    fee_usd: best.fee_usd,
                    estimated_time_seconds: best.estimated_time_seconds,
                })
            };

            let bridge_fee = bridge.as_ref().map(|b| b.fee_usd).unwrap_or_default();

            plans.push(ChainConsolidationPlan {
                chain: source.chain,
                tokens: source.tokens.clone(),
                swap_input_value_usd: source.total_value_usd,
                swap_output_token: swap.output_token,
                swap_output_amount: swap.output_amount,
                swap_output_value_usd: swap.output_value_usd,
                swap_fee_usd: swap.fee_usd,
                swap_gas_estimate_usd: swap.gas_estimate_usd,
                total_fee_usd: swap.fee_usd + swap.gas_estimate_usd + bridge_fee,
                expected_output_usd: (swap.output_value_usd - bridge_fee).max(Decimal::ZERO),
                bridge,
                priority: result.execution_priority,
            });
        }

        plans.sort_by(|a, b| a.priority.cmp(&b.priority));
        plans
    }

    /// Flat DEX fee plus static gas, swapping into the chain's bridgeable asset
    pub fn calculate_swap_output(
        &self,
        source: &ConsolidationSource,
        destination_chain: Chain,
    ) -> SwapEstimate {
        let input = source.total_value_usd;
        let fee_usd = input * self.config.dex_fee_rate;
        let gas_estimate_usd = self.config.chains.gas_estimate_usd(source.chain);
        let output_value_usd = (input - fee_usd - gas_estimate_usd).max(Decimal::ZERO);
        let asset = self.config.chains.bridge_asset(source.chain);

        debug!(
            chain = %source.chain,
            destination = %destination_chain,
            input = %input,
            output = %output_value_usd,
            "Estimated swap output"
        );

        SwapEstimate {
            output_amount: usd_to_base_units(output_value_usd, asset.decimals),
            output_token: asset.address,
            output_value_usd,
            fee_usd,
            gas_estimate_usd,
        }
    }

    pub fn is_profitable(
        &self,
        input_usd: Decimal,
        output_usd: Decimal,
        fees_usd: Decimal,
    ) -> Profitability {
        is_profitable_with(input_usd, output_usd, fees_usd, self.config.min_output_ratio)
    }
}

/// Profitability check at the default 0.8 minimum ratio
pub fn is_profitable(input_usd: Decimal, output_usd: Decimal, fees_usd: Decimal) -> Profitability {
    is_profitable_with(input_usd, output_usd, fees_usd, MIN_OUTPUT_RATIO)
}

fn is_profitable_with(
    input_usd: Decimal,
    output_usd: Decimal,
    fees_usd: Decimal,
    min_ratio: Decimal,
) -> Profitability {
    let ratio = if input_usd > Decimal::ZERO {
        output_usd / input_usd
    } else {
        Decimal::ZERO
    };
    let net_value_usd = output_usd - fees_usd;
    Profitability {
        profitable: ratio >= min_ratio && net_value_usd > Decimal::ZERO,
        ratio,
        net_value_usd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockQuoteSource;
    use dustsweep_types::DustToken;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn source(chain: Chain, value: &str) -> ConsolidationSource {
        ConsolidationSource::from_tokens(
            chain,
            vec![DustToken::new(
                "0xtoken",
                "DUST",
                18,
                BigUint::from(1_000_000u32),
                dec(value),
            )],
        )
    }

    fn optimizer(quotes: Arc<MockQuoteSource>) -> ConsolidationOptimizer {
        ConsolidationOptimizer::new(quotes, OptimizerConfig::default())
    }

    #[tokio::test]
    async fn test_below_minimum_is_skipped_without_quoting() {
        let quotes = Arc::new(MockQuoteSource::new());
        let result = optimizer(quotes.clone())
            .optimize(
                &[source(Chain::Arbitrum, "0.50")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;

        let chain = &result.chain_results[0];
        let reason = chain.skip_reason.as_deref().unwrap();
        assert!(reason.contains("$0.50"));
        assert!(reason.contains("$1.00"));
        assert_eq!(chain.execution_priority, ExecutionPriority::Excluded);
        assert!(result.execution_order.is_empty());
        assert_eq!(quotes.route_requests().await, 0);
    }

    #[tokio::test]
    async fn test_same_chain_runs_first_without_quotes() {
        let quotes = Arc::new(MockQuoteSource::new());
        let result = optimizer(quotes.clone())
            .optimize(
                &[source(Chain::Arbitrum, "500"), source(Chain::Base, "2")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;

        let base = result.result_for(Chain::Base).unwrap();
        assert_eq!(base.execution_priority.as_f64(), f64::NEG_INFINITY);
        assert!(base.bridge_options.is_empty());
        assert_eq!(result.execution_order[0], Chain::Base);
        assert_eq!(quotes.route_requests().await, 1);
    }

    #[tokio::test]
    async fn test_gas_heavy_chain_is_skipped() {
        let quotes = Arc::new(MockQuoteSource::new());
        let result = optimizer(quotes)
            .optimize(
                &[source(Chain::Ethereum, "5.50")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;

        let reason = result.chain_results[0].skip_reason.clone().unwrap();
        assert!(reason.starts_with("Unprofitable after gas"));
        assert!(reason.contains("$5.50 - $5.00 gas = $0.50"));
    }

    #[tokio::test]
    async fn test_no_routes_is_skipped() {
        let quotes = Arc::new(MockQuoteSource::new().without_routes_from(Chain::Linea));
        let result = optimizer(quotes)
            .optimize(
                &[source(Chain::Linea, "40")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;

        let reason = result.chain_results[0].skip_reason.clone().unwrap();
        assert_eq!(reason, "No bridge routes available from linea to base");
    }

    #[tokio::test]
    async fn test_quote_failure_degrades_to_skip() {
        let quotes = Arc::new(MockQuoteSource::new().failing_routes());
        let result = optimizer(quotes)
            .optimize(
                &[source(Chain::Optimism, "40")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;
        assert!(result.chain_results[0].is_skipped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_quote_source_times_out() {
        let quotes = Arc::new(MockQuoteSource::new().with_latency(Duration::from_secs(30)));
        let result = optimizer(quotes)
            .optimize(
                &[source(Chain::Optimism, "40")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;
        assert!(result.chain_results[0].is_skipped());
    }

    #[tokio::test]
    async fn test_quote_request_uses_bridge_asset_units() {
        let quotes = Arc::new(MockQuoteSource::new());
        optimizer(quotes.clone())
            .optimize(
                &[source(Chain::Bsc, "100")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;

        let request = quotes.last_request().await.unwrap();
        // $99.70 in 18-decimal BSC USDC
        assert_eq!(request.amount.to_string(), "99700000000000000000");
        assert_eq!(request.source_token, "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d");
    }

    #[tokio::test]
    async fn test_optimize_is_deterministic() {
        let sources = [
            source(Chain::Arbitrum, "50"),
            source(Chain::Polygon, "12"),
            source(Chain::Optimism, "31"),
        ];
        let first = optimizer(Arc::new(MockQuoteSource::new()))
            .optimize(&sources, Chain::Base, "0xusdc", "0xuser", PriorityMode::Speed)
            .await;
        let second = optimizer(Arc::new(MockQuoteSource::new()))
            .optimize(&sources, Chain::Base, "0xusdc", "0xuser", PriorityMode::Speed)
            .await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_totals_use_max_bridge_time() {
        let quotes = Arc::new(MockQuoteSource::new());
        let result = optimizer(quotes)
            .optimize(
                &[source(Chain::Arbitrum, "50"), source(Chain::Optimism, "50")],
                Chain::Base,
                "0xusdc",
                "0xuser",
                PriorityMode::Cost,
            )
            .await;

        let max_time = result
            .chain_results
            .iter()
            .filter_map(|r| r.best_option())
            .map(|b| b.estimated_time_seconds)
            .max()
            .unwrap();
        assert_eq!(result.estimated_total_time_seconds, max_time);

        let expected_fees: Decimal = result
            .chain_results
            .iter()
            .map(|r| dec("0.10") + r.best_option().unwrap().fee_usd)
            .sum();
        assert_eq!(result.estimated_total_fees_usd, expected_fees);
    }

    #[tokio::test]
    async fn test_build_chain_plans() {
        let quotes = Arc::new(MockQuoteSource::new());
        let optimizer = optimizer(quotes);
        let sources = [source(Chain::Arbitrum, "50"), source(Chain::Base, "30")];
        let optimization = optimizer
            .optimize(&sources, Chain::Base, "0xusdc", "0xuser", PriorityMode::Cost)
            .await;
        let plans = optimizer.build_chain_plans(&optimization, &sources, Chain::Base);

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].chain, Chain::Base);
        assert!(plans[0].is_same_chain());

        let arb = &plans[1];
        let bridge = arb.bridge.as_ref().unwrap();
        assert_eq!(
            Some(bridge.provider),
            optimization.result_for(Chain::Arbitrum).unwrap().recommended_bridge
        );
        assert_eq!(bridge.input_amount, arb.swap_output_amount);
        assert_eq!(arb.swap_fee_usd, dec("0.15"));
        assert_eq!(arb.swap_output_value_usd, dec("49.75"));
        assert_eq!(
            arb.total_fee_usd,
            arb.swap_fee_usd + arb.swap_gas_estimate_usd + bridge.fee_usd
        );
        assert_eq!(arb.expected_output_usd, arb.swap_output_value_usd - bridge.fee_usd);
    }

    #[test]
    fn test_is_profitable() {
        let ok = is_profitable(dec("100"), dec("95"), dec("3"));
        assert!(ok.profitable);
        assert_eq!(ok.ratio, dec("0.95"));
        assert_eq!(ok.net_value_usd, dec("92"));

        let poor = is_profitable(dec("10"), dec("7"), dec("5"));
        assert!(!poor.profitable);
        assert_eq!(poor.ratio, dec("0.7"));

        let zero = is_profitable(Decimal::ZERO, dec("1"), Decimal::ZERO);
        assert!(!zero.profitable);
    }
}
