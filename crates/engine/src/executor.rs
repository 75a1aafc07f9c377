use async_trait::async_trait;
use dustsweep_optimizer::BridgeQuoteSource;
use dustsweep_types::{BridgeProvider, Chain, ChainConsolidationPlan, TransactionRequest};
use num_bigint::BigUint;
use std::sync::Arc;
use tracing::debug;

use crate::ExecutorError;

#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub tx_hash: String,
    /// Amount of the plan's output token received
    pub output_amount: Option<BigUint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeReceipt {
    pub tx_hash: String,
    pub provider: BridgeProvider,
}

/// Swaps a chain's dust tokens into its bridgeable asset
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute_swap(
        &self,
        chain: Chain,
        plan: &ChainConsolidationPlan,
        user_address: &str,
        permit_signature: Option<&str>,
    ) -> Result<SwapReceipt, ExecutorError>;
}

/// Submits the bridge transfer selected in a chain plan
#[async_trait]
pub trait BridgeExecutor: Send + Sync {
    async fn execute_bridge(
        &self,
        chain: Chain,
        plan: &ChainConsolidationPlan,
        user_address: &str,
        quote_source: &dyn BridgeQuoteSource,
    ) -> Result<BridgeReceipt, ExecutorError>;
}

/// Signs and broadcasts a transaction on its chain
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Returns the transaction hash once the transaction is included
    async fn submit(
        &self,
        request: &TransactionRequest,
        user_address: &str,
    ) -> Result<String, ExecutorError>;
}

/// Bridge executor that builds the route's transaction through the quote source
/// and hands it to a submitter
pub struct QuoteSourceBridgeExecutor {
    submitter: Arc<dyn TransactionSubmitter>,
}

impl QuoteSourceBridgeExecutor {
    pub fn new(submitter: Arc<dyn TransactionSubmitter>) -> Self {
        Self { submitter }
    }
}

#[async_trait]
impl BridgeExecutor for QuoteSourceBridgeExecutor {
    async fn execute_bridge(
        &self,
        chain: Chain,
        plan: &ChainConsolidationPlan,
        user_address: &str,
        quote_source: &dyn BridgeQuoteSource,
    ) -> Result<BridgeReceipt, ExecutorError> {
        let bridge = plan
            .bridge
            .as_ref()
            .ok_or(ExecutorError::MissingBridge { chain })?;

        let request = quote_source.build_transaction(&bridge.quote).await?;
        debug!(
            chain = %chain,
            provider = %bridge.provider,
            to = %request.to,
            "Built bridge transaction"
        );

        let tx_hash = self.submitter.submit(&request, user_address).await?;
        Ok(BridgeReceipt {
            tx_hash,
            provider: bridge.provider,
        })
    }
}
