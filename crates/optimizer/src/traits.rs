use async_trait::async_trait;
use dustsweep_types::{
    BridgeProvider, BridgeQuote, BridgeStatus, Chain, RouteRequest, TransactionRequest,
};

use crate::QuoteError;

/// Source of bridge routes across all supported providers
#[async_trait]
pub trait BridgeQuoteSource: Send + Sync {
    /// Fetch every route any provider offers for the request
    async fn get_all_routes(&self, request: &RouteRequest) -> Result<Vec<BridgeQuote>, QuoteError>;

    /// Build the source-chain transaction that executes a quote
    async fn build_transaction(&self, quote: &BridgeQuote)
        -> Result<TransactionRequest, QuoteError>;

    /// Query settlement state of a submitted transfer
    async fn bridge_status(
        &self,
        source_tx_hash: &str,
        source_chain: Chain,
        provider: BridgeProvider,
    ) -> Result<BridgeStatus, QuoteError>;

    /// Health check
    async fn health_check(&self) -> bool {
        true
    }
}
