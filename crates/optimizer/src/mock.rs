use async_trait::async_trait;
use dustsweep_types::{
    BridgeProvider, BridgeQuote, BridgeStatus, Chain, RouteRequest, TransactionRequest,
};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::{BridgeQuoteSource, QuoteError};

/// Deterministic quote source for tests and local runs.
///
/// Every route request yields the same three quotes (across, stargate, hop)
/// with fees and times derived from the source chain only.
#[derive(Default)]
pub struct MockQuoteSource {
    no_routes: HashSet<Chain>,
    fail_routes: bool,
    fail_builds: bool,
    fail_status: bool,
    latency: Option<Duration>,
    requests: RwLock<Vec<RouteRequest>>,
    statuses: RwLock<HashMap<String, BridgeStatus>>,
    status_queries: RwLock<HashMap<String, u32>>,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_routes_from(mut self, chain: Chain) -> Self {
        self.no_routes.insert(chain);
        self
    }

    pub fn failing_routes(mut self) -> Self {
        self.fail_routes = true;
        self
    }

    pub fn failing_builds(mut self) -> Self {
        self.fail_builds = true;
        self
    }

    pub fn failing_status_queries(mut self) -> Self {
        self.fail_status = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Status reported for a source transaction from now on
    pub async fn set_status(&self, tx_hash: &str, status: BridgeStatus) {
        self.statuses.write().await.insert(tx_hash.to_string(), status);
    }

    pub async fn route_requests(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn last_request(&self) -> Option<RouteRequest> {
        self.requests.read().await.last().cloned()
    }

    pub async fn status_queries(&self, tx_hash: &str) -> u32 {
        self.status_queries
            .read()
            .await
            .get(tx_hash)
            .copied()
            .unwrap_or(0)
    }

    fn quote(
        request: &RouteRequest,
        provider: BridgeProvider,
        fee_cents: i64,
        seconds: u64,
        fast: bool,
    ) -> BridgeQuote {
        let chain_offset = request.source_chain.chain_id() as i64 % 7;
        let output = &request.amount * BigUint::from(995u32) / BigUint::from(1000u32);
        BridgeQuote {
            provider,
            quote_id: format!("{}-{}-{}", provider, request.source_chain, request.destination_chain),
            source_chain: request.source_chain,
            destination_chain: request.destination_chain,
            input_amount: request.amount.clone(),
            output_amount: output,
            fee_usd: Decimal::new(fee_cents + chain_offset, 2),
            estimated_time_seconds: seconds + chain_offset as u64 * 30,
            is_fast_fill: fast,
            payload: serde_json::json!({ "route": provider.as_str() }),
        }
    }
}

#[async_trait]
impl BridgeQuoteSource for MockQuoteSource {
    async fn get_all_routes(&self, request: &RouteRequest) -> Result<Vec<BridgeQuote>, QuoteError> {
        self.requests.write().await.push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_routes {
            return Err(QuoteError::Provider("aggregator unavailable".into()));
        }
        if self.no_routes.contains(&request.source_chain) {
            return Ok(Vec::new());
        }

        Ok(vec![
            Self::quote(request, BridgeProvider::Stargate, 30, 900, false),
            Self::quote(request, BridgeProvider::Across, 50, 60, true),
            Self::quote(request, BridgeProvider::Hop, 80, 600, false),
        ])
    }

    async fn build_transaction(
        &self,
        quote: &BridgeQuote,
    ) -> Result<TransactionRequest, QuoteError> {
        if self.fail_builds {
            return Err(QuoteError::BuildFailed {
                reason: format!("{} route expired", quote.provider),
            });
        }
        Ok(TransactionRequest {
            chain: quote.source_chain,
            to: format!("0x{}", quote.provider),
            data: format!("0x{}", quote.quote_id.len()),
            value: BigUint::default(),
            gas_limit: Some(250_000),
        })
    }

    async fn bridge_status(
        &self,
        source_tx_hash: &str,
        _source_chain: Chain,
        _provider: BridgeProvider,
    ) -> Result<BridgeStatus, QuoteError> {
        *self
            .status_queries
            .write()
            .await
            .entry(source_tx_hash.to_string())
            .or_insert(0) += 1;

        if self.fail_status {
            return Err(QuoteError::StatusQuery("status endpoint unavailable".into()));
        }

        Ok(self
            .statuses
            .read()
            .await
            .get(source_tx_hash)
            .cloned()
            .unwrap_or(BridgeStatus::Pending))
    }
}
