use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    BridgeProvider, BridgeQuote, Chain, ConsolidationOptimizationResult, ConsolidationSource,
    DustToken, ExecutionPriority, PriorityMode,
};

/// Bridge leg attached to a cross-chain plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainBridgePlan {
    pub provider: BridgeProvider,
    pub quote: BridgeQuote,

    #[serde(with = "crate::amount")]
    pub input_amount: BigUint,

    #[serde(with = "crate::amount")]
    pub output_amount: BigUint,

    pub fee_usd: Decimal,
    pub estimated_time_seconds: u64,
}

/// Concrete execution recipe for one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConsolidationPlan {
    pub chain: Chain,
    pub tokens: Vec<DustToken>,

    pub swap_input_value_usd: Decimal,

    /// Bridgeable asset the dust is swapped into
    pub swap_output_token: String,

    #[serde(with = "crate::amount")]
    pub swap_output_amount: BigUint,

    pub swap_output_value_usd: Decimal,
    pub swap_fee_usd: Decimal,
    pub swap_gas_estimate_usd: Decimal,

    /// Absent exactly when the chain is the destination
    pub bridge: Option<ChainBridgePlan>,

    /// swap fee + gas + bridge fee
    pub total_fee_usd: Decimal,
    pub expected_output_usd: Decimal,

    pub priority: ExecutionPriority,
}

impl ChainConsolidationPlan {
    pub fn is_same_chain(&self) -> bool {
        self.bridge.is_none()
    }
}

/// Payload of a consolidation job on the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationJobData {
    pub consolidation_id: String,
    pub plan_id: String,
    pub user_id: String,
    pub user_address: String,
    pub chain_plans: Vec<ChainConsolidationPlan>,
    pub destination_chain: Chain,
    pub destination_token: String,

    /// Pre-authorised token approvals, keyed by chain
    #[serde(default)]
    pub permit_signatures: BTreeMap<Chain, String>,
}

impl ConsolidationJobData {
    pub fn chains(&self) -> Vec<Chain> {
        self.chain_plans.iter().map(|p| p.chain).collect()
    }

    /// Copy of this job restricted to a single chain's plan
    pub fn restricted_to(&self, chain: Chain) -> Self {
        Self {
            chain_plans: self
                .chain_plans
                .iter()
                .filter(|p| p.chain == chain)
                .cloned()
                .collect(),
            permit_signatures: self
                .permit_signatures
                .iter()
                .filter(|(c, _)| **c == chain)
                .map(|(c, s)| (*c, s.clone()))
                .collect(),
            ..self.clone()
        }
    }
}

/// Tokens the user wants swept from one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSource {
    pub chain: Chain,
    pub tokens: Vec<DustToken>,
}

/// Request for a consolidation quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationQuoteRequest {
    pub user_id: String,
    pub user_address: String,
    pub sources: Vec<QuoteSource>,
    pub destination_chain: Chain,
    pub destination_token: String,

    #[serde(default)]
    pub priority: Option<PriorityMode>,

    #[serde(default)]
    pub slippage: Option<Decimal>,
}

/// Quoted plan held until the user executes it or it expires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationPlan {
    pub id: String,
    pub user_id: String,
    pub user_address: String,
    pub sources: Vec<ConsolidationSource>,
    pub optimization: ConsolidationOptimizationResult,
    pub chain_plans: Vec<ChainConsolidationPlan>,
    pub destination_chain: Chain,
    pub destination_token: String,

    pub total_input_value_usd: Decimal,
    pub total_swap_fees_usd: Decimal,
    pub total_bridge_fees_usd: Decimal,
    pub total_gas_usd: Decimal,
    pub total_fees_usd: Decimal,
    pub expected_output_usd: Decimal,

    /// Fees as a percentage of input value
    pub fee_percentage: Decimal,

    pub estimated_total_time_seconds: u64,
    pub strategy: PriorityMode,

    /// Unix timestamps in milliseconds
    pub created_at: u64,
    pub expires_at: u64,
}

impl ConsolidationPlan {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }
}

/// Request to execute a previously quoted plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationExecuteRequest {
    pub plan_id: String,
    pub user_id: String,
    pub user_address: String,

    #[serde(default)]
    pub permit_signatures: BTreeMap<Chain, String>,
}
