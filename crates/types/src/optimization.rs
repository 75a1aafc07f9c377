use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{BridgeComparison, BridgeProvider, Chain, PriorityMode};

/// Ordering key for chain execution; lower runs earlier.
///
/// `SameChain` sorts before every score and `Excluded` after, matching the
/// numeric values negative and positive infinity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExecutionPriority {
    SameChain,
    Scored(f64),
    Excluded,
}

impl ExecutionPriority {
    pub fn as_f64(&self) -> f64 {
        match self {
            ExecutionPriority::SameChain => f64::NEG_INFINITY,
            ExecutionPriority::Scored(v) => *v,
            ExecutionPriority::Excluded => f64::INFINITY,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, ExecutionPriority::Excluded)
    }
}

impl PartialEq for ExecutionPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExecutionPriority {}

impl PartialOrd for ExecutionPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExecutionPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_f64().total_cmp(&other.as_f64())
    }
}

/// Optimizer verdict for one source chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOptimizationResult {
    pub chain: Chain,

    /// Top-ranked provider; `None` for same-chain and skipped chains
    pub recommended_bridge: Option<BridgeProvider>,

    /// Scored options, best first
    pub bridge_options: Vec<BridgeComparison>,

    pub execution_priority: ExecutionPriority,

    /// Present exactly when the chain is excluded from execution
    pub skip_reason: Option<String>,
}

impl ChainOptimizationResult {
    pub fn skipped(chain: Chain, reason: impl Into<String>) -> Self {
        Self {
            chain,
            recommended_bridge: None,
            bridge_options: Vec::new(),
            execution_priority: ExecutionPriority::Excluded,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn same_chain(chain: Chain) -> Self {
        Self {
            chain,
            recommended_bridge: None,
            bridge_options: Vec::new(),
            execution_priority: ExecutionPriority::SameChain,
            skip_reason: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }

    pub fn best_option(&self) -> Option<&BridgeComparison> {
        self.bridge_options.first()
    }
}

/// Aggregate optimizer output across all sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationOptimizationResult {
    /// One entry per input source, in input order
    pub chain_results: Vec<ChainOptimizationResult>,

    /// Non-skipped chains, ascending by execution priority
    pub execution_order: Vec<Chain>,

    pub estimated_total_fees_usd: Decimal,

    /// Longest single bridge time; chains bridge in parallel once submitted
    pub estimated_total_time_seconds: u64,

    pub strategy: PriorityMode,
}

impl ConsolidationOptimizationResult {
    pub fn result_for(&self, chain: Chain) -> Option<&ChainOptimizationResult> {
        self.chain_results.iter().find(|r| r.chain == chain)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ChainOptimizationResult> {
        self.chain_results.iter().filter(|r| r.is_skipped())
    }
}
