use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BridgeProvider, Chain};

/// Step at which a chain failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Swap,
    Bridge,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Swap => f.write_str("swap"),
            FailureStage::Bridge => f.write_str("bridge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFailure {
    pub chain: Chain,
    pub stage: FailureStage,
    pub error: String,
}

impl ChainFailure {
    pub fn new(chain: Chain, stage: FailureStage, error: impl Into<String>) -> Self {
        Self {
            chain,
            stage,
            error: error.into(),
        }
    }
}

/// A chain whose plan ran to the end of its on-chain steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedChain {
    pub chain: Chain,
    pub swap_tx_hash: Option<String>,

    #[serde(with = "crate::amount::option", default)]
    pub swap_output_amount: Option<BigUint>,

    pub bridge_provider: Option<BridgeProvider>,

    /// Set when settlement is still being tracked on the destination
    pub bridge_tx_hash: Option<String>,
}

/// Outcome of processing one consolidation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationExecuteResult {
    pub success: bool,
    pub consolidation_id: String,
    pub executed_chains: Vec<ExecutedChain>,
    pub failed_chains: Vec<ChainFailure>,
    pub partial_success: bool,

    /// Job-level fault that aborted processing
    pub error: Option<String>,
}

impl ConsolidationExecuteResult {
    /// Build a result from per-chain outcomes.
    ///
    /// `success` holds iff no chain failed and no fault occurred;
    /// `partial_success` holds iff something failed and something executed.
    pub fn new(
        consolidation_id: impl Into<String>,
        executed_chains: Vec<ExecutedChain>,
        failed_chains: Vec<ChainFailure>,
        error: Option<String>,
    ) -> Self {
        let failed = !failed_chains.is_empty() || error.is_some();
        Self {
            success: !failed,
            partial_success: failed && !executed_chains.is_empty(),
            consolidation_id: consolidation_id.into(),
            executed_chains,
            failed_chains,
            error,
        }
    }

    pub fn summary(&self) -> String {
        match (&self.error, self.success) {
            (Some(error), _) => format!(
                "consolidation aborted after {} chain(s): {}",
                self.executed_chains.len(),
                error
            ),
            (None, true) => format!(
                "consolidation executed on {} chain(s)",
                self.executed_chains.len()
            ),
            (None, false) => format!(
                "{} chain(s) executed, {} failed",
                self.executed_chains.len(),
                self.failed_chains.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executed(chain: Chain) -> ExecutedChain {
        ExecutedChain {
            chain,
            swap_tx_hash: Some("0x1".into()),
            swap_output_amount: None,
            bridge_provider: None,
            bridge_tx_hash: None,
        }
    }

    #[test]
    fn test_partial_success_invariant() {
        let shapes = [(0usize, 0usize), (2, 0), (0, 2), (1, 1), (3, 2)];
        for (ok, bad) in shapes {
            let result = ConsolidationExecuteResult::new(
                "cons-1",
                Chain::ALL[..ok].iter().copied().map(executed).collect(),
                Chain::ALL[ok..ok + bad]
                    .iter()
                    .map(|c| ChainFailure::new(*c, FailureStage::Swap, "boom"))
                    .collect(),
                None,
            );
            assert_eq!(result.success, bad == 0);
            assert_eq!(result.partial_success, bad > 0 && ok > 0);
        }
    }

    #[test]
    fn test_fault_is_never_success() {
        let result = ConsolidationExecuteResult::new(
            "cons-1",
            vec![executed(Chain::Base)],
            Vec::new(),
            Some("status store unavailable".into()),
        );
        assert!(!result.success);
        assert!(result.partial_success);
        assert!(result.summary().contains("aborted after 1"));
    }
}
