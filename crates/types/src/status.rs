use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BridgeProvider, Chain, ChainFailure, ConsolidationJobData};

/// Per-chain operation state.
///
/// `pending → swap_started → swap_completed → (bridging →) completed`, with
/// `failed` reachable from any non-terminal state. The only backwards edge is
/// `failed → pending`, taken by an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOperationStatus {
    Pending,
    SwapStarted,
    SwapCompleted,
    Bridging,
    Completed,
    Failed,
}

impl ChainOperationStatus {
    pub fn can_transition_to(&self, next: ChainOperationStatus) -> bool {
        use ChainOperationStatus::*;
        matches!(
            (self, next),
            (Pending, SwapStarted | Failed)
                | (SwapStarted, SwapCompleted | Failed)
                | (SwapCompleted, Bridging | Completed | Failed)
                | (Bridging, Completed | Failed)
                | (Failed, Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainOperationStatus::Completed | ChainOperationStatus::Failed
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ChainOperationStatus::SwapStarted
                | ChainOperationStatus::SwapCompleted
                | ChainOperationStatus::Bridging
        )
    }

    /// Contribution of a chain in this state to overall progress
    pub fn progress_weight(&self) -> u32 {
        match self {
            ChainOperationStatus::Pending => 0,
            ChainOperationStatus::SwapStarted => 25,
            ChainOperationStatus::SwapCompleted => 50,
            ChainOperationStatus::Bridging => 75,
            ChainOperationStatus::Completed | ChainOperationStatus::Failed => 100,
        }
    }
}

impl fmt::Display for ChainOperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainOperationStatus::Pending => "pending",
            ChainOperationStatus::SwapStarted => "swap_started",
            ChainOperationStatus::SwapCompleted => "swap_completed",
            ChainOperationStatus::Bridging => "bridging",
            ChainOperationStatus::Completed => "completed",
            ChainOperationStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Overall consolidation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationState {
    Queued,
    Executing,
    Completed,
    PartialSuccess,
    Failed,
}

impl ConsolidationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsolidationState::Completed
                | ConsolidationState::PartialSuccess
                | ConsolidationState::Failed
        )
    }
}

/// Tracked state of one chain within a consolidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOperationDetail {
    pub chain: Chain,
    pub status: ChainOperationStatus,
    pub input_value_usd: Decimal,

    pub swap_tx_hash: Option<String>,

    #[serde(with = "crate::amount::option", default)]
    pub swap_output_amount: Option<BigUint>,

    pub bridge_provider: Option<BridgeProvider>,
    pub bridge_tx_hash: Option<String>,
    pub destination_tx_hash: Option<String>,

    /// Amount delivered on the destination chain
    #[serde(with = "crate::amount::option", default)]
    pub output_amount: Option<BigUint>,

    pub output_value_usd: Option<Decimal>,

    pub swap_error: Option<String>,
    pub bridge_error: Option<String>,
    pub error: Option<String>,

    pub retry_count: u32,

    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
}

impl ChainOperationDetail {
    pub fn pending(chain: Chain, input_value_usd: Decimal) -> Self {
        Self {
            chain,
            status: ChainOperationStatus::Pending,
            input_value_usd,
            swap_tx_hash: None,
            swap_output_amount: None,
            bridge_provider: None,
            bridge_tx_hash: None,
            destination_tx_hash: None,
            output_amount: None,
            output_value_usd: None,
            swap_error: None,
            bridge_error: None,
            error: None,
            retry_count: 0,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn clear_errors(&mut self) {
        self.swap_error = None;
        self.bridge_error = None;
        self.error = None;
    }
}

/// Full status record for one consolidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationStatusDetail {
    pub id: String,
    pub plan_id: String,
    pub user_id: String,
    pub status: ConsolidationState,
    pub chain_operations: Vec<ChainOperationDetail>,
    pub completed_chains: usize,
    pub total_chains: usize,
    pub progress_percent: u8,
    pub total_input_value_usd: Decimal,
    pub total_output_value_usd: Decimal,
    pub total_fees_usd: Decimal,
    pub destination_chain: Chain,
    pub destination_token: String,

    /// Chain failures in the order they were recorded
    pub errors: Vec<ChainFailure>,

    /// Job-level fault that aborted the last execution attempt
    pub fault: Option<String>,

    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub updated_at: u64,
}

impl ConsolidationStatusDetail {
    pub fn from_job(job: &ConsolidationJobData, now_ms: u64) -> Self {
        let chain_operations: Vec<_> = job
            .chain_plans
            .iter()
            .map(|plan| {
                let mut op = ChainOperationDetail::pending(plan.chain, plan.swap_input_value_usd);
                op.bridge_provider = plan.bridge.as_ref().map(|b| b.provider);
                op
            })
            .collect();

        let mut detail = Self {
            id: job.consolidation_id.clone(),
            plan_id: job.plan_id.clone(),
            user_id: job.user_id.clone(),
            status: ConsolidationState::Queued,
            total_chains: chain_operations.len(),
            completed_chains: 0,
            progress_percent: 0,
            total_input_value_usd: job.chain_plans.iter().map(|p| p.swap_input_value_usd).sum(),
            total_output_value_usd: Decimal::ZERO,
            total_fees_usd: Decimal::ZERO,
            chain_operations,
            destination_chain: job.destination_chain,
            destination_token: job.destination_token.clone(),
            errors: Vec::new(),
            fault: None,
            created_at: now_ms,
            started_at: None,
            completed_at: None,
            updated_at: now_ms,
        };
        detail.refresh(now_ms);
        detail
    }

    pub fn chain(&self, chain: Chain) -> Option<&ChainOperationDetail> {
        self.chain_operations.iter().find(|op| op.chain == chain)
    }

    pub fn chain_mut(&mut self, chain: Chain) -> Option<&mut ChainOperationDetail> {
        self.chain_operations.iter_mut().find(|op| op.chain == chain)
    }

    /// Floor of the mean per-chain progress weight
    pub fn calculate_progress(&self) -> u8 {
        if self.chain_operations.is_empty() {
            return 100;
        }
        let total: u32 = self
            .chain_operations
            .iter()
            .map(|op| op.status.progress_weight())
            .sum();
        (total / self.chain_operations.len() as u32) as u8
    }

    pub fn derive_overall_status(&self) -> ConsolidationState {
        if self.fault.is_some() {
            return ConsolidationState::Failed;
        }

        let ops = &self.chain_operations;
        if ops.iter().all(|op| op.status.is_terminal()) {
            let failed = ops
                .iter()
                .filter(|op| op.status == ChainOperationStatus::Failed)
                .count();
            let succeeded = ops
                .iter()
                .filter(|op| op.status == ChainOperationStatus::Completed)
                .count();
            return match (failed, succeeded) {
                (0, _) => ConsolidationState::Completed,
                (_, 0) => ConsolidationState::Failed,
                _ => ConsolidationState::PartialSuccess,
            };
        }

        let all_pending = ops
            .iter()
            .all(|op| op.status == ChainOperationStatus::Pending);
        if all_pending && self.started_at.is_none() {
            ConsolidationState::Queued
        } else {
            ConsolidationState::Executing
        }
    }

    /// Recompute derived counters and the overall state
    pub fn refresh(&mut self, now_ms: u64) {
        self.completed_chains = self
            .chain_operations
            .iter()
            .filter(|op| op.status == ChainOperationStatus::Completed)
            .count();
        self.total_chains = self.chain_operations.len();
        self.progress_percent = self.calculate_progress();
        self.status = self.derive_overall_status();
        self.completed_at = if self.status.is_terminal() {
            self.completed_at.or(Some(now_ms))
        } else {
            None
        };
        self.updated_at = now_ms;
    }
}

/// Kinds of status events published while a consolidation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationEventKind {
    ConsolidationStarted,
    ChainSwapStarted,
    ChainSwapCompleted,
    ChainBridgeStarted,
    ChainBridgeCompleted,
    ChainCompleted,
    ChainFailed,
    ChainRetried,
    ConsolidationCompleted,
    ConsolidationFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationEvent {
    pub kind: ConsolidationEventKind,
    pub consolidation_id: String,
    pub user_id: String,
    pub chain: Option<Chain>,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub timestamp: u64,
}

impl ConsolidationEvent {
    pub fn new(
        kind: ConsolidationEventKind,
        consolidation_id: impl Into<String>,
        user_id: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind,
            consolidation_id: consolidation_id.into(),
            user_id: user_id.into(),
            chain: None,
            tx_hash: None,
            error: None,
            timestamp,
        }
    }

    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
