use async_trait::async_trait;
use dustsweep_types::{Chain, ChainConsolidationPlan, TransactionRequest};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{ExecutorError, SwapExecutor, SwapReceipt, TransactionSubmitter};

/// Failure schedule for one chain
#[derive(Debug, Clone)]
enum Fault {
    /// Fail the next `remaining` calls, then succeed
    Fail { remaining: u32, reason: String },
    Hang,
    Panic,
}

#[derive(Default)]
struct MockState {
    faults: HashMap<Chain, Fault>,
    calls: Vec<(Chain, Option<String>)>,
}

/// Deterministic swap executor.
///
/// Succeeds with the plan's expected output unless a fault is scheduled for the chain.
#[derive(Default)]
pub struct MockSwapExecutor {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockSwapExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every swap on `chain` fails
    pub fn failing_on(self, chain: Chain, reason: &str) -> Self {
        self.failing_times(chain, u32::MAX, reason)
    }

    /// The next `times` swaps on `chain` fail
    pub fn failing_times(mut self, chain: Chain, times: u32, reason: &str) -> Self {
        self.state.get_mut().faults.insert(
            chain,
            Fault::Fail {
                remaining: times,
                reason: reason.to_string(),
            },
        );
        self
    }

    /// Swaps on `chain` never return
    pub fn hanging_on(mut self, chain: Chain) -> Self {
        self.state.get_mut().faults.insert(chain, Fault::Hang);
        self
    }

    /// Swaps on `chain` panic
    pub fn panicking_on(mut self, chain: Chain) -> Self {
        self.state.get_mut().faults.insert(chain, Fault::Panic);
        self
    }

    /// Chains swapped so far with the permit each call received
    pub async fn calls(&self) -> Vec<(Chain, Option<String>)> {
        self.state.lock().await.calls.clone()
    }

    pub async fn calls_for(&self, chain: Chain) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|(c, _)| *c == chain)
            .count()
    }
}

#[async_trait]
impl SwapExecutor for MockSwapExecutor {
    async fn execute_swap(
        &self,
        chain: Chain,
        plan: &ChainConsolidationPlan,
        _user_address: &str,
        permit_signature: Option<&str>,
    ) -> Result<SwapReceipt, ExecutorError> {
        let (call_index, fault) = {
            let mut state = self.state.lock().await;
            state
                .calls
                .push((chain, permit_signature.map(str::to_string)));
            let index = state.calls.len();
            let fault = match state.faults.get_mut(&chain) {
                Some(Fault::Fail { remaining, reason }) if *remaining > 0 => {
                    *remaining = remaining.saturating_sub(1);
                    Some(Fault::Fail {
                        remaining: *remaining,
                        reason: reason.clone(),
                    })
                }
                Some(Fault::Fail { .. }) | None => None,
                Some(other) => Some(other.clone()),
            };
            (index, fault)
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match fault {
            Some(Fault::Fail { reason, .. }) => Err(ExecutorError::Rejected { reason }),
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::Panic) => panic!("swap executor crashed on {chain}"),
            None => Ok(SwapReceipt {
                tx_hash: format!("0xswap-{chain}-{call_index}"),
                output_amount: Some(plan.swap_output_amount.clone()),
            }),
        }
    }
}

/// Deterministic transaction submitter
#[derive(Default)]
pub struct MockTransactionSubmitter {
    failing: HashMap<Chain, String>,
    submitted: Mutex<Vec<TransactionRequest>>,
}

impl MockTransactionSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, chain: Chain, reason: &str) -> Self {
        self.failing.insert(chain, reason.to_string());
        self
    }

    pub async fn submitted(&self) -> Vec<TransactionRequest> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl TransactionSubmitter for MockTransactionSubmitter {
    async fn submit(
        &self,
        request: &TransactionRequest,
        _user_address: &str,
    ) -> Result<String, ExecutorError> {
        if let Some(reason) = self.failing.get(&request.chain) {
            return Err(ExecutorError::Rejected {
                reason: reason.clone(),
            });
        }
        let mut submitted = self.submitted.lock().await;
        submitted.push(request.clone());
        Ok(format!("0xbridge-{}-{}", request.chain, submitted.len()))
    }
}
