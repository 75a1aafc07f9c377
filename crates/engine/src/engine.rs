use async_trait::async_trait;
use dustsweep_metrics::{ConsolidationSpan, MetricsCollector};
use dustsweep_optimizer::BridgeQuoteSource;
use dustsweep_queue::{JobFailure, JobOptions, JobProcessor, JobQueue, ProgressReporter, QueuedJob};
use dustsweep_status::{keys, Cache, CacheExt, StatusError, StatusTracker};
use dustsweep_types::{
    BridgeTrackJob, Chain, ChainConsolidationPlan, ChainFailure, ChainOperationDetail,
    ChainOperationStatus, ConsolidationExecuteResult, ConsolidationJobData, ConsolidationState,
    ExecutedChain, FailureStage,
};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Instrument};

use crate::{tracking_job_id, BridgeExecutor, ExecutorError, SwapExecutor};

/// Progress reported once the consolidation is marked executing
const PROGRESS_STARTED: u8 = 5;

/// Progress span shared out across the chains
const PROGRESS_CHAINS: usize = 90;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on a single swap or bridge submission
    pub step_timeout: Duration,

    /// How long execution results stay readable
    pub result_ttl: Duration,

    /// Delay before the first settlement check of a submitted bridge
    pub tracking_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(120),
            result_ttl: Duration::from_secs(24 * 60 * 60),
            tracking_delay: Duration::from_secs(15),
        }
    }
}

impl EngineConfig {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_tracking_delay(mut self, delay: Duration) -> Self {
        self.tracking_delay = delay;
        self
    }
}

/// Per-chain outcomes gathered while a job runs
#[derive(Default)]
struct ChainOutcomes {
    executed: Vec<ExecutedChain>,
    failed: Vec<ChainFailure>,
}

/// Runs consolidation jobs chain by chain.
///
/// Chain failures are recorded and skipped over; only status store failures
/// and executor panics abort a job.
pub struct ConsolidationExecutionEngine {
    tracker: Arc<dyn StatusTracker>,
    cache: Arc<dyn Cache>,
    swaps: Arc<dyn SwapExecutor>,
    bridges: Arc<dyn BridgeExecutor>,
    quote_source: Arc<dyn BridgeQuoteSource>,
    tracking_queue: Arc<dyn JobQueue<BridgeTrackJob>>,
    metrics: Option<Arc<MetricsCollector>>,
    config: EngineConfig,
}

impl ConsolidationExecutionEngine {
    pub fn new(
        tracker: Arc<dyn StatusTracker>,
        cache: Arc<dyn Cache>,
        swaps: Arc<dyn SwapExecutor>,
        bridges: Arc<dyn BridgeExecutor>,
        quote_source: Arc<dyn BridgeQuoteSource>,
        tracking_queue: Arc<dyn JobQueue<BridgeTrackJob>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            tracker,
            cache,
            swaps,
            bridges,
            quote_source,
            tracking_queue,
            metrics: None,
            config,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute every chain plan of a job and cache the outcome
    pub async fn process_job(
        &self,
        job: &ConsolidationJobData,
        progress: &dyn ProgressReporter,
    ) -> ConsolidationExecuteResult {
        let started = Instant::now();
        let span = ConsolidationSpan::new(&job.consolidation_id, &job.user_id);
        if let Some(metrics) = &self.metrics {
            metrics.record_consolidation_started();
        }

        let mut outcomes = ChainOutcomes::default();
        let run = AssertUnwindSafe(self.run_chains(job, progress, &mut outcomes))
            .catch_unwind()
            .instrument(span.span())
            .await;

        let fault = match run {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("executor panicked: {}", panic_message(&*panic))),
        };

        if let Some(message) = &fault {
            error!(
                consolidation_id = %job.consolidation_id,
                correlation_id = %span.correlation_id,
                error = %message,
                executed = outcomes.executed.len(),
                "Consolidation aborted"
            );
            self.fail_unfinished_chains(job, message, &mut outcomes).await;
            if let Err(e) = self
                .tracker
                .mark_consolidation_failed(&job.consolidation_id, message)
                .await
            {
                error!(
                    consolidation_id = %job.consolidation_id,
                    error = %e,
                    "Failed to record consolidation fault"
                );
            }
        }

        let result = ConsolidationExecuteResult::new(
            &job.consolidation_id,
            outcomes.executed,
            outcomes.failed,
            fault,
        );

        if let Err(e) = self
            .cache
            .set(
                &keys::result(&job.consolidation_id),
                &result,
                self.config.result_ttl,
            )
            .await
        {
            warn!(
                consolidation_id = %job.consolidation_id,
                error = %e,
                "Failed to cache execution result"
            );
        }

        progress.update_progress(100);

        if let Some(metrics) = &self.metrics {
            metrics.record_consolidation_finished(outcome_state(&result), started.elapsed());
        }

        info!(
            consolidation_id = %job.consolidation_id,
            success = result.success,
            partial_success = result.partial_success,
            executed = result.executed_chains.len(),
            failed = result.failed_chains.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "{}",
            result.summary()
        );

        result
    }

    async fn run_chains(
        &self,
        job: &ConsolidationJobData,
        progress: &dyn ProgressReporter,
        outcomes: &mut ChainOutcomes,
    ) -> Result<(), StatusError> {
        let id = job.consolidation_id.as_str();
        let status = self.tracker.mark_executing(id).await?;
        progress.update_progress(PROGRESS_STARTED);

        let mut plans: Vec<&ChainConsolidationPlan> = job.chain_plans.iter().collect();
        plans.sort_by(|a, b| a.priority.cmp(&b.priority));

        info!(
            consolidation_id = %id,
            chains = plans.len(),
            order = ?plans.iter().map(|p| p.chain).collect::<Vec<_>>(),
            "Executing consolidation"
        );

        let total = plans.len();
        for (index, plan) in plans.into_iter().enumerate() {
            let op = status.chain(plan.chain).ok_or(StatusError::ChainNotFound {
                id: id.to_string(),
                chain: plan.chain,
            })?;

            match op.status {
                ChainOperationStatus::Pending => self.execute_chain(job, plan, outcomes).await?,
                ChainOperationStatus::Completed | ChainOperationStatus::Bridging => {
                    debug!(consolidation_id = %id, chain = %plan.chain, "Chain already executed");
                    outcomes.executed.push(executed_from_status(op));
                }
                ChainOperationStatus::SwapStarted | ChainOperationStatus::SwapCompleted => {
                    let stage = interrupted_stage(op.status, plan);
                    let message = "execution interrupted before the chain finished";
                    warn!(consolidation_id = %id, chain = %plan.chain, stage = ?stage, "Chain was interrupted");
                    self.tracker
                        .mark_chain_failed(id, plan.chain, stage, message)
                        .await?;
                    outcomes
                        .failed
                        .push(ChainFailure::new(plan.chain, stage, message));
                }
                ChainOperationStatus::Failed => {
                    let stage = if op.bridge_error.is_some() {
                        FailureStage::Bridge
                    } else {
                        FailureStage::Swap
                    };
                    let message = op.error.clone().unwrap_or_else(|| "chain failed".to_string());
                    outcomes
                        .failed
                        .push(ChainFailure::new(plan.chain, stage, message));
                }
            }

            let percent = PROGRESS_STARTED as usize + (index + 1) * PROGRESS_CHAINS / total;
            progress.update_progress(percent.min(100) as u8);
        }

        Ok(())
    }

    /// Swap then bridge one chain; step failures are recorded, not returned
    async fn execute_chain(
        &self,
        job: &ConsolidationJobData,
        plan: &ChainConsolidationPlan,
        outcomes: &mut ChainOutcomes,
    ) -> Result<(), StatusError> {
        let id = job.consolidation_id.as_str();
        let chain = plan.chain;

        // ═══════════════════════════════════════════════════════════════════════
        // SWAP
        // ═══════════════════════════════════════════════════════════════════════

        self.tracker.mark_swap_started(id, chain).await?;
        let permit = job.permit_signatures.get(&chain).map(String::as_str);

        let started = Instant::now();
        let swap = self
            .bounded(
                self.swaps
                    .execute_swap(chain, plan, &job.user_address, permit),
            )
            .await;
        self.record_step(chain, FailureStage::Swap, swap.is_ok(), started.elapsed());

        let swap = match swap {
            Ok(receipt) => receipt,
            Err(e) => return self.fail_chain(id, chain, FailureStage::Swap, e, outcomes).await,
        };

        info!(consolidation_id = %id, chain = %chain, tx_hash = %swap.tx_hash, "Swap completed");
        self.tracker
            .mark_swap_completed(id, chain, &swap.tx_hash, swap.output_amount.clone())
            .await?;

        let mut executed = ExecutedChain {
            chain,
            swap_tx_hash: Some(swap.tx_hash),
            swap_output_amount: swap.output_amount,
            bridge_provider: None,
            bridge_tx_hash: None,
        };

        let bridge = match &plan.bridge {
            Some(bridge) if chain != job.destination_chain => bridge,
            _ => {
                self.tracker
                    .mark_same_chain_completed(id, chain, plan.expected_output_usd)
                    .await?;
                outcomes.executed.push(executed);
                return Ok(());
            }
        };

        // ═══════════════════════════════════════════════════════════════════════
        // BRIDGE
        // ═══════════════════════════════════════════════════════════════════════

        let started = Instant::now();
        let receipt = self
            .bounded(self.bridges.execute_bridge(
                chain,
                plan,
                &job.user_address,
                self.quote_source.as_ref(),
            ))
            .await;
        self.record_step(chain, FailureStage::Bridge, receipt.is_ok(), started.elapsed());

        let receipt = match receipt {
            Ok(receipt) => receipt,
            Err(e) => return self.fail_chain(id, chain, FailureStage::Bridge, e, outcomes).await,
        };

        info!(
            consolidation_id = %id,
            chain = %chain,
            provider = %receipt.provider,
            tx_hash = %receipt.tx_hash,
            "Bridge submitted"
        );
        self.tracker
            .mark_bridge_started(id, chain, receipt.provider, &receipt.tx_hash)
            .await?;

        let track = BridgeTrackJob {
            consolidation_id: id.to_string(),
            chain,
            provider: receipt.provider,
            source_tx_hash: receipt.tx_hash.clone(),
            destination_chain: bridge.quote.destination_chain,
            expected_output_usd: Some(plan.expected_output_usd),
            attempt: 0,
        };
        let options = JobOptions::default()
            .with_delay(self.config.tracking_delay)
            .with_job_id(tracking_job_id(&track));
        if let Err(e) = self
            .tracking_queue
            .enqueue("track-bridge", track, options)
            .await
        {
            let message = format!("bridge tracking could not be scheduled: {e}");
            warn!(consolidation_id = %id, chain = %chain, error = %message, "Chain step failed");
            self.tracker
                .mark_chain_failed(id, chain, FailureStage::Bridge, &message)
                .await?;
            outcomes
                .failed
                .push(ChainFailure::new(chain, FailureStage::Bridge, message));
            return Ok(());
        }

        executed.bridge_provider = Some(receipt.provider);
        executed.bridge_tx_hash = Some(receipt.tx_hash);
        outcomes.executed.push(executed);
        Ok(())
    }

    /// Move every chain the aborted job left unfinished to `failed`.
    ///
    /// In-flight chains fail at the stage they reached; chains never started
    /// fail at the swap stage. Both become eligible for a single-chain retry.
    async fn fail_unfinished_chains(
        &self,
        job: &ConsolidationJobData,
        fault: &str,
        outcomes: &mut ChainOutcomes,
    ) {
        let id = job.consolidation_id.as_str();
        let status = match self.tracker.get_status(id).await {
            Ok(Some(status)) => status,
            Ok(None) => return,
            Err(e) => {
                error!(consolidation_id = %id, error = %e, "Failed to load status after fault");
                return;
            }
        };

        let mut plans: Vec<&ChainConsolidationPlan> = job.chain_plans.iter().collect();
        plans.sort_by(|a, b| a.priority.cmp(&b.priority));

        for plan in plans {
            let Some(op) = status.chain(plan.chain) else {
                continue;
            };
            let (stage, message) = match op.status {
                ChainOperationStatus::Pending => (
                    FailureStage::Swap,
                    format!("not attempted: consolidation aborted ({fault})"),
                ),
                ChainOperationStatus::SwapStarted | ChainOperationStatus::SwapCompleted => {
                    (interrupted_stage(op.status, plan), fault.to_string())
                }
                _ => continue,
            };

            match self
                .tracker
                .mark_chain_failed(id, plan.chain, stage, &message)
                .await
            {
                Ok(_) => outcomes
                    .failed
                    .push(ChainFailure::new(plan.chain, stage, message)),
                Err(e) => error!(
                    consolidation_id = %id,
                    chain = %plan.chain,
                    error = %e,
                    "Failed to mark unfinished chain failed"
                ),
            }
        }
    }

    async fn fail_chain(
        &self,
        id: &str,
        chain: Chain,
        stage: FailureStage,
        error: ExecutorError,
        outcomes: &mut ChainOutcomes,
    ) -> Result<(), StatusError> {
        let message = error.to_string();
        warn!(consolidation_id = %id, chain = %chain, stage = ?stage, error = %message, "Chain step failed");
        self.tracker
            .mark_chain_failed(id, chain, stage, &message)
            .await?;
        outcomes.failed.push(ChainFailure::new(chain, stage, message));
        Ok(())
    }

    async fn bounded<T>(
        &self,
        step: impl Future<Output = Result<T, ExecutorError>>,
    ) -> Result<T, ExecutorError> {
        let timeout = self.config.step_timeout;
        tokio::time::timeout(timeout, step)
            .await
            .unwrap_or_else(|_| {
                Err(ExecutorError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            })
    }

    fn record_step(&self, chain: Chain, stage: FailureStage, success: bool, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_chain_step(chain, stage, success, duration);
        }
    }
}

#[async_trait]
impl JobProcessor<ConsolidationJobData> for ConsolidationExecutionEngine {
    type Output = ConsolidationExecuteResult;

    async fn process(
        &self,
        job: &QueuedJob<ConsolidationJobData>,
        progress: &dyn ProgressReporter,
    ) -> Result<Self::Output, JobFailure> {
        let result = self.process_job(&job.payload, progress).await;
        match &result.error {
            Some(error) => Err(JobFailure::new(error.clone())),
            None => Ok(result),
        }
    }
}

fn executed_from_status(op: &ChainOperationDetail) -> ExecutedChain {
    ExecutedChain {
        chain: op.chain,
        swap_tx_hash: op.swap_tx_hash.clone(),
        swap_output_amount: op.swap_output_amount.clone(),
        bridge_provider: op.bridge_tx_hash.as_ref().and(op.bridge_provider),
        bridge_tx_hash: op.bridge_tx_hash.clone(),
    }
}

fn interrupted_stage(status: ChainOperationStatus, plan: &ChainConsolidationPlan) -> FailureStage {
    match status {
        ChainOperationStatus::SwapCompleted if plan.bridge.is_some() => FailureStage::Bridge,
        _ => FailureStage::Swap,
    }
}

fn outcome_state(result: &ConsolidationExecuteResult) -> ConsolidationState {
    if result.success {
        ConsolidationState::Completed
    } else if result.partial_success && result.error.is_none() {
        ConsolidationState::PartialSuccess
    } else {
        ConsolidationState::Failed
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
