use dustsweep_metrics::MetricsCollector;
use dustsweep_queue::{derive_job_id, JobHandle, JobOptions, JobPriority, JobQueue};
use dustsweep_status::{keys, Cache, CacheExt, StatusError, StatusTracker};
use dustsweep_types::{Chain, ChainOperationStatus, ConsolidationJobData, FailureStage};
use std::sync::Arc;
use tracing::{info, warn};

use crate::RetryError;

/// A re-enqueued single-chain job
#[derive(Debug, Clone, PartialEq)]
pub struct RetryTicket {
    pub consolidation_id: String,
    pub chain: Chain,
    pub retry_count: u32,
    pub job: JobHandle,
}

/// Re-runs one failed chain of a consolidation
pub struct RetryController {
    tracker: Arc<dyn StatusTracker>,
    cache: Arc<dyn Cache>,
    queue: Arc<dyn JobQueue<ConsolidationJobData>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RetryController {
    pub fn new(
        tracker: Arc<dyn StatusTracker>,
        cache: Arc<dyn Cache>,
        queue: Arc<dyn JobQueue<ConsolidationJobData>>,
    ) -> Self {
        Self {
            tracker,
            cache,
            queue,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reset a failed chain to pending and enqueue a job restricted to it.
    ///
    /// Precondition failures leave the status record untouched.
    pub async fn retry_failed_chain(
        &self,
        consolidation_id: &str,
        chain: Chain,
    ) -> Result<RetryTicket, RetryError> {
        let status = self
            .tracker
            .get_status(consolidation_id)
            .await?
            .ok_or_else(|| RetryError::ConsolidationNotFound(consolidation_id.to_string()))?;

        let op = status.chain(chain).ok_or_else(|| RetryError::ChainNotFound {
            id: consolidation_id.to_string(),
            chain,
        })?;
        if op.status != ChainOperationStatus::Failed {
            return Err(RetryError::NotFailed {
                chain,
                status: op.status,
            });
        }
        let failed_stage = if op.bridge_error.is_some() {
            FailureStage::Bridge
        } else {
            FailureStage::Swap
        };

        let job: ConsolidationJobData = self
            .cache
            .get(&keys::job(consolidation_id))
            .await?
            .ok_or_else(|| RetryError::JobDataMissing(consolidation_id.to_string()))?;

        let retry_job = job.restricted_to(chain);
        if retry_job.chain_plans.is_empty() {
            return Err(RetryError::ChainNotInPlan {
                id: consolidation_id.to_string(),
                chain,
            });
        }

        let detail = self
            .tracker
            .reset_chain_for_retry(consolidation_id, chain)
            .await
            .map_err(|e| match e {
                StatusError::InvalidTransition { from, .. } => {
                    RetryError::NotFailed { chain, status: from }
                }
                other => RetryError::Status(other),
            })?;
        let retry_count = detail.chain(chain).map(|op| op.retry_count).unwrap_or_default();

        let options = JobOptions::default()
            .with_priority(JobPriority::High)
            .with_job_id(derive_job_id(
                "retry",
                &[consolidation_id, chain.as_str(), &retry_count.to_string()],
            ));

        let handle = match self.queue.enqueue("retry-chain", retry_job, options).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    consolidation_id = %consolidation_id,
                    chain = %chain,
                    error = %e,
                    "Failed to enqueue retry, restoring failed state"
                );
                self.tracker
                    .mark_chain_failed(
                        consolidation_id,
                        chain,
                        failed_stage,
                        &format!("retry could not be scheduled: {e}"),
                    )
                    .await?;
                return Err(e.into());
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_chain_retry(chain);
        }

        info!(
            consolidation_id = %consolidation_id,
            chain = %chain,
            retry_count,
            job_id = %handle.id,
            "Chain retry enqueued"
        );

        Ok(RetryTicket {
            consolidation_id: consolidation_id.to_string(),
            chain,
            retry_count,
            job: handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chain_plan, job};
    use dustsweep_queue::InMemoryJobQueue;
    use dustsweep_status::{InMemoryCache, InMemoryStatusTracker};
    use dustsweep_types::ExecutionPriority;
    use std::time::Duration;

    struct Harness {
        retry: RetryController,
        tracker: Arc<InMemoryStatusTracker>,
        cache: Arc<InMemoryCache>,
        queue: Arc<InMemoryJobQueue<ConsolidationJobData>>,
    }

    async fn harness(id: &str) -> Harness {
        let tracker = Arc::new(InMemoryStatusTracker::new());
        let cache = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InMemoryJobQueue::new("consolidations"));

        let data = job(
            id,
            Chain::Base,
            vec![
                chain_plan(Chain::Arbitrum, Chain::Base, 30, ExecutionPriority::Scored(2.0)),
                chain_plan(Chain::Optimism, Chain::Base, 25, ExecutionPriority::Scored(1.0)),
            ],
        );
        tracker.initialize_status(&data).await.unwrap();
        cache
            .set(&keys::job(id), &data, Duration::from_secs(3600))
            .await
            .unwrap();

        Harness {
            retry: RetryController::new(tracker.clone(), cache.clone(), queue.clone()),
            tracker,
            cache,
            queue,
        }
    }

    async fn fail(h: &Harness, id: &str, chain: Chain) {
        h.tracker.mark_swap_started(id, chain).await.unwrap();
        h.tracker
            .mark_chain_failed(id, chain, FailureStage::Swap, "slippage exceeded")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retry_resets_only_target_chain() {
        let h = harness("cons-retry").await;
        fail(&h, "cons-retry", Chain::Arbitrum).await;
        fail(&h, "cons-retry", Chain::Optimism).await;

        let ticket = h
            .retry
            .retry_failed_chain("cons-retry", Chain::Arbitrum)
            .await
            .unwrap();
        assert_eq!(ticket.retry_count, 1);
        assert_eq!(ticket.job.priority, JobPriority::High);

        let status = h.tracker.get_status("cons-retry").await.unwrap().unwrap();
        let arbitrum = status.chain(Chain::Arbitrum).unwrap();
        assert_eq!(arbitrum.status, ChainOperationStatus::Pending);
        assert_eq!(arbitrum.retry_count, 1);
        assert!(arbitrum.error.is_none());
        assert!(arbitrum.swap_error.is_none());
        assert_eq!(
            status.chain(Chain::Optimism).unwrap().status,
            ChainOperationStatus::Failed
        );

        let queued = h.queue.dequeue().await.unwrap();
        assert_eq!(queued.payload.chains(), vec![Chain::Arbitrum]);
        assert_eq!(queued.priority, JobPriority::High);
        assert_eq!(queued.payload.permit_signatures.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_rejects_non_failed_chain_without_side_effects() {
        let h = harness("cons-pending").await;
        let before = h.tracker.get_status("cons-pending").await.unwrap().unwrap();

        let err = h
            .retry
            .retry_failed_chain("cons-pending", Chain::Arbitrum)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetryError::NotFailed {
                status: ChainOperationStatus::Pending,
                ..
            }
        ));

        let after = h.tracker.get_status("cons-pending").await.unwrap().unwrap();
        assert_eq!(before.chain_operations, after.chain_operations);
        assert_eq!(h.queue.waiting().await, 0);
    }

    #[tokio::test]
    async fn test_retry_unknown_consolidation() {
        let h = harness("cons-known").await;
        let err = h
            .retry
            .retry_failed_chain("cons-unknown", Chain::Arbitrum)
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::ConsolidationNotFound(_)));
    }

    #[tokio::test]
    async fn test_retry_chain_outside_consolidation() {
        let h = harness("cons-chain").await;
        let err = h
            .retry
            .retry_failed_chain("cons-chain", Chain::Polygon)
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::ChainNotFound { .. }));
    }

    #[tokio::test]
    async fn test_retry_requires_cached_job_data() {
        let h = harness("cons-expired").await;
        fail(&h, "cons-expired", Chain::Optimism).await;
        h.cache.delete(&keys::job("cons-expired")).await.unwrap();

        let err = h
            .retry
            .retry_failed_chain("cons-expired", Chain::Optimism)
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::JobDataMissing(_)));

        let status = h.tracker.get_status("cons-expired").await.unwrap().unwrap();
        assert_eq!(
            status.chain(Chain::Optimism).unwrap().status,
            ChainOperationStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_closed_queue_restores_failed_state() {
        let h = harness("cons-closed").await;
        fail(&h, "cons-closed", Chain::Optimism).await;
        h.queue.close().await;

        let err = h
            .retry
            .retry_failed_chain("cons-closed", Chain::Optimism)
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Queue(_)));

        let status = h.tracker.get_status("cons-closed").await.unwrap().unwrap();
        let op = status.chain(Chain::Optimism).unwrap();
        assert_eq!(op.status, ChainOperationStatus::Failed);
        assert_eq!(op.retry_count, 1);
    }

    #[tokio::test]
    async fn test_closed_queue_keeps_bridge_stage() {
        let h = harness("cons-bridge-closed").await;
        let id = "cons-bridge-closed";
        h.tracker.mark_swap_started(id, Chain::Arbitrum).await.unwrap();
        h.tracker
            .mark_swap_completed(id, Chain::Arbitrum, "0xswap", None)
            .await
            .unwrap();
        h.tracker
            .mark_chain_failed(id, Chain::Arbitrum, FailureStage::Bridge, "route expired")
            .await
            .unwrap();
        h.queue.close().await;

        let err = h
            .retry
            .retry_failed_chain(id, Chain::Arbitrum)
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Queue(_)));

        let status = h.tracker.get_status(id).await.unwrap().unwrap();
        let op = status.chain(Chain::Arbitrum).unwrap();
        assert_eq!(op.status, ChainOperationStatus::Failed);
        assert!(op.swap_error.is_none());
        assert!(op
            .bridge_error
            .as_deref()
            .unwrap()
            .contains("retry could not be scheduled"));
        let recorded: Vec<_> = status
            .errors
            .iter()
            .filter(|f| f.chain == Chain::Arbitrum)
            .map(|f| f.stage)
            .collect();
        assert_eq!(recorded, vec![FailureStage::Bridge]);
    }

    #[tokio::test]
    async fn test_second_retry_gets_new_job() {
        let h = harness("cons-twice").await;
        fail(&h, "cons-twice", Chain::Optimism).await;
        let first = h
            .retry
            .retry_failed_chain("cons-twice", Chain::Optimism)
            .await
            .unwrap();

        fail(&h, "cons-twice", Chain::Optimism).await;
        let second = h
            .retry
            .retry_failed_chain("cons-twice", Chain::Optimism)
            .await
            .unwrap();

        assert_eq!(second.retry_count, 2);
        assert_ne!(first.job.id, second.job.id);
        assert_eq!(h.queue.waiting().await, 2);
    }
}
