use async_trait::async_trait;
use dustsweep_metrics::MetricsCollector;
use dustsweep_optimizer::BridgeQuoteSource;
use dustsweep_queue::{
    derive_job_id, JobFailure, JobOptions, JobProcessor, JobQueue, ProgressReporter, QueuedJob,
};
use dustsweep_ratelimit::PollBackoff;
use dustsweep_status::{StatusError, StatusTracker};
use dustsweep_types::{BridgeStatus, BridgeTrackJob, FailureStage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Job id of one settlement check
pub fn tracking_job_id(job: &BridgeTrackJob) -> String {
    derive_job_id(
        "track",
        &[
            &job.consolidation_id,
            job.chain.as_str(),
            &job.source_tx_hash,
            &job.attempt.to_string(),
        ],
    )
}

/// Result of one settlement check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrackOutcome {
    /// Funds arrived on the destination chain
    Settled,
    /// Bridge failed or refunded
    Failed,
    /// Still pending; checked again after `delay_ms`
    Rescheduled { attempt: u32, delay_ms: u64 },
    /// Gave up after the configured number of checks
    TimedOut,
    /// The chain left the bridging state before this check ran
    Stale,
}

/// Polls bridge settlement and finishes the chain's status record
pub struct BridgeTracker {
    tracker: Arc<dyn StatusTracker>,
    quote_source: Arc<dyn BridgeQuoteSource>,
    queue: Arc<dyn JobQueue<BridgeTrackJob>>,
    backoff: PollBackoff,
    metrics: Option<Arc<MetricsCollector>>,
}

impl BridgeTracker {
    pub fn new(
        tracker: Arc<dyn StatusTracker>,
        quote_source: Arc<dyn BridgeQuoteSource>,
        queue: Arc<dyn JobQueue<BridgeTrackJob>>,
        backoff: PollBackoff,
    ) -> Self {
        Self {
            tracker,
            quote_source,
            queue,
            backoff,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn check(&self, job: &BridgeTrackJob) -> Result<TrackOutcome, JobFailure> {
        let id = job.consolidation_id.as_str();
        let status = match self
            .quote_source
            .bridge_status(&job.source_tx_hash, job.chain, job.provider)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    consolidation_id = %id,
                    chain = %job.chain,
                    provider = %job.provider,
                    attempt = job.attempt,
                    error = %e,
                    "Bridge status query failed"
                );
                return self.reschedule(job, true).await;
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_bridge_status(job.provider, &status);
        }

        let updated = match status {
            BridgeStatus::Pending => return self.reschedule(job, false).await,
            BridgeStatus::Completed {
                destination_tx_hash,
                output_amount,
            } => {
                info!(
                    consolidation_id = %id,
                    chain = %job.chain,
                    destination_tx_hash = %destination_tx_hash,
                    "Bridge settled"
                );
                self.tracker
                    .mark_bridge_completed(
                        id,
                        job.chain,
                        &destination_tx_hash,
                        output_amount,
                        job.expected_output_usd,
                    )
                    .await
                    .map(|_| TrackOutcome::Settled)
            }
            BridgeStatus::Failed { reason } => self.fail(job, &reason).await,
            BridgeStatus::Refunded { reason } => {
                self.fail(job, &format!("bridge refunded: {reason}")).await
            }
        };

        resolve(job, updated)
    }

    async fn fail(&self, job: &BridgeTrackJob, reason: &str) -> Result<TrackOutcome, StatusError> {
        warn!(
            consolidation_id = %job.consolidation_id,
            chain = %job.chain,
            reason = %reason,
            "Bridge failed"
        );
        self.tracker
            .mark_chain_failed(&job.consolidation_id, job.chain, FailureStage::Bridge, reason)
            .await
            .map(|_| TrackOutcome::Failed)
    }

    /// Schedule the next check, doubling the delay after a query error
    async fn reschedule(
        &self,
        job: &BridgeTrackJob,
        after_error: bool,
    ) -> Result<TrackOutcome, JobFailure> {
        let next = job.next_attempt();
        let Some(delay) = self.backoff.delay_for(next.attempt) else {
            let updated = self.fail(job, "bridge tracking timed out").await;
            return resolve(job, updated.map(|_| TrackOutcome::TimedOut));
        };
        let delay = if after_error {
            delay.saturating_mul(2)
        } else {
            delay
        };

        let options = JobOptions::default()
            .with_delay(delay)
            .with_job_id(tracking_job_id(&next));
        self.queue
            .enqueue("track-bridge", next.clone(), options)
            .await
            .map_err(|e| JobFailure::new(format!("failed to reschedule bridge tracking: {e}")))?;

        debug!(
            consolidation_id = %job.consolidation_id,
            chain = %job.chain,
            attempt = next.attempt,
            delay_ms = delay.as_millis() as u64,
            "Bridge still pending"
        );

        Ok(TrackOutcome::Rescheduled {
            attempt: next.attempt,
            delay_ms: duration_ms(delay),
        })
    }
}

fn duration_ms(delay: Duration) -> u64 {
    delay.as_millis().min(u64::MAX as u128) as u64
}

/// A chain that already left `bridging` makes the check stale, not failed
fn resolve(
    job: &BridgeTrackJob,
    updated: Result<TrackOutcome, StatusError>,
) -> Result<TrackOutcome, JobFailure> {
    match updated {
        Ok(outcome) => Ok(outcome),
        Err(StatusError::InvalidTransition { from, .. }) => {
            debug!(
                consolidation_id = %job.consolidation_id,
                chain = %job.chain,
                status = %from,
                "Dropping stale bridge check"
            );
            Ok(TrackOutcome::Stale)
        }
        Err(StatusError::NotFound(_)) => Ok(TrackOutcome::Stale),
        Err(e) => Err(JobFailure::new(e.to_string())),
    }
}

#[async_trait]
impl JobProcessor<BridgeTrackJob> for BridgeTracker {
    type Output = TrackOutcome;

    async fn process(
        &self,
        job: &QueuedJob<BridgeTrackJob>,
        _progress: &dyn ProgressReporter,
    ) -> Result<Self::Output, JobFailure> {
        self.check(&job.payload).await
    }
}
