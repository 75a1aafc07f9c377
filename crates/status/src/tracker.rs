use async_trait::async_trait;
use dustsweep_types::{
    now_millis, BridgeProvider, Chain, ChainFailure, ChainOperationDetail, ChainOperationStatus,
    ConsolidationEvent, ConsolidationEventKind, ConsolidationJobData, ConsolidationStatusDetail,
    FailureStage,
};
use num_bigint::BigUint;
use rust_decimal::Decimal;

use crate::StatusError;

/// Mutation applied to a whole status record under the store's write lock
pub type StatusUpdate =
    Box<dyn FnOnce(&mut ConsolidationStatusDetail) -> Result<(), StatusError> + Send>;

/// Mutation applied to one chain's record under the store's write lock
pub type ChainUpdate = Box<dyn FnOnce(&mut ChainOperationDetail) -> Result<(), StatusError> + Send>;

/// Move a chain to `next`, rejecting regressions
pub fn transition(
    op: &mut ChainOperationDetail,
    next: ChainOperationStatus,
) -> Result<(), StatusError> {
    if !op.status.can_transition_to(next) {
        return Err(StatusError::InvalidTransition {
            chain: op.chain,
            from: op.status,
            to: next,
        });
    }
    op.status = next;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// TRACKER TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Durable per-consolidation status store.
///
/// Implementations must apply each update atomically per consolidation id and
/// refresh the derived fields of the record afterwards.
#[async_trait]
pub trait StatusTracker: Send + Sync {
    /// Create the status record for a freshly enqueued job
    async fn initialize_status(
        &self,
        job: &ConsolidationJobData,
    ) -> Result<ConsolidationStatusDetail, StatusError>;

    async fn get_status(&self, id: &str) -> Result<Option<ConsolidationStatusDetail>, StatusError>;

    /// Apply `update` atomically and return the refreshed record
    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<ConsolidationStatusDetail, StatusError>;

    async fn record_event(&self, event: ConsolidationEvent) -> Result<(), StatusError>;

    /// Most recent events, newest last
    async fn events(&self, id: &str, limit: usize) -> Result<Vec<ConsolidationEvent>, StatusError>;

    /// A user's consolidations, newest first
    async fn user_history(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConsolidationStatusDetail>, StatusError>;

    async fn update_chain_status(
        &self,
        id: &str,
        chain: Chain,
        update: ChainUpdate,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        self.update_status(
            id,
            Box::new(move |detail| {
                let id = detail.id.clone();
                let op = detail
                    .chain_mut(chain)
                    .ok_or(StatusError::ChainNotFound { id, chain })?;
                update(op)
            }),
        )
        .await
    }

    /// Record the start of an execution attempt
    async fn mark_executing(&self, id: &str) -> Result<ConsolidationStatusDetail, StatusError> {
        let detail = self
            .update_status(
                id,
                Box::new(|detail| {
                    detail.started_at.get_or_insert(now_millis());
                    detail.fault = None;
                    Ok(())
                }),
            )
            .await?;
        self.emit(&detail, ConsolidationEventKind::ConsolidationStarted, None)
            .await?;
        Ok(detail)
    }

    async fn mark_swap_started(
        &self,
        id: &str,
        chain: Chain,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let detail = self
            .update_chain_status(
                id,
                chain,
                Box::new(|op| {
                    transition(op, ChainOperationStatus::SwapStarted)?;
                    op.started_at = Some(now_millis());
                    Ok(())
                }),
            )
            .await?;
        self.emit(&detail, ConsolidationEventKind::ChainSwapStarted, Some(chain))
            .await?;
        Ok(detail)
    }

    async fn mark_swap_completed(
        &self,
        id: &str,
        chain: Chain,
        tx_hash: &str,
        output_amount: Option<BigUint>,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let hash = tx_hash.to_string();
        let detail = self
            .update_chain_status(
                id,
                chain,
                Box::new(move |op| {
                    transition(op, ChainOperationStatus::SwapCompleted)?;
                    op.swap_tx_hash = Some(hash);
                    op.swap_output_amount = output_amount;
                    Ok(())
                }),
            )
            .await?;
        self.record_event(
            ConsolidationEvent::new(
                ConsolidationEventKind::ChainSwapCompleted,
                &detail.id,
                &detail.user_id,
                now_millis(),
            )
            .with_chain(chain)
            .with_tx_hash(tx_hash),
        )
        .await?;
        Ok(detail)
    }

    /// Bridge transaction submitted; settlement is tracked out of band
    async fn mark_bridge_started(
        &self,
        id: &str,
        chain: Chain,
        provider: BridgeProvider,
        tx_hash: &str,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let hash = tx_hash.to_string();
        let detail = self
            .update_chain_status(
                id,
                chain,
                Box::new(move |op| {
                    transition(op, ChainOperationStatus::Bridging)?;
                    op.bridge_provider = Some(provider);
                    op.bridge_tx_hash = Some(hash);
                    Ok(())
                }),
            )
            .await?;
        self.record_event(
            ConsolidationEvent::new(
                ConsolidationEventKind::ChainBridgeStarted,
                &detail.id,
                &detail.user_id,
                now_millis(),
            )
            .with_chain(chain)
            .with_tx_hash(tx_hash),
        )
        .await?;
        Ok(detail)
    }

    async fn mark_bridge_completed(
        &self,
        id: &str,
        chain: Chain,
        destination_tx_hash: &str,
        output_amount: Option<BigUint>,
        output_value_usd: Option<Decimal>,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let hash = destination_tx_hash.to_string();
        let detail = self
            .update_status(
                id,
                Box::new(move |detail| {
                    let id = detail.id.clone();
                    let op = detail
                        .chain_mut(chain)
                        .ok_or(StatusError::ChainNotFound { id, chain })?;
                    transition(op, ChainOperationStatus::Completed)?;
                    op.destination_tx_hash = Some(hash);
                    op.output_amount = output_amount;
                    op.output_value_usd = output_value_usd;
                    op.completed_at = Some(now_millis());
                    let fees = (op.input_value_usd - output_value_usd.unwrap_or_default())
                        .max(Decimal::ZERO);
                    if let Some(value) = output_value_usd {
                        detail.total_output_value_usd += value;
                        detail.total_fees_usd += fees;
                    }
                    Ok(())
                }),
            )
            .await?;
        self.record_event(
            ConsolidationEvent::new(
                ConsolidationEventKind::ChainBridgeCompleted,
                &detail.id,
                &detail.user_id,
                now_millis(),
            )
            .with_chain(chain)
            .with_tx_hash(destination_tx_hash),
        )
        .await?;
        Ok(detail)
    }

    /// Destination-chain plan finished after its swap
    async fn mark_same_chain_completed(
        &self,
        id: &str,
        chain: Chain,
        output_value_usd: Decimal,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let detail = self
            .update_status(
                id,
                Box::new(move |detail| {
                    let id = detail.id.clone();
                    let op = detail
                        .chain_mut(chain)
                        .ok_or(StatusError::ChainNotFound { id, chain })?;
                    transition(op, ChainOperationStatus::Completed)?;
                    op.output_value_usd = Some(output_value_usd);
                    op.completed_at = Some(now_millis());
                    let fees = (op.input_value_usd - output_value_usd).max(Decimal::ZERO);
                    detail.total_output_value_usd += output_value_usd;
                    detail.total_fees_usd += fees;
                    Ok(())
                }),
            )
            .await?;
        self.emit(&detail, ConsolidationEventKind::ChainCompleted, Some(chain))
            .await?;
        Ok(detail)
    }

    async fn mark_chain_failed(
        &self,
        id: &str,
        chain: Chain,
        stage: FailureStage,
        error: &str,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let message = error.to_string();
        let detail = self
            .update_status(
                id,
                Box::new(move |detail| {
                    let id = detail.id.clone();
                    let op = detail
                        .chain_mut(chain)
                        .ok_or(StatusError::ChainNotFound { id, chain })?;
                    transition(op, ChainOperationStatus::Failed)?;
                    match stage {
                        FailureStage::Swap => op.swap_error = Some(message.clone()),
                        FailureStage::Bridge => op.bridge_error = Some(message.clone()),
                    }
                    op.error = Some(message.clone());
                    op.completed_at = Some(now_millis());
                    detail.errors.push(ChainFailure::new(chain, stage, message));
                    Ok(())
                }),
            )
            .await?;
        self.record_event(
            ConsolidationEvent::new(
                ConsolidationEventKind::ChainFailed,
                &detail.id,
                &detail.user_id,
                now_millis(),
            )
            .with_chain(chain)
            .with_error(error),
        )
        .await?;
        Ok(detail)
    }

    /// Record a job-level fault; the consolidation reads as failed until re-executed
    async fn mark_consolidation_failed(
        &self,
        id: &str,
        error: &str,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let message = error.to_string();
        self.update_status(
            id,
            Box::new(move |detail| {
                detail.fault = Some(message);
                Ok(())
            }),
        )
        .await
    }

    /// Reset a failed chain to pending for another attempt.
    ///
    /// Fails without side effects unless the chain is currently `failed`.
    async fn reset_chain_for_retry(
        &self,
        id: &str,
        chain: Chain,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let detail = self
            .update_status(
                id,
                Box::new(move |detail| {
                    let id = detail.id.clone();
                    let op = detail
                        .chain_mut(chain)
                        .ok_or(StatusError::ChainNotFound { id, chain })?;
                    transition(op, ChainOperationStatus::Pending)?;
                    op.retry_count += 1;
                    op.clear_errors();
                    op.started_at = None;
                    op.completed_at = None;
                    detail.errors.retain(|f| f.chain != chain);
                    Ok(())
                }),
            )
            .await?;
        self.emit(&detail, ConsolidationEventKind::ChainRetried, Some(chain))
            .await?;
        Ok(detail)
    }

    #[doc(hidden)]
    async fn emit(
        &self,
        detail: &ConsolidationStatusDetail,
        kind: ConsolidationEventKind,
        chain: Option<Chain>,
    ) -> Result<(), StatusError> {
        let mut event = ConsolidationEvent::new(kind, &detail.id, &detail.user_id, now_millis());
        event.chain = chain;
        self.record_event(event).await
    }
}
