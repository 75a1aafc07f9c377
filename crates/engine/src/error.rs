use dustsweep_optimizer::QuoteError;
use dustsweep_queue::QueueError;
use dustsweep_status::{CacheError, StatusError};
use dustsweep_types::{Chain, ChainOperationStatus};
use thiserror::Error;

/// Failure of a single swap or bridge step
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("transaction rejected: {reason}")]
    Rejected { reason: String },

    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: String, reason: String },

    #[error("step timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("no bridge selected for {chain}")]
    MissingBridge { chain: Chain },

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Why a chain could not be retried
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("consolidation not found: {0}")]
    ConsolidationNotFound(String),

    #[error("chain {chain} is not part of consolidation {id}")]
    ChainNotFound { id: String, chain: Chain },

    #[error("chain {chain} is {status}, only failed chains can be retried")]
    NotFailed {
        chain: Chain,
        status: ChainOperationStatus,
    },

    #[error("job data for consolidation {0} has expired")]
    JobDataMissing(String),

    #[error("chain {chain} has no plan in consolidation {id}")]
    ChainNotInPlan { id: String, chain: Chain },

    #[error("status store error: {0}")]
    Status(#[from] StatusError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Request-level failures of the consolidation service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("no chains have sufficient value (minimum ${min_value_usd})")]
    InsufficientValue { min_value_usd: String },

    #[error("no viable consolidation routes found")]
    NoViableRoutes,

    #[error("consolidation plan {0} not found or expired")]
    PlanNotFound(String),

    #[error("consolidation plan {0} has expired, request a new quote")]
    PlanExpired(String),

    #[error("plan {plan_id} belongs to a different user")]
    UserMismatch { plan_id: String },

    #[error("status store error: {0}")]
    Status(#[from] StatusError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
