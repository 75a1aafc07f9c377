use dustsweep_types::{Chain, ChainOperationStatus};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatusError {
    #[error("consolidation not found: {0}")]
    NotFound(String),

    #[error("consolidation already exists: {0}")]
    AlreadyExists(String),

    #[error("chain {chain} is not part of consolidation {id}")]
    ChainNotFound { id: String, chain: Chain },

    #[error("invalid transition for {chain}: {from} -> {to}")]
    InvalidTransition {
        chain: Chain,
        from: ChainOperationStatus,
        to: ChainOperationStatus,
    },

    #[error("status backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}
