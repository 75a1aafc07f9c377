use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("route not supported: {reason}")]
    Unsupported { reason: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("transaction build failed: {reason}")]
    BuildFailed { reason: String },

    #[error("status query failed: {0}")]
    StatusQuery(String),
}
