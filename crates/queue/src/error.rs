use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("queue {queue} is closed")]
    Closed { queue: String },

    #[error("worker failed: {0}")]
    Worker(String),
}

/// Error returned by a job processor; the message is published with the failure event
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct JobFailure(pub String);

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
