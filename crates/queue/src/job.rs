use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Scheduling priority; higher levels are dequeued first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low = 1,
    #[default]
    Normal = 2,
    /// Retries jump ahead of fresh work
    High = 3,
}

#[derive(Clone, Debug, Default)]
pub struct JobOptions {
    pub priority: JobPriority,

    /// Hold the job back for this long before it becomes ready
    pub delay: Option<Duration>,

    /// Explicit id; enqueueing an id that is still waiting or running is a no-op
    pub job_id: Option<String>,
}

impl JobOptions {
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

/// Reference to an enqueued job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub name: String,
    pub queue: String,
    pub priority: JobPriority,
}

/// A job as handed to a worker
#[derive(Clone, Debug)]
pub struct QueuedJob<T> {
    pub id: String,
    pub name: String,
    pub payload: T,
    pub priority: JobPriority,
    /// Unix milliseconds
    pub enqueued_at: u64,
}

/// Lifecycle notifications published by a queue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress { job_id: String, progress: u8 },
    Completed { job_id: String, result: serde_json::Value },
    Failed { job_id: String, error: String },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. } => job_id,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, JobEvent::Progress { .. })
    }
}

/// Stable job id derived from its identifying parts
pub fn derive_job_id(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    format!("{prefix}-{}", hex::encode(&digest[..12]))
}
