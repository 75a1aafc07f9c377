use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::broadcast;

use crate::JobEvent;

/// Sink for a running job's progress percentage
pub trait ProgressReporter: Send + Sync {
    fn update_progress(&self, percent: u8);
}

/// Discards progress
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update_progress(&self, _percent: u8) {}
}

/// Progress handle for one dequeued job.
///
/// Progress never moves backwards; values above 100 are clamped.
pub struct JobContext {
    job_id: String,
    events: broadcast::Sender<JobEvent>,
    progress: AtomicU8,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, events: broadcast::Sender<JobEvent>) -> Self {
        Self {
            job_id: job_id.into(),
            events,
            progress: AtomicU8::new(0),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for JobContext {
    fn update_progress(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.progress.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            let _ = self.events.send(JobEvent::Progress {
                job_id: self.job_id.clone(),
                progress: percent,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let (tx, mut rx) = broadcast::channel(16);
        let ctx = JobContext::new("job-1", tx);

        ctx.update_progress(5);
        ctx.update_progress(50);
        ctx.update_progress(20);
        ctx.update_progress(50);
        ctx.update_progress(250);

        assert_eq!(ctx.progress(), 100);
        let mut seen = Vec::new();
        while let Ok(JobEvent::Progress { progress, .. }) = rx.try_recv() {
            seen.push(progress);
        }
        assert_eq!(seen, vec![5, 50, 100]);
    }
}
