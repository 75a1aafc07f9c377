use async_trait::async_trait;
use dustsweep_ratelimit::{TokenBucket, WorkerSlots};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

use crate::{JobContext, JobEvent, JobFailure, JobQueue, ProgressReporter, QueueError, QueuedJob};

/// Handles one job type pulled from a queue
#[async_trait]
pub trait JobProcessor<T: Send + Sync>: Send + Sync {
    type Output: Serialize + Send;

    async fn process(
        &self,
        job: &QueuedJob<T>,
        progress: &dyn ProgressReporter,
    ) -> Result<Self::Output, JobFailure>;
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Jobs processed in parallel
    pub concurrency: usize,

    /// Job starts allowed per second
    pub jobs_per_second: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            jobs_per_second: 5,
        }
    }
}

impl WorkerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_jobs_per_second(mut self, jobs_per_second: u32) -> Self {
        self.jobs_per_second = jobs_per_second;
        self
    }
}

/// Pulls jobs from a queue and runs them with bounded concurrency and start rate
pub struct Worker<T, P> {
    queue: Arc<dyn JobQueue<T>>,
    processor: Arc<P>,
    slots: WorkerSlots,
    limiter: Arc<TokenBucket>,
    shutdown: watch::Sender<bool>,
}

impl<T, P> Worker<T, P>
where
    T: Send + Sync + 'static,
    P: JobProcessor<T> + 'static,
{
    pub fn new(
        queue: Arc<dyn JobQueue<T>>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Result<Self, QueueError> {
        let limiter = TokenBucket::new(config.jobs_per_second, config.jobs_per_second)
            .map_err(|e| QueueError::Worker(e.to_string()))?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            queue,
            processor,
            slots: WorkerSlots::new(config.concurrency),
            limiter: Arc::new(limiter),
            shutdown,
        })
    }

    /// Draw job starts from a bucket shared with other workers
    pub fn with_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> &Arc<TokenBucket> {
        &self.limiter
    }

    /// Stop taking new jobs; `run` returns once in-flight jobs finish
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn active_jobs(&self) -> usize {
        self.slots.active()
    }

    /// Process jobs until shutdown or until the queue closes and drains
    pub async fn run(&self) -> Result<(), QueueError> {
        let mut shutdown = self.shutdown.subscribe();
        info!(
            queue = %self.queue.name(),
            concurrency = self.slots.max_concurrent(),
            "Worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let slot = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                slot = self.slots.acquire() => slot.map_err(|e| QueueError::Worker(e.to_string()))?,
            };

            let job = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                job = self.queue.dequeue() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.limiter.acquire().await;

            let span = info_span!("job", queue = %self.queue.name(), job_id = %job.id, name = %job.name);
            let queue = self.queue.clone();
            let processor = self.processor.clone();
            tokio::spawn(
                async move {
                    let _slot = slot;
                    execute(queue, processor, job).await;
                }
                .instrument(span),
            );
        }

        info!(queue = %self.queue.name(), active = self.slots.active(), "Worker draining");
        self.slots
            .wait_idle()
            .await
            .map_err(|e| QueueError::Worker(e.to_string()))?;
        info!(queue = %self.queue.name(), "Worker stopped");
        Ok(())
    }
}

async fn execute<T, P>(queue: Arc<dyn JobQueue<T>>, processor: Arc<P>, job: QueuedJob<T>)
where
    T: Send + Sync + 'static,
    P: JobProcessor<T>,
{
    let ctx = JobContext::new(job.id.clone(), queue.event_sender());

    let event = match processor.process(&job, &ctx).await {
        Ok(output) => match serde_json::to_value(&output) {
            Ok(result) => {
                info!("Job completed");
                JobEvent::Completed {
                    job_id: job.id.clone(),
                    result,
                }
            }
            Err(e) => {
                warn!(error = %e, "Job result could not be serialized");
                JobEvent::Failed {
                    job_id: job.id.clone(),
                    error: e.to_string(),
                }
            }
        },
        Err(failure) => {
            warn!(error = %failure, "Job failed");
            JobEvent::Failed {
                job_id: job.id.clone(),
                error: failure.to_string(),
            }
        }
    };

    queue.report(event).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryJobQueue, JobOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Recorder {
        running: AtomicUsize,
        peak: AtomicUsize,
        done: AtomicUsize,
        hold: Duration,
    }

    #[async_trait]
    impl JobProcessor<u32> for Recorder {
        type Output = u32;

        async fn process(
            &self,
            job: &QueuedJob<u32>,
            progress: &dyn ProgressReporter,
        ) -> Result<u32, JobFailure> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            progress.update_progress(50);
            tokio::time::sleep(self.hold).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.done.fetch_add(1, Ordering::SeqCst);
            if job.payload == 13 {
                return Err(JobFailure::new("unlucky"));
            }
            Ok(job.payload * 2)
        }
    }

    fn worker(
        queue: &Arc<InMemoryJobQueue<u32>>,
        processor: Arc<Recorder>,
        config: WorkerConfig,
    ) -> Worker<u32, Recorder> {
        let queue: Arc<dyn JobQueue<u32>> = queue.clone();
        Worker::new(queue, processor, config).unwrap()
    }

    fn recorder(hold: Duration) -> Arc<Recorder> {
        Arc::new(Recorder {
            hold,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let queue: Arc<InMemoryJobQueue<u32>> = Arc::new(InMemoryJobQueue::new("q"));
        for i in 0..6 {
            queue.enqueue("job", i, JobOptions::default()).await.unwrap();
        }
        queue.close().await;

        let processor = recorder(Duration::from_millis(100));
        let worker = worker(
            &queue,
            processor.clone(),
            WorkerConfig::default().with_jobs_per_second(100),
        );
        worker.run().await.unwrap();

        assert_eq!(processor.done.load(Ordering::SeqCst), 6);
        assert_eq!(processor.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spaces_job_starts() {
        let queue: Arc<InMemoryJobQueue<u32>> = Arc::new(InMemoryJobQueue::new("q"));
        for i in 0..10 {
            queue.enqueue("job", i, JobOptions::default()).await.unwrap();
        }
        queue.close().await;

        let processor = recorder(Duration::ZERO);
        let worker = worker(
            &queue,
            processor.clone(),
            WorkerConfig::default().with_jobs_per_second(5),
        );

        let start = Instant::now();
        worker.run().await.unwrap();
        assert_eq!(processor.done.load(Ordering::SeqCst), 10);
        // Burst of 5 then 5 more at 5/s
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_share_one_start_budget() {
        let first: Arc<InMemoryJobQueue<u32>> = Arc::new(InMemoryJobQueue::new("first"));
        let second: Arc<InMemoryJobQueue<u32>> = Arc::new(InMemoryJobQueue::new("second"));
        for i in 0..5 {
            first.enqueue("job", i, JobOptions::default()).await.unwrap();
            second.enqueue("job", i, JobOptions::default()).await.unwrap();
        }
        first.close().await;
        second.close().await;

        let limiter = Arc::new(TokenBucket::new(5, 5).unwrap());
        let processor = recorder(Duration::ZERO);
        let a = worker(&first, processor.clone(), WorkerConfig::default())
            .with_limiter(limiter.clone());
        let b = worker(&second, processor.clone(), WorkerConfig::default())
            .with_limiter(limiter.clone());
        assert!(Arc::ptr_eq(a.limiter(), b.limiter()));

        let start = Instant::now();
        let (ra, rb) = tokio::join!(a.run(), b.run());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(processor.done.load(Ordering::SeqCst), 10);
        // ten starts from one bucket of 5/s: a burst of 5, then 5 more
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_for_success_and_failure() {
        let queue: Arc<InMemoryJobQueue<u32>> = Arc::new(InMemoryJobQueue::new("q"));
        let mut events = queue.subscribe();
        queue
            .enqueue("ok", 4, JobOptions::default().with_job_id("ok"))
            .await
            .unwrap();
        queue
            .enqueue("bad", 13, JobOptions::default().with_job_id("bad"))
            .await
            .unwrap();
        queue.close().await;

        let worker = worker(&queue, recorder(Duration::ZERO), WorkerConfig::default());
        worker.run().await.unwrap();

        let mut finals = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.is_final() {
                finals.push(event);
            }
        }
        assert!(finals.contains(&JobEvent::Completed {
            job_id: "ok".into(),
            result: serde_json::json!(8),
        }));
        assert!(finals.contains(&JobEvent::Failed {
            job_id: "bad".into(),
            error: "unlucky".into(),
        }));
        assert_eq!(queue.running().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_finishes_in_flight_jobs() {
        let queue: Arc<InMemoryJobQueue<u32>> = Arc::new(InMemoryJobQueue::new("q"));
        for i in 0..5 {
            queue.enqueue("job", i, JobOptions::default()).await.unwrap();
        }

        let processor = recorder(Duration::from_secs(10));
        let worker = Arc::new(worker(
            &queue,
            processor.clone(),
            WorkerConfig::default().with_concurrency(2),
        ));

        let runner = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(worker.active_jobs(), 2);

        worker.shutdown();
        runner.await.unwrap().unwrap();

        assert_eq!(processor.done.load(Ordering::SeqCst), 2);
        assert_eq!(queue.waiting().await, 3);
    }
}
