use dustsweep_metrics::MetricsCollector;
use dustsweep_optimizer::{BridgeQuoteSource, ConsolidationOptimizer, OptimizerConfig};
use dustsweep_queue::{InMemoryJobQueue, JobQueue, QueueError, Worker, WorkerConfig};
use dustsweep_ratelimit::{PollBackoff, TokenBucket};
use dustsweep_status::{Cache, InMemoryCache, InMemoryStatusTracker, StatusTracker};
use dustsweep_types::{BridgeTrackJob, ConsolidationJobData};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    BridgeExecutor, BridgeTracker, BuilderError, ConsolidationExecutionEngine,
    ConsolidationService, EngineConfig, RetryController, ServiceConfig, SwapExecutor,
};

pub const CONSOLIDATION_QUEUE: &str = "consolidations";
pub const TRACKING_QUEUE: &str = "bridge-tracking";

/// A fully wired consolidation system
pub struct DustSweep {
    service: Arc<ConsolidationService>,
    engine: Arc<ConsolidationExecutionEngine>,
    retry: Arc<RetryController>,
    bridge_tracker: Arc<BridgeTracker>,
    tracker: Arc<dyn StatusTracker>,
    cache: Arc<dyn Cache>,
    consolidation_queue: Arc<dyn JobQueue<ConsolidationJobData>>,
    tracking_queue: Arc<dyn JobQueue<BridgeTrackJob>>,
    worker_config: WorkerConfig,
    /// Job-start budget shared by every worker
    start_limiter: Arc<TokenBucket>,
}

impl DustSweep {
    pub fn builder() -> DustSweepBuilder {
        DustSweepBuilder::new()
    }

    pub fn service(&self) -> &Arc<ConsolidationService> {
        &self.service
    }

    pub fn engine(&self) -> &Arc<ConsolidationExecutionEngine> {
        &self.engine
    }

    pub fn retry(&self) -> &Arc<RetryController> {
        &self.retry
    }

    pub fn bridge_tracker(&self) -> &Arc<BridgeTracker> {
        &self.bridge_tracker
    }

    pub fn status_tracker(&self) -> &Arc<dyn StatusTracker> {
        &self.tracker
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn consolidation_queue(&self) -> &Arc<dyn JobQueue<ConsolidationJobData>> {
        &self.consolidation_queue
    }

    pub fn tracking_queue(&self) -> &Arc<dyn JobQueue<BridgeTrackJob>> {
        &self.tracking_queue
    }

    /// Start the consolidation and bridge-tracking workers
    pub fn spawn_workers(&self) -> Result<WorkerHandles, QueueError> {
        let consolidation = Arc::new(Worker::new(
            self.consolidation_queue.clone(),
            self.engine.clone(),
            self.worker_config.clone(),
        )?
        .with_limiter(self.start_limiter.clone()));
        let tracking = Arc::new(Worker::new(
            self.tracking_queue.clone(),
            self.bridge_tracker.clone(),
            self.worker_config.clone(),
        )?
        .with_limiter(self.start_limiter.clone()));

        let tasks = vec![
            tokio::spawn({
                let worker = consolidation.clone();
                async move { worker.run().await }
            }),
            tokio::spawn({
                let worker = tracking.clone();
                async move { worker.run().await }
            }),
        ];

        info!(
            concurrency = self.worker_config.concurrency,
            jobs_per_second = self.worker_config.jobs_per_second,
            "Workers started"
        );

        Ok(WorkerHandles {
            consolidation,
            tracking,
            tasks,
        })
    }
}

/// Running workers; dropping the handles leaves them running
pub struct WorkerHandles {
    consolidation: Arc<Worker<ConsolidationJobData, ConsolidationExecutionEngine>>,
    tracking: Arc<Worker<BridgeTrackJob, BridgeTracker>>,
    tasks: Vec<JoinHandle<Result<(), QueueError>>>,
}

impl WorkerHandles {
    pub fn active_jobs(&self) -> usize {
        self.consolidation.active_jobs() + self.tracking.active_jobs()
    }

    /// Stop taking jobs and wait for the running ones to finish
    pub async fn shutdown(self) -> Result<(), QueueError> {
        self.consolidation.shutdown();
        self.tracking.shutdown();
        for task in self.tasks {
            task.await
                .map_err(|e| QueueError::Worker(format!("worker task failed: {e}")))??;
        }
        info!("Workers stopped");
        Ok(())
    }
}

/// Builder for [`DustSweep`]
pub struct DustSweepBuilder {
    quote_source: Option<Arc<dyn BridgeQuoteSource>>,
    swap_executor: Option<Arc<dyn SwapExecutor>>,
    bridge_executor: Option<Arc<dyn BridgeExecutor>>,
    tracker: Option<Arc<dyn StatusTracker>>,
    cache: Option<Arc<dyn Cache>>,
    consolidation_queue: Option<Arc<dyn JobQueue<ConsolidationJobData>>>,
    tracking_queue: Option<Arc<dyn JobQueue<BridgeTrackJob>>>,
    metrics: Option<Arc<MetricsCollector>>,
    optimizer_config: OptimizerConfig,
    engine_config: EngineConfig,
    service_config: ServiceConfig,
    worker_config: WorkerConfig,
    backoff: PollBackoff,
}

impl DustSweepBuilder {
    pub fn new() -> Self {
        Self {
            quote_source: None,
            swap_executor: None,
            bridge_executor: None,
            tracker: None,
            cache: None,
            consolidation_queue: None,
            tracking_queue: None,
            metrics: None,
            optimizer_config: OptimizerConfig::default(),
            engine_config: EngineConfig::default(),
            service_config: ServiceConfig::default(),
            worker_config: WorkerConfig::default(),
            backoff: PollBackoff::default(),
        }
    }

    pub fn quote_source(mut self, source: Arc<dyn BridgeQuoteSource>) -> Self {
        self.quote_source = Some(source);
        self
    }

    pub fn swap_executor(mut self, executor: Arc<dyn SwapExecutor>) -> Self {
        self.swap_executor = Some(executor);
        self
    }

    pub fn bridge_executor(mut self, executor: Arc<dyn BridgeExecutor>) -> Self {
        self.bridge_executor = Some(executor);
        self
    }

    pub fn status_tracker(mut self, tracker: Arc<dyn StatusTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn consolidation_queue(mut self, queue: Arc<dyn JobQueue<ConsolidationJobData>>) -> Self {
        self.consolidation_queue = Some(queue);
        self
    }

    pub fn tracking_queue(mut self, queue: Arc<dyn JobQueue<BridgeTrackJob>>) -> Self {
        self.tracking_queue = Some(queue);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn optimizer_config(mut self, config: OptimizerConfig) -> Self {
        self.optimizer_config = config;
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn service_config(mut self, config: ServiceConfig) -> Self {
        self.service_config = config;
        self
    }

    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker_config = config;
        self
    }

    pub fn tracking_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn build(self) -> Result<DustSweep, BuilderError> {
        let quote_source = self.quote_source.ok_or_else(|| missing("quote_source"))?;
        let swaps = self.swap_executor.ok_or_else(|| missing("swap_executor"))?;
        let bridges = self.bridge_executor.ok_or_else(|| missing("bridge_executor"))?;

        if self.worker_config.concurrency == 0 {
            return Err(BuilderError::InvalidConfig {
                reason: "worker concurrency must be at least 1".into(),
            });
        }
        if self.worker_config.jobs_per_second == 0 {
            return Err(BuilderError::InvalidConfig {
                reason: "worker jobs_per_second must be at least 1".into(),
            });
        }
        if self.service_config.max_chains_per_consolidation == 0 {
            return Err(BuilderError::InvalidConfig {
                reason: "max_chains_per_consolidation must be at least 1".into(),
            });
        }

        let start_limiter = TokenBucket::new(
            self.worker_config.jobs_per_second,
            self.worker_config.jobs_per_second,
        )
        .map_err(|e| BuilderError::InvalidConfig {
            reason: e.to_string(),
        })?;

        let tracker = self
            .tracker
            .unwrap_or_else(|| Arc::new(InMemoryStatusTracker::new()));
        let cache = self.cache.unwrap_or_else(|| Arc::new(InMemoryCache::new()));
        let consolidation_queue = self
            .consolidation_queue
            .unwrap_or_else(|| Arc::new(InMemoryJobQueue::new(CONSOLIDATION_QUEUE)));
        let tracking_queue = self
            .tracking_queue
            .unwrap_or_else(|| Arc::new(InMemoryJobQueue::new(TRACKING_QUEUE)));

        let optimizer = Arc::new(ConsolidationOptimizer::new(
            quote_source.clone(),
            self.optimizer_config,
        ));

        let mut engine = ConsolidationExecutionEngine::new(
            tracker.clone(),
            cache.clone(),
            swaps,
            bridges,
            quote_source.clone(),
            tracking_queue.clone(),
            self.engine_config,
        );
        let mut service = ConsolidationService::new(
            optimizer,
            tracker.clone(),
            cache.clone(),
            consolidation_queue.clone(),
            self.service_config,
        );
        let mut retry = RetryController::new(
            tracker.clone(),
            cache.clone(),
            consolidation_queue.clone(),
        );
        let mut bridge_tracker = BridgeTracker::new(
            tracker.clone(),
            quote_source,
            tracking_queue.clone(),
            self.backoff,
        );

        if let Some(metrics) = self.metrics {
            engine = engine.with_metrics(metrics.clone());
            service = service.with_metrics(metrics.clone());
            retry = retry.with_metrics(metrics.clone());
            bridge_tracker = bridge_tracker.with_metrics(metrics);
        }

        Ok(DustSweep {
            service: Arc::new(service),
            engine: Arc::new(engine),
            retry: Arc::new(retry),
            bridge_tracker: Arc::new(bridge_tracker),
            tracker,
            cache,
            consolidation_queue,
            tracking_queue,
            worker_config: self.worker_config,
            start_limiter: Arc::new(start_limiter),
        })
    }
}

impl Default for DustSweepBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> BuilderError {
    BuilderError::MissingField {
        field: field.to_string(),
    }
}
