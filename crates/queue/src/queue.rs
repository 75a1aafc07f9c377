use async_trait::async_trait;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::{JobEvent, JobHandle, JobOptions, JobPriority, QueueError, QueuedJob};

const EVENT_CAPACITY: usize = 1024;

/// Durable job queue with priorities, delays and lifecycle events
#[async_trait]
pub trait JobQueue<T: Send + 'static>: Send + Sync {
    fn name(&self) -> &str;

    /// Add a job. Returns the existing handle when `options.job_id` is already waiting or running.
    async fn enqueue(
        &self,
        name: &str,
        payload: T,
        options: JobOptions,
    ) -> Result<JobHandle, QueueError>;

    /// Wait for the next ready job; `None` once the queue is closed and drained
    async fn dequeue(&self) -> Option<QueuedJob<T>>;

    /// Publish a lifecycle event. Final events release the job id.
    async fn report(&self, event: JobEvent);

    /// Stop accepting jobs and wake blocked consumers
    async fn close(&self);

    /// Jobs waiting to run, including delayed ones
    async fn waiting(&self) -> usize;

    fn event_sender(&self) -> broadcast::Sender<JobEvent>;

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_sender().subscribe()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY QUEUE
// ═══════════════════════════════════════════════════════════════════════════

/// Wrapper for heap ordering: priority first, then FIFO within a level
struct HeapEntry<T> {
    job: QueuedJob<T>,
    seq: u64,
}

impl<T> HeapEntry<T> {
    fn key(&self) -> (JobPriority, Reverse<u64>) {
        (self.job.priority, Reverse(self.seq))
    }
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

struct DelayedEntry<T> {
    ready_at: Instant,
    entry: HeapEntry<T>,
}

struct QueueState<T> {
    ready: BinaryHeap<HeapEntry<T>>,
    delayed: Vec<DelayedEntry<T>>,
    /// Ids waiting, delayed or running
    live: HashMap<String, JobHandle>,
    running: HashSet<String>,
    next_seq: u64,
    closed: bool,
}

impl<T> QueueState<T> {
    fn promote_due(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].ready_at <= now {
                let due = self.delayed.swap_remove(i);
                self.ready.push(due.entry);
            } else {
                i += 1;
            }
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed.iter().map(|d| d.ready_at).min()
    }
}

/// Process-local [`JobQueue`]
pub struct InMemoryJobQueue<T> {
    name: String,
    state: Mutex<QueueState<T>>,
    notify: Notify,
    events: broadcast::Sender<JobEvent>,
}

impl<T> InMemoryJobQueue<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: name.into(),
            state: Mutex::new(QueueState {
                ready: BinaryHeap::new(),
                delayed: Vec::new(),
                live: HashMap::new(),
                running: HashSet::new(),
                next_seq: 0,
                closed: false,
            }),
            notify: Notify::new(),
            events,
        }
    }

    /// Jobs handed to a worker and not yet reported final
    pub async fn running(&self) -> usize {
        self.state.lock().await.running.len()
    }
}

#[async_trait]
impl<T: Send + 'static> JobQueue<T> for InMemoryJobQueue<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(
        &self,
        name: &str,
        payload: T,
        options: JobOptions,
    ) -> Result<JobHandle, QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed {
                queue: self.name.clone(),
            });
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let id = options.job_id.unwrap_or_else(|| format!("{}:{seq}", self.name));

        if let Some(existing) = state.live.get(&id) {
            debug!(queue = %self.name, job_id = %id, "Job already queued, skipping duplicate");
            return Ok(existing.clone());
        }

        let handle = JobHandle {
            id: id.clone(),
            name: name.to_string(),
            queue: self.name.clone(),
            priority: options.priority,
        };
        let entry = HeapEntry {
            job: QueuedJob {
                id: id.clone(),
                name: name.to_string(),
                payload,
                priority: options.priority,
                enqueued_at: chrono::Utc::now().timestamp_millis().max(0) as u64,
            },
            seq,
        };

        match options.delay.filter(|d| !d.is_zero()) {
            Some(delay) => state.delayed.push(DelayedEntry {
                ready_at: Instant::now() + delay,
                entry,
            }),
            None => state.ready.push(entry),
        }
        state.live.insert(id.clone(), handle.clone());
        drop(state);

        debug!(queue = %self.name, job_id = %id, priority = ?options.priority, "Job enqueued");
        self.notify.notify_waiters();
        Ok(handle)
    }

    async fn dequeue(&self) -> Option<QueuedJob<T>> {
        loop {
            // Registered before inspecting state so an enqueue in between is not missed
            let notified = self.notify.notified();

            let next_due = {
                let mut state = self.state.lock().await;
                state.promote_due(Instant::now());
                if let Some(entry) = state.ready.pop() {
                    state.running.insert(entry.job.id.clone());
                    return Some(entry.job);
                }
                if state.closed && state.delayed.is_empty() {
                    return None;
                }
                state.next_due()
            };

            match next_due {
                Some(at) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn report(&self, event: JobEvent) {
        if event.is_final() {
            let mut state = self.state.lock().await;
            state.running.remove(event.job_id());
            state.live.remove(event.job_id());
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    async fn waiting(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.delayed.len()
    }

    fn event_sender(&self) -> broadcast::Sender<JobEvent> {
        self.events.clone()
    }
}
