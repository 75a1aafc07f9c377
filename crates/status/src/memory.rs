use async_trait::async_trait;
use dustsweep_types::{
    now_millis, ConsolidationEvent, ConsolidationEventKind, ConsolidationJobData,
    ConsolidationState, ConsolidationStatusDetail,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::debug;

use crate::{StatusError, StatusTracker, StatusUpdate};

/// Retention limits for tracked consolidations
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub status_ttl: Duration,
    pub max_events: usize,
    pub max_history: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            status_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            max_events: 100,
            max_history: 500,
        }
    }
}

struct StatusEntry {
    detail: ConsolidationStatusDetail,
    expires_at: Instant,
}

#[derive(Default)]
struct TrackerState {
    statuses: HashMap<String, StatusEntry>,
    events: HashMap<String, VecDeque<ConsolidationEvent>>,
    history: HashMap<String, VecDeque<String>>,
}

impl TrackerState {
    fn live_mut(&mut self, id: &str, now: Instant) -> Option<&mut StatusEntry> {
        if self.statuses.get(id).is_some_and(|e| e.expires_at <= now) {
            self.statuses.remove(id);
            self.events.remove(id);
        }
        self.statuses.get_mut(id)
    }
}

/// In-process status tracker.
///
/// Every write takes a single lock, so updates to one consolidation are
/// serialised and each mutation sees the result of the previous one.
pub struct InMemoryStatusTracker {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
    events_tx: broadcast::Sender<ConsolidationEvent>,
}

impl InMemoryStatusTracker {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
            events_tx,
        }
    }

    /// Live feed of every recorded event
    pub fn subscribe(&self) -> broadcast::Receiver<ConsolidationEvent> {
        self.events_tx.subscribe()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.statuses.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn push_event(&self, state: &mut TrackerState, event: ConsolidationEvent) {
        let log = state
            .events
            .entry(event.consolidation_id.clone())
            .or_default();
        log.push_back(event.clone());
        while log.len() > self.config.max_events {
            log.pop_front();
        }
        // no subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

impl Default for InMemoryStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusTracker for InMemoryStatusTracker {
    async fn initialize_status(
        &self,
        job: &ConsolidationJobData,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if state.live_mut(&job.consolidation_id, now).is_some() {
            return Err(StatusError::AlreadyExists(job.consolidation_id.clone()));
        }

        let detail = ConsolidationStatusDetail::from_job(job, now_millis());
        state.statuses.insert(
            detail.id.clone(),
            StatusEntry {
                detail: detail.clone(),
                expires_at: now + self.config.status_ttl,
            },
        );

        let history = state.history.entry(job.user_id.clone()).or_default();
        history.push_front(detail.id.clone());
        history.truncate(self.config.max_history);

        debug!(consolidation_id = %detail.id, chains = detail.total_chains, "Initialized status");
        Ok(detail)
    }

    async fn get_status(&self, id: &str) -> Result<Option<ConsolidationStatusDetail>, StatusError> {
        let mut state = self.state.lock().await;
        Ok(state.live_mut(id, Instant::now()).map(|e| e.detail.clone()))
    }

    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<ConsolidationStatusDetail, StatusError> {
        let mut state = self.state.lock().await;
        let entry = state
            .live_mut(id, Instant::now())
            .ok_or_else(|| StatusError::NotFound(id.to_string()))?;

        // apply to a copy so a rejected update leaves no trace
        let mut detail = entry.detail.clone();
        let was_terminal = detail.status.is_terminal();
        update(&mut detail)?;
        detail.refresh(now_millis());
        entry.detail = detail.clone();

        if !was_terminal && detail.status.is_terminal() {
            let kind = match detail.status {
                ConsolidationState::Failed => ConsolidationEventKind::ConsolidationFailed,
                _ => ConsolidationEventKind::ConsolidationCompleted,
            };
            let mut event = ConsolidationEvent::new(kind, &detail.id, &detail.user_id, now_millis());
            event.error = detail.fault.clone();
            self.push_event(&mut state, event);
        }

        Ok(detail)
    }

    async fn record_event(&self, event: ConsolidationEvent) -> Result<(), StatusError> {
        let mut state = self.state.lock().await;
        self.push_event(&mut state, event);
        Ok(())
    }

    async fn events(&self, id: &str, limit: usize) -> Result<Vec<ConsolidationEvent>, StatusError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .get(id)
            .map(|log| {
                let skip = log.len().saturating_sub(limit);
                log.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn user_history(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConsolidationStatusDetail>, StatusError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let ids: Vec<String> = state
            .history
            .get(user_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default();

        let mut details = Vec::new();
        for id in ids.iter().skip(offset) {
            if details.len() >= limit {
                break;
            }
            if let Some(entry) = state.live_mut(id, now) {
                details.push(entry.detail.clone());
            }
        }
        Ok(details)
    }
}
