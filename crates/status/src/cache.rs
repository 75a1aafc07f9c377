use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::CacheError;

/// Cache key layout shared by producers and consumers
pub mod keys {
    pub fn plan(plan_id: &str) -> String {
        format!("consolidation:plan:{plan_id}")
    }

    pub fn job(consolidation_id: &str) -> String {
        format!("consolidation:job:{consolidation_id}")
    }

    pub fn result(consolidation_id: &str) -> String {
        format!("consolidation:result:{consolidation_id}")
    }
}

/// Key-value store with per-entry expiry
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    async fn set_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Returns whether a live entry was removed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Typed access on top of any [`Cache`]
#[async_trait]
pub trait CacheExt: Cache {
    async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_value(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Process-local cache
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.lock().await.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .await
            .remove(key)
            .is_some_and(|e| e.expires_at > now))
    }
}
