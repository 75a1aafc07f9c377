use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("worker slots are closed")]
    Closed,
}

/// Bounded pool of concurrent worker slots
#[derive(Clone)]
pub struct WorkerSlots {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    active: Arc<AtomicUsize>,
}

/// Held for as long as a job occupies a slot
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerSlots {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<SlotGuard, SlotError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SlotError::Closed)?;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(SlotGuard {
            _permit: permit,
            active: self.active.clone(),
        })
    }

    /// Wait until every slot is free
    pub async fn wait_idle(&self) -> Result<(), SlotError> {
        let _all = self
            .semaphore
            .acquire_many(self.max_concurrent as u32)
            .await
            .map_err(|_| SlotError::Closed)?;
        Ok(())
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_slots_bound_concurrency() {
        let slots = WorkerSlots::new(3);
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let guard = slots.acquire().await.unwrap();
            let slots = slots.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                peak.fetch_max(slots.active(), Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                drop(guard);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(slots.active(), 0);
        assert_eq!(slots.available(), 3);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_after_release() {
        let slots = WorkerSlots::new(2);
        let guard = slots.acquire().await.unwrap();

        let waiter = {
            let slots = slots.clone();
            tokio::spawn(async move { slots.wait_idle().await })
        };

        sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[test]
    fn test_zero_slots_clamped_to_one() {
        assert_eq!(WorkerSlots::new(0).max_concurrent(), 1);
    }
}
