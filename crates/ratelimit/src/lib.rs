//! Flow control for consolidation workers
//!
//! - `TokenBucket`: job-start rate limiting that waits rather than rejects
//! - `WorkerSlots`: bounded concurrent job execution
//! - `PollBackoff`: delay schedule for re-polling bridge settlement

pub mod backoff;
pub mod limiter;
pub mod slots;

pub use backoff::PollBackoff;
pub use limiter::{RateLimitError, TokenBucket};
pub use slots::{SlotError, SlotGuard, WorkerSlots};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_slots() {
        let limiter = Arc::new(TokenBucket::new(5, 5).unwrap());
        let slots = WorkerSlots::new(3);
        let start = Instant::now();
        let mut handles = vec![];

        for _ in 0..10 {
            limiter.acquire().await;
            let guard = slots.acquire().await.unwrap();
            handles.push(tokio::spawn(async move {
                sleep(Duration::from_millis(50)).await;
                drop(guard);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        // the rate limit, not the slot count, dominates
        assert!(start.elapsed() >= Duration::from_millis(990));
        assert_eq!(slots.active(), 0);
    }
}
