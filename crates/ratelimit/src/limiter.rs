use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("invalid rate limit configuration: {reason}")]
    InvalidConfig { reason: String },
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilled continuously at a fixed rate
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Result<Self, RateLimitError> {
        if capacity == 0 || refill_per_sec == 0 {
            return Err(RateLimitError::InvalidConfig {
                reason: format!("capacity {capacity} and rate {refill_per_sec} must be non-zero"),
            });
        }
        Ok(Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec as f64,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Take a token if one is available, else report how long until one is
    async fn reserve(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    pub async fn try_acquire(&self) -> bool {
        self.reserve().await.is_ok()
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        while let Err(wait) = self.reserve().await {
            trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for token");
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn available(&self) -> u32 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens.floor() as u32
    }
}
