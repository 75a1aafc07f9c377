use std::time::Duration;

/// Delay schedule for re-polling an external status.
///
/// Stateless: the caller carries the attempt number, so the schedule
/// survives a job being re-enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct PollBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_attempts: u32,
}

impl PollBackoff {
    pub fn new(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
            max_attempts,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Fixed-interval schedule
    pub fn constant(interval: Duration, max_attempts: u32) -> Self {
        Self::new(interval, interval, max_attempts).with_multiplier(1.0)
    }

    /// Delay before poll number `attempt + 1`, or `None` once exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_ms = (self.initial.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        Some(Duration::from_millis(delay_ms as u64))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), Duration::from_secs(120), 60)
    }
}
