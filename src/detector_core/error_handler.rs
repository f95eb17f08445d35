use std::time::Duration;
use tokio::time::sleep;

/// Default spacing between store write attempts
pub const RETRY_STEP: Duration = Duration::from_millis(200);

/// Tiered backoff for store writes: after failed attempt `i` wait `i * step`
#[derive(Debug)]
pub struct RetryBackoff {
    step: Duration,
    max_attempts: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl RetryBackoff {
    /// `max_retries` counts the first attempt; 0 still allows one attempt
    pub fn new(step: Duration, max_retries: u32) -> Self {
        Self {
            step,
            max_attempts: max_retries.max(1),
            current_attempt: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Mark the start of a new attempt and return its 1-indexed number
    pub fn begin_attempt(&mut self) -> u32 {
        self.current_attempt += 1;
        self.current_attempt
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step * attempt
    }

    /// Wait before the next attempt, or fail if the budget is spent
    pub async fn sleep(&mut self) -> Result<Duration, MaxRetriesExceeded> {
        if self.current_attempt >= self.max_attempts {
            return Err(MaxRetriesExceeded);
        }

        let delay = self.delay_for(self.current_attempt);

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_attempts,
            delay.as_millis()
        );

        sleep(delay).await;
        Ok(delay)
    }
}
