use std::future::Future;
use std::time::Duration;

use hfm_core::config::{Backoff, RetryConfig};
use hfm_core::error::HfmError;

/// Bounded retry around an operation that fails with [`HfmError`].
///
/// Transient failures are retried until `max_attempts` is reached and then
/// reported as [`HfmError::RetryExhausted`]. Permanent failures are returned
/// unchanged after the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay(), config.backoff)
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Backoff::Fixed)
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self.delay.saturating_mul(1 << (attempt - 1).min(16)),
        }
    }

    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T, HfmError>
    where
        F: FnMut() -> Result<T, HfmError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => match self.next_step(label, attempt, e) {
                    Ok(wait) => std::thread::sleep(wait),
                    Err(e) => return Err(e),
                },
            }
            attempt += 1;
        }
    }

    pub async fn run_async<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, HfmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HfmError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match self.next_step(label, attempt, e) {
                    Ok(wait) => tokio::time::sleep(wait).await,
                    Err(e) => return Err(e),
                },
            }
            attempt += 1;
        }
    }

    /// Decide between waiting for another attempt and giving up.
    fn next_step(&self, label: &str, attempt: u32, err: HfmError) -> Result<Duration, HfmError> {
        if !err.is_transient() {
            return Err(err);
        }
        if attempt >= self.max_attempts {
            tracing::warn!("{label}: giving up after {attempt} attempts: {err}");
            return Err(HfmError::RetryExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }
        let wait = self.delay_after(attempt);
        tracing::warn!(
            "{label}: attempt {attempt}/{} failed: {err}; retrying in {:?}",
            self.max_attempts,
            wait
        );
        Ok(wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
