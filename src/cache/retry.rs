//! Retry policy with capped exponential backoff.

use color_eyre::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// How many times a failed request is retried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl RetryPolicy {
  pub const fn new(max_retries: u32) -> Self {
    Self {
      max_retries,
      base_delay: Duration::from_millis(1000),
      max_delay: Duration::from_secs(30),
    }
  }

  /// Default for reads: two retries.
  pub const fn queries() -> Self {
    Self::new(2)
  }

  /// Default for writes: one retry.
  pub const fn mutations() -> Self {
    Self::new(1)
  }

  /// Whether another attempt is allowed after `failures` consecutive failures.
  pub fn should_retry(&self, failures: u32) -> bool {
    failures <= self.max_retries
  }

  /// Delay before the retry that follows the `failures`-th failure.
  ///
  /// `min(base * 2^(failures - 1), max)`: 1s, 2s, 4s, ... capped at 30s.
  pub fn delay_for(&self, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    self
      .base_delay
      .saturating_mul(1u32 << exponent)
      .min(self.max_delay)
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::queries()
  }
}

/// Run `op` until it succeeds or the policy gives up, sleeping between attempts.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, label: &str, op: F) -> Result<T>
where
  F: Fn() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut failures = 0u32;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(e) => {
        failures += 1;
        if !policy.should_retry(failures) {
          error!(operation = label, attempts = failures, error = %e, "giving up");
          return Err(e);
        }
        let delay = policy.delay_for(failures);
        warn!(
          operation = label,
          attempt = failures,
          delay_ms = delay.as_millis() as u64,
          error = %e,
          "retrying"
        );
        tokio::time::sleep(delay).await;
      }
    }
  }
}
