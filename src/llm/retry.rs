use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::Result;

/// Exponential backoff configuration for external model calls.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub factor: f64,
    pub jitter_percent: f64,
    pub max_ms: u64,
    /// Attempts after the first one.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 250,
            factor: 2.0,
            jitter_percent: 0.20,
            max_ms: 8_000,
            max_retries: 3,
        }
    }
}

impl BackoffConfig {
    pub fn new(base_ms: u64, max_retries: u32) -> Self {
        Self {
            base_ms,
            max_retries,
            ..Self::default()
        }
    }

    /// No retries at all; used by tests and one-shot tools.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (0-based), with ±jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = (self.base_ms as f64 * self.factor.powi(attempt as i32)).min(self.max_ms as f64);

        let jitter_range = base * self.jitter_percent;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((base + jitter).max(0.0) as u64)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The last error is returned.
pub async fn with_backoff<T, F, Fut>(backoff: &BackoffConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < backoff.max_retries => {
                let delay = backoff.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying model call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
