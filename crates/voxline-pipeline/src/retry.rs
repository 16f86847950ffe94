//! Bounded exponential-backoff retry for backend calls.
//!
//! Download, transcription, and synthesis all cross the network; a transient
//! failure there should not burn the whole session. Retries are bounded and
//! short — the webhook response is held open for the full pipeline, so the
//! budget for waiting is small.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    /// Ceiling on the per-attempt delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Delay for retry attempt `n` (0-indexed): `min(base * 2^n, max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt);
        let raw_ms = (self.base_delay.as_millis() as u64).saturating_mul(exp);
        Duration::from_millis(raw_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Runs `op` up to `1 + max_retries` times, sleeping between attempts.
///
/// Every error is treated as retryable; the per-stage deadline in the
/// orchestrator bounds the total time spent here.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, stage: &str, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries => {
                let delay = config.delay(attempt);
                warn!(stage, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "retrying after failure: {e}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
