//! Exponential-backoff retry for completion calls.

use crate::{config::Config, error::AiError, stats::StageStats};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first; 0 means exactly one attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.retry.max_retries,
            base_delay: Duration::from_secs_f64(cfg.retry.base_delay_seconds.max(0.0)),
            max_delay: Duration::from_secs_f64(cfg.retry.max_delay_seconds.max(0.0)),
        }
    }

    /// `min(base_delay * 2^attempt, max_delay)`, clamped so large attempt
    /// counts cannot overflow into a runaway sleep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(60) as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Run `op`, retrying transient failures with exponential backoff.
    ///
    /// Every failed attempt is recorded in the stats error counters, keyed
    /// by kind. Retryable kinds (rate-limit, auth, network) wait
    /// `delay_for_attempt` with the delay accumulated into
    /// `total_wait_time`; any other kind propagates immediately. After
    /// `max_retries` additional attempts the last error propagates to the
    /// caller.
    pub async fn run<T, F, Fut>(&self, stats: &mut StageStats, mut op: F) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    stats.errors.record(err.kind());
                    if !err.kind().is_retryable() {
                        return Err(err);
                    }
                    if attempt >= self.max_retries {
                        warn!(
                            kind = %err.kind(),
                            "max retries ({}) exceeded: {err}",
                            self.max_retries
                        );
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        kind = %err.kind(),
                        "attempt {}/{} failed; waiting {:.1}s: {err}",
                        attempt + 1,
                        self.max_retries + 1,
                        delay.as_secs_f64()
                    );
                    stats.total_wait_time += delay.as_secs_f64();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
