//! Bounded retry policy applied uniformly to every source adapter.
//!
//! Each attempt runs under `timeout`. Failures (timeouts and unavailability)
//! are retried up to `max_retries` times with
//! `delay = min(base_delay * 2^(n-1), max_delay) + jitter(0..jitter)`.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::ingest::types::{RawArticle, SourceAdapter};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Upper bound for a single `fetch()` call.
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry `n` (1-based), without jitter.
    pub fn backoff(&self, n: u32) -> Duration {
        if n == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_with_jitter(&self, n: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.backoff(n) + Duration::from_millis(extra)
    }

    /// Run `adapter.fetch()` under this policy. Returns the last error once the
    /// attempt budget is exhausted.
    pub async fn fetch(&self, adapter: &dyn SourceAdapter) -> Result<Vec<RawArticle>, SourceError> {
        let source = adapter.source_id().to_string();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, adapter.fetch()).await {
                Ok(r) => r,
                Err(_) => Err(SourceError::Timeout {
                    source_id: source.clone(),
                    after: self.timeout,
                }),
            };

            match result {
                Ok(items) => {
                    debug!(source = %source, attempt, items = items.len(), "source fetched");
                    return Ok(items);
                }
                Err(e) if attempt < self.max_attempts() => {
                    let delay = self.delay_with_jitter(attempt);
                    warn!(
                        source = %source,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "source fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
