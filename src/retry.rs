use std::future::Future;

use rand::Rng;
use rocket::tokio::time::{sleep, Duration};

use crate::error::{Error, Result};

/// Exponential backoff for store calls that fail transiently.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (zero-based), capped at
    /// `max_delay`, with up to 50% random jitter added.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = base.as_millis() as u64 / 2;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Run `op`, retrying while it fails transiently. A transient failure that
/// outlasts the policy surfaces as [`Error::StoreUnavailable`]; any other
/// error is returned immediately.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_transient() => {
                if attempt >= policy.max_retries {
                    warn!("Giving up after {} attempts: {err}", attempt + 1);
                    return Err(match err {
                        Error::StoreUnavailable(_) => err,
                        other => Error::StoreUnavailable(other.to_string()),
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                debug!("Transient store failure, retrying in {delay:?}: {err}");
                sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
