use std::{future::Future, time::Duration};

use shared::protocol::StepOutcome;
use storage::is_transient;
use tracing::{debug, warn};

/// Bounded exponential backoff for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Pause after the `retry`-th failed attempt (0-based): `base × 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryFailure {
    #[error("gave up after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
    #[error("{message}")]
    Permanent { message: String },
}

impl RetryFailure {
    pub fn into_outcome(self) -> StepOutcome {
        match self {
            RetryFailure::Exhausted { .. } => StepOutcome::FailedTransient {
                error: self.to_string(),
            },
            RetryFailure::Permanent { message } => StepOutcome::FailedPermanent { error: message },
        }
    }
}

/// Runs `op`, retrying only failures classified as transient.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let message = format!("{err:#}");

        if !is_transient(&err) {
            warn!(op = label, attempt, error = %message, "store operation failed permanently");
            return Err(RetryFailure::Permanent { message });
        }
        if attempt >= max_attempts {
            warn!(op = label, attempt, error = %message, "store operation failed after retries");
            return Err(RetryFailure::Exhausted {
                attempts: attempt,
                message,
            });
        }

        let delay = policy.delay_for(attempt - 1);
        debug!(
            op = label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "transient store failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Like [`retry`] but collapses any failure to `None`.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    retry(policy, label, op).await.ok()
}
