//! Retry with exponential backoff, and a bounded wait on a single call.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::warn;

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::{EmbeddingError, QuarryError, QuarryResult};

/// Backoff doubling is capped at 2^6 times the initial delay.
const MAX_BACKOFF_SHIFT: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.initial_backoff * (1u32 << shift)
    }
}

/// The last error once every attempt has failed.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: QuarryError,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out
/// of attempts. Returns the value and the number of attempts made.
pub fn with_retry<T, F>(policy: &RetryPolicy, mut op: F) -> Result<(T, u32), RetryExhausted>
where
    F: FnMut(u32) -> QuarryResult<T>,
{
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if e.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.backoff(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                })
            }
        }
    }
}

/// Run `op` on a helper thread and wait at most `timeout` for its result.
/// A call that overruns is abandoned; its result is discarded.
pub fn call_with_timeout<T, F>(timeout: Duration, op: F) -> QuarryResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> QuarryResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("quarry-encode-call".to_string())
        .spawn(move || {
            let _ = tx.send(op());
        })?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EmbeddingError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
        .into()),
        Err(RecvTimeoutError::Disconnected) => Err(EmbeddingError::InferenceFailed {
            reason: "encoder call panicked".to_string(),
        }
        .into()),
    }
}
