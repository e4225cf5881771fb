//! Backoff primitives shared by the lifecycle controller's port-wait loop
//! and the front end's reconnect/discovery polling. Generic over the
//! operation's error type so each caller can decide what counts as
//! retryable without this module knowing about sockets or JSON-RPC.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Backoff to sleep *before* attempt number `attempt` (0-indexed).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_millis() as f64);

        if self.use_jitter {
            let jitter = rand::thread_rng().gen::<f64>() * capped * 0.1;
            Duration::from_millis((capped + jitter) as u64)
        } else {
            Duration::from_millis(capped as u64)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Retry `operation` under `policy`, consulting `is_retryable` after every
/// failure. Stops and returns the error immediately once `is_retryable`
/// says no, or once attempts are exhausted.
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !is_retryable(&error) {
                    return Err(error);
                }
                tokio::time::sleep(policy.backoff_duration(attempt - 1)).await;
            }
        }
    }
}

/// Race `future` against `duration`. `Ok(None)` means the timeout fired.
pub async fn with_timeout<F: Future>(duration: Duration, future: F) -> Option<F::Output> {
    timeout(duration, future).await.ok()
}
