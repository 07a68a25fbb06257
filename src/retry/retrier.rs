//! Async retry loop

use super::policy::{AttemptState, RetryDecision, RetryPolicy};
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs one logical operation under a [`RetryPolicy`].
///
/// Attempts and waits both race the cancellation token. A cancelled
/// operation returns [`Error::Cancelled`] without consulting the policy.
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Retrier {
    /// Create a retrier with a fresh cancellation token
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an existing cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The policy in force
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The token that cancels this retrier's operations
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `operation` until it succeeds, the policy gives up, or the token fires.
    ///
    /// The closure receives the 1-based attempt number. Errors that carry no
    /// classified failure (decode errors, bad config) are returned at once.
    /// A retryable failure that outlives the budget comes back as
    /// [`Error::RetriesExhausted`].
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        let mut state = AttemptState::new(0, Duration::ZERO);

        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                outcome = operation(attempt) => outcome,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let Some(failure) = err.to_retry_failure() else {
                return Err(err);
            };

            state.record(attempt, started.elapsed(), failure);
            let Some(failure) = state.last_failure.as_ref() else {
                return Err(err);
            };
            match self.policy.decide(failure, &state) {
                RetryDecision::Retry { after } => {
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        kind = %failure.kind,
                        status = failure.status_code,
                        delay_ms = after.as_millis() as u64,
                        "request failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(after) => {}
                    }
                }
                RetryDecision::GiveUp if self.policy.is_retryable(failure.kind) => {
                    warn!(
                        attempts = attempt,
                        kind = %failure.kind,
                        status = failure.status_code,
                        "retry budget exhausted"
                    );
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        failure: failure.clone(),
                    });
                }
                RetryDecision::GiveUp => return Err(err),
            }
        }
    }
}
