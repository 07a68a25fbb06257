//! Retry decisions

use crate::classify::{ClassifiedFailure, FailureKind};
use crate::types::BackoffType;
use std::time::Duration;

// ============================================================================
// Backoff
// ============================================================================

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Growth strategy
    pub kind: BackoffType,
    /// Delay after the first failed attempt
    pub initial: Duration,
    /// Upper bound on any single delay
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            kind: BackoffType::Exponential,
            initial: Duration::from_millis(100),
            max: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    /// Create a backoff
    pub fn new(kind: BackoffType, initial: Duration, max: Duration) -> Self {
        Self { kind, initial, max }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1);
        let delay = match self.kind {
            BackoffType::Constant => self.initial,
            BackoffType::Linear => self.initial.saturating_mul(step + 1),
            BackoffType::Exponential => self.initial.saturating_mul(2u32.saturating_pow(step)),
        };

        std::cmp::min(delay, self.max)
    }
}

// ============================================================================
// Attempt State
// ============================================================================

/// Progress of one logical operation.
///
/// Each retried operation owns its own state; nothing is shared between
/// concurrent operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    /// Number of the attempt that just failed, starting at 1
    pub attempt_number: u32,
    /// Time since the first attempt started
    pub elapsed: Duration,
    /// Failure of the most recent attempt
    pub last_failure: Option<ClassifiedFailure>,
}

impl AttemptState {
    /// Create an attempt state with no recorded failure
    pub fn new(attempt_number: u32, elapsed: Duration) -> Self {
        Self {
            attempt_number,
            elapsed,
            last_failure: None,
        }
    }

    /// State after the first attempt failed immediately
    pub fn first() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Attach the failure of the attempt
    #[must_use]
    pub fn with_last_failure(mut self, failure: ClassifiedFailure) -> Self {
        self.last_failure = Some(failure);
        self
    }

    /// Advance to a newly failed attempt
    pub fn record(&mut self, attempt_number: u32, elapsed: Duration, failure: ClassifiedFailure) {
        self.attempt_number = attempt_number;
        self.elapsed = elapsed;
        self.last_failure = Some(failure);
    }
}

/// Outcome of [`RetryPolicy::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then attempt again
    Retry {
        /// How long to wait
        after: Duration,
    },
    /// Surface the failure
    GiveUp,
}

impl RetryDecision {
    /// Whether another attempt follows
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Attempt and time budgets plus the backoff for retryable failures.
///
/// A policy is a plain value. Every logical operation passes its own
/// [`AttemptState`], so one policy can serve any number of concurrent
/// operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed in total, including the first
    pub max_attempts: u32,
    /// Time allowed since the first attempt
    pub max_elapsed: Duration,
    /// Delay growth
    pub backoff: Backoff,
    /// Treat Conflict as retryable
    pub retry_on_conflict: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_elapsed: Duration::from_secs(300),
            backoff: Backoff::default(),
            retry_on_conflict: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether failures of `kind` are retried while budget remains
    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        kind.is_transient() || (kind == FailureKind::Conflict && self.retry_on_conflict)
    }

    /// Decide what follows a failed attempt
    pub fn decide(&self, failure: &ClassifiedFailure, state: &AttemptState) -> RetryDecision {
        if !self.is_retryable(failure.kind) {
            return RetryDecision::GiveUp;
        }
        if state.attempt_number >= self.max_attempts || state.elapsed >= self.max_elapsed {
            return RetryDecision::GiveUp;
        }

        let after = match (failure.kind, failure.retry_after) {
            (FailureKind::RateLimited, Some(after)) => after,
            _ => self.backoff.delay(state.attempt_number),
        };

        RetryDecision::Retry { after }
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set total attempts
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Set the time budget
    #[must_use]
    pub fn max_elapsed(mut self, elapsed: Duration) -> Self {
        self.policy.max_elapsed = elapsed;
        self
    }

    /// Set backoff configuration
    #[must_use]
    pub fn backoff(mut self, kind: BackoffType, initial: Duration, max: Duration) -> Self {
        self.policy.backoff = Backoff::new(kind, initial, max);
        self
    }

    /// Retry Conflict failures
    #[must_use]
    pub fn retry_on_conflict(mut self, retry: bool) -> Self {
        self.policy.retry_on_conflict = retry;
        self
    }

    /// Build the policy
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}
