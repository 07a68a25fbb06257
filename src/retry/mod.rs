//! Retry module
//!
//! Decides whether a classified failure is worth another attempt and runs
//! the attempt loop.
//!
//! # Overview
//!
//! [`RetryPolicy::decide`] is a pure function of a failure and an
//! [`AttemptState`]. It never sleeps and holds no state between calls.
//! [`Retrier`] owns the loop: it calls the operation, converts errors into
//! failures, asks the policy, and waits out the delay. Waits race a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and end the
//! operation with [`Error::Cancelled`](crate::Error::Cancelled).
//!
//! | Kind         | Retried | Delay                               |
//! |--------------|---------|-------------------------------------|
//! | RateLimited  | yes     | `Retry-After` if known, else backoff |
//! | ServerFault  | yes     | backoff                             |
//! | Conflict     | opt-in  | backoff                             |
//! | others       | no      | -                                   |

mod policy;
mod retrier;

pub use policy::{AttemptState, Backoff, RetryDecision, RetryPolicy, RetryPolicyBuilder};
pub use retrier::Retrier;
