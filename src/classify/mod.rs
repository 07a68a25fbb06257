//! Error classification module
//!
//! Turns a completed non-success HTTP response (or a success response whose
//! payload carries an embedded failure) into a [`ClassifiedFailure`].
//!
//! # Overview
//!
//! Classification is status-code first:
//!
//! | Status | Kind |
//! |--------|------|
//! | 401, 403 | `Unauthorized` |
//! | 404 | `NotFound` |
//! | 409 | `Conflict` |
//! | 429, or 4xx with an exhausted rate-limit header | `RateLimited` |
//! | 5xx | `ServerFault` |
//! | anything else | `Unrecognized` |
//!
//! Provider-specific refinement rules (message substring, error code, regex)
//! run afterwards and may override the kind.

mod classifier;
mod types;

pub use classifier::{
    ErrorClassifier, ErrorClassifierBuilder, Matcher, PayloadCheck, PayloadFailureRule,
    RefinementRule, MAX_RETRY_AFTER,
};
pub use types::{ClassifiedFailure, FailureKind};

#[cfg(test)]
mod tests;
