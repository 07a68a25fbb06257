//! HTTP client module
//!
//! Provides the request executor and the classify-and-retry send loop.
//!
//! # Features
//!
//! - **Classification**: every response runs through an
//!   [`ErrorClassifier`](crate::classify::ErrorClassifier), payload included
//! - **Automatic Retries**: [`RetryPolicy`](crate::retry::RetryPolicy) per
//!   client, overridable per request
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Cancellation**: pending attempts and waits stop on a
//!   `CancellationToken`

mod client;
mod rate_limit;
mod types;

pub use client::{send_classified, HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use types::{ApiRequest, RawResponse, RequestExecutor};
