//! HTTP client with classification, retry and rate limiting
//!
//! Every call goes through the same cycle:
//! - wait for the rate limiter
//! - send the request and drain the body (a 429 may hold the limiter off)
//! - classify the response (status, headers and payload)
//! - on failure, ask the retry policy and wait or give up

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::types::{ApiRequest, RawResponse, RequestExecutor};
use crate::classify::ErrorClassifier;
use crate::error::{Error, Result};
use crate::retry::{Retrier, RetryPolicy};
use crate::types::BackoffType;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Transport settings shared by every call of one client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Prefix for relative request paths
    pub base_url: Option<String>,
    /// Per-attempt timeout unless the request sets its own
    pub timeout: Duration,
    /// Retry policy for calls that do not bring their own
    pub retry: RetryPolicy,
    /// Client-side token bucket, `None` to send unpaced
    pub rate_limit: Option<RateLimiterConfig>,
    /// Pause the whole limiter for a 429's `Retry-After`. Off by default:
    /// the window then applies to every caller sharing this client.
    pub hold_off_on_throttle: bool,
    /// Headers added to every request before its own
    pub default_headers: HashMap<String, String>,
    /// `User-Agent` sent with every request
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            rate_limit: Some(RateLimiterConfig::default()),
            hold_off_on_throttle: false,
            default_headers: HashMap::new(),
            user_agent: format!("nimbus/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Start from the defaults
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Fluent construction of [`HttpClientConfig`]
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Resolve relative paths against `url`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set total attempts per call
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Backoff between attempts of the default policy
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.retry.backoff = crate::retry::Backoff::new(backoff_type, initial, max);
        self
    }

    /// Replace the whole retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Pace requests through a token bucket
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Send without client-side pacing
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Share a 429's `Retry-After` window with every caller of the client
    pub fn hold_off_on_throttle(mut self, enabled: bool) -> Self {
        self.config.hold_off_on_throttle = enabled;
        self
    }

    /// Header sent on every request
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Override the `User-Agent`
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Finish
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client that classifies every response and retries transient failures
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    classifier: ErrorClassifier,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Client with the default settings and classifier
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Client for `config` with the default classifier
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            classifier: ErrorClassifier::default(),
            rate_limiter,
        })
    }

    /// Use a provider-specific classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// The client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// The classifier applied to every response
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Whether requests are paced client-side
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// The client-side rate limiter, when enabled
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    /// Hold the limiter off for the server's throttling window
    fn hold_off_from(&self, headers: &HeaderMap) {
        let Some(limiter) = &self.rate_limiter else {
            return;
        };
        if let Some(after) = self.classifier.retry_after(Utc::now(), headers) {
            limiter.hold_off(after);
        }
    }

    /// Send a request with classification and retry
    pub async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.send_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Send a request; firing `cancel` aborts the attempt or wait in progress
    pub async fn send_with_cancel(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        let policy = request
            .retry
            .clone()
            .unwrap_or_else(|| self.config.retry.clone());
        let retrier = Retrier::new(policy).with_cancellation(cancel.clone());
        send_classified(self, &self.classifier, &retrier, request).await
    }

    /// GET `url` and deserialize the body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send(&ApiRequest::get(url)).await?.json()
    }

    /// Resolve `target` against the base URL; absolute URLs pass through
    fn build_url(&self, target: &str) -> String {
        match &self.config.base_url {
            Some(base) if !target.contains("://") => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                target.trim_start_matches('/')
            ),
            _ => target.to_string(),
        }
    }
}

#[async_trait]
impl RequestExecutor for HttpClient {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let url = self.build_url(&request.url);
        let timeout = request.timeout.unwrap_or(self.config.timeout);

        let mut req = self.client.request(request.method.into(), &url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        req = req.timeout(timeout);

        let response = req.send().await.map_err(|e| transport_error(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        // Reading to the end releases the connection before any retry wait
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        debug!(
            method = %request.method,
            url = %url,
            status,
            bytes = body.len(),
            "response received"
        );

        if status == 429 && self.config.hold_off_on_throttle {
            self.hold_off_from(&headers);
        }

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        Error::Http(e)
    }
}

/// Execute `request` under `retrier`, classifying each response with `classifier`.
///
/// A response is a success only when the classifier finds no failure in
/// its status, headers or payload. Failed attempts are turned into
/// [`Error::Classified`] and handed to the retry policy.
pub async fn send_classified<E>(
    executor: &E,
    classifier: &ErrorClassifier,
    retrier: &Retrier,
    request: &ApiRequest,
) -> Result<RawResponse>
where
    E: RequestExecutor + ?Sized,
{
    retrier
        .run(|attempt| async move {
            let response = executor.execute(request).await?;
            match classifier.inspect(
                response.status,
                &response.headers,
                Some(response.body.as_ref()),
            ) {
                None => Ok(response),
                Some(failure) => {
                    debug!(
                        attempt,
                        url = %request.url,
                        kind = %failure.kind,
                        status = failure.status_code,
                        "request failed"
                    );
                    Err(Error::Classified(failure))
                }
            }
        })
        .await
}
