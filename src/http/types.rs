//! HTTP request and response types

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::types::Method;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Request
// ============================================================================

/// One logical API call, replayed as-is on every attempt
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL, or a path joined onto the client's base URL
    pub url: String,
    /// Query parameters in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Override retry policy for this request
    pub retry: Option<RetryPolicy>,
}

impl ApiRequest {
    /// Create a request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry policy for this call only
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

// ============================================================================
// Response
// ============================================================================

/// A fully drained HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Complete body
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; an empty body is `null`
    pub fn json_value(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserialize the body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Performs one HTTP attempt.
///
/// Implementations must read the body to the end before returning so no
/// connection is held across a retry wait. Application-level retry is
/// layered on top by [`send_classified`](super::send_classified).
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Send the request once and drain the response
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse>;
}
