//! Classification types
//!
//! Defines the failure taxonomy shared by the classifier and retry policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 401/403: credentials missing, invalid or lacking permission
    Unauthorized,
    /// 404: the resource does not exist
    NotFound,
    /// 409: the request conflicts with current resource state
    Conflict,
    /// 429 or a provider rate-limit signal
    RateLimited,
    /// 5xx, transport failures, or failures embedded in a 2xx payload
    ServerFault,
    /// Any other failure
    Unrecognized,
}

impl FailureKind {
    /// Whether this kind is assumed to clear up on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerFault)
    }

    /// Status code used when a failure has to be synthesized for this kind
    pub fn synthetic_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            Self::ServerFault | Self::Unrecognized => 500,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthorized => "Unauthorized",
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::RateLimited => "RateLimited",
            Self::ServerFault => "ServerFault",
            Self::Unrecognized => "Unrecognized",
        };
        f.write_str(name)
    }
}

/// A normalized failure derived from one failed attempt.
///
/// Built fresh per attempt and never reused across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    /// Failure kind
    pub kind: FailureKind,
    /// Server-provided hint for when to try again
    pub retry_after: Option<Duration>,
    /// Provider error message, or the raw body when no message was found
    pub raw_message: String,
    /// HTTP status code (synthesized for payload failures, 0 for transport)
    pub status_code: u16,
    /// Provider error code, when the body carried one
    pub error_code: Option<String>,
}

impl ClassifiedFailure {
    /// Create a new failure
    pub fn new(kind: FailureKind, status_code: u16, raw_message: impl Into<String>) -> Self {
        Self {
            kind,
            retry_after: None,
            raw_message: raw_message.into(),
            status_code,
            error_code: None,
        }
    }

    /// A network-level failure (timeout, refused connection) with no response
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerFault, 0, message)
    }

    /// Set the retry-after hint
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Set the provider error code
    #[must_use]
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Whether there was no HTTP response behind this failure
    pub fn is_network(&self) -> bool {
        self.status_code == 0
    }
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_network() {
            write!(f, "{} (network): {}", self.kind, self.raw_message)
        } else {
            write!(
                f,
                "{} (HTTP {}): {}",
                self.kind, self.status_code, self.raw_message
            )
        }
    }
}
