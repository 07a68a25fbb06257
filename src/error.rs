//! Error types for nimbus
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use crate::classify::{ClassifiedFailure, FailureKind};
use thiserror::Error;

/// The main error type for nimbus
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Classification / Retry Errors
    // ============================================================================
    #[error("{0}")]
    Classified(ClassifiedFailure),

    #[error("Giving up after {attempts} attempts: {failure}")]
    RetriesExhausted {
        attempts: u32,
        failure: ClassifiedFailure,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Pagination error: {message}")]
    Pagination { message: String },

    #[error("Collection '{collection}' not found")]
    CollectionNotFound { collection: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl From<ClassifiedFailure> for Error {
    fn from(failure: ClassifiedFailure) -> Self {
        Self::Classified(failure)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a pagination error
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination {
            message: message.into(),
        }
    }

    /// The classified failure carried by this error, if any
    pub fn failure(&self) -> Option<&ClassifiedFailure> {
        match self {
            Error::Classified(failure) | Error::RetriesExhausted { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// HTTP status code of the failure behind this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => self.failure().map(|f| f.status_code),
        }
    }

    /// Check if this error is a classified NotFound
    pub fn is_not_found(&self) -> bool {
        self.failure()
            .is_some_and(|f| f.kind == FailureKind::NotFound)
    }

    /// Check if this error is retryable
    ///
    /// Exhausted retries and cancellation are final even though the
    /// underlying failure kind may have been transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Timeout { .. } => true,
            Error::Classified(failure) => failure.kind.is_transient(),
            _ => false,
        }
    }

    /// Convert into the failure the retry loop reasons about.
    ///
    /// Transport-level timeouts and connect errors become a network
    /// `ServerFault` with status 0. Anything else is not subject to retry.
    pub(crate) fn to_retry_failure(&self) -> Option<ClassifiedFailure> {
        match self {
            Error::Classified(failure) => Some(failure.clone()),
            Error::Http(e) if e.is_timeout() || e.is_connect() => {
                Some(ClassifiedFailure::network(e.to_string()))
            }
            Error::Timeout { timeout_ms } => Some(ClassifiedFailure::network(format!(
                "request timeout after {timeout_ms}ms"
            ))),
            _ => None,
        }
    }
}

/// Result type alias for nimbus
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

/// Treat a classified NotFound as an empty result.
///
/// Useful for lookups and deletes where a missing resource is not an error
/// to the caller, e.g. deleting a server that is already gone.
pub trait NotFoundExt<T> {
    /// Map a NotFound failure to `Ok(None)`, leaving other errors untouched
    fn or_not_found(self) -> Result<Option<T>>;
}

impl<T> NotFoundExt<T> for Result<T> {
    fn or_not_found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
