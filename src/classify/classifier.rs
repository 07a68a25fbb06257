//! Status-code-first error classifier with pluggable refinement
//!
//! One generic classifier replaces per-provider error handlers. Provider
//! quirks are expressed as data: refinement rules keyed on message
//! substrings, error codes or regexes, and payload rules that flag 2xx
//! responses carrying an embedded failure.

use super::types::{ClassifiedFailure, FailureKind};
use crate::decode::{lookup, lookup_string};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Values at or above this are treated as epoch seconds rather than a delta
const EPOCH_THRESHOLD: u64 = 1_000_000_000;

/// Ceiling on server-supplied retry delays
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest raw body kept as a failure message
const MAX_MESSAGE_LEN: usize = 512;

static XML_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Message>(.*?)</Message>").expect("valid regex"));

static XML_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Code>(.*?)</Code>").expect("valid regex"));

// ============================================================================
// Refinement Rules
// ============================================================================

/// What a refinement rule looks for in a parsed error body
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring of the error message
    MessageContains(String),
    /// Exact provider error code
    ErrorCode(String),
    /// Regex over the error message
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, message: &str, code: Option<&str>) -> bool {
        match self {
            Self::MessageContains(needle) => message
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Self::ErrorCode(expected) => code.is_some_and(|c| c == expected),
            Self::Pattern(re) => re.is_match(message),
        }
    }
}

/// Overrides the status-derived kind when a body matches
#[derive(Debug, Clone)]
pub struct RefinementRule {
    /// Body matcher
    pub matcher: Matcher,
    /// Kind to classify as on match
    pub kind: FailureKind,
    /// Restrict the rule to these status codes (empty = any status)
    pub statuses: Vec<u16>,
}

impl RefinementRule {
    /// Match a substring of the error message
    pub fn message_contains(needle: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            matcher: Matcher::MessageContains(needle.into()),
            kind,
            statuses: Vec::new(),
        }
    }

    /// Match a provider error code
    pub fn error_code(code: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            matcher: Matcher::ErrorCode(code.into()),
            kind,
            statuses: Vec::new(),
        }
    }

    /// Match a regex over the error message
    pub fn pattern(pattern: &str, kind: FailureKind) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::invalid_value("pattern", format!("{pattern}: {e}")))?;
        Ok(Self {
            matcher: Matcher::Pattern(re),
            kind,
            statuses: Vec::new(),
        })
    }

    /// Only apply the rule to the given status codes
    #[must_use]
    pub fn for_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    fn applies(&self, status: u16, message: &str, code: Option<&str>) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&status))
            && self.matcher.matches(message, code)
    }
}

// ============================================================================
// Payload Failure Rules
// ============================================================================

/// Check against a 2xx JSON payload
#[derive(Debug, Clone)]
pub enum PayloadCheck {
    /// Field at `path` equals `value`
    Equals {
        /// Dotted path to the field
        path: String,
        /// Value that signals failure
        value: Value,
    },
    /// Field at `path` is present and not null
    Present {
        /// Dotted path to the field
        path: String,
    },
}

/// Flags a success response whose payload reports a failure
#[derive(Debug, Clone)]
pub struct PayloadFailureRule {
    /// What to look for
    pub check: PayloadCheck,
    /// Kind to classify as on match
    pub kind: FailureKind,
}

impl PayloadFailureRule {
    /// Failure when the field at `path` equals `value`
    pub fn field_equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            check: PayloadCheck::Equals {
                path: path.into(),
                value: value.into(),
            },
            kind: FailureKind::ServerFault,
        }
    }

    /// Failure when the field at `path` is present
    pub fn field_present(path: impl Into<String>) -> Self {
        Self {
            check: PayloadCheck::Present { path: path.into() },
            kind: FailureKind::ServerFault,
        }
    }

    /// Classify matches as `kind` instead of `ServerFault`
    #[must_use]
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    fn matches(&self, body: &Value) -> bool {
        match &self.check {
            PayloadCheck::Equals { path, value } => {
                lookup(body, path).is_some_and(|v| v == value)
            }
            PayloadCheck::Present { path } => {
                lookup(body, path).is_some_and(|v| !v.is_null())
            }
        }
    }
}

// ============================================================================
// Error Details
// ============================================================================

/// Best-effort parse of an error body
#[derive(Debug, Default)]
struct ErrorDetails {
    json: Option<Value>,
    message: Option<String>,
    code: Option<String>,
    text: String,
}

impl ErrorDetails {
    fn parse(body: Option<&[u8]>, message_paths: &[String], code_paths: &[String]) -> Self {
        let Some(bytes) = body.filter(|b| !b.is_empty()) else {
            return Self::default();
        };

        let text = String::from_utf8_lossy(bytes).trim().to_string();

        if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
            let message = message_paths
                .iter()
                .find_map(|p| lookup_string(&json, p));
            let code = code_paths.iter().find_map(|p| lookup_string(&json, p));
            return Self {
                json: Some(json),
                message,
                code,
                text,
            };
        }

        let message = XML_MESSAGE
            .captures(&text)
            .map(|c| c[1].trim().to_string());
        let code = XML_CODE.captures(&text).map(|c| c[1].trim().to_string());
        Self {
            json: None,
            message,
            code,
            text,
        }
    }

    fn message(&self, status: u16) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        if !self.text.is_empty() {
            return truncate(&self.text, MAX_MESSAGE_LEN);
        }
        StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map_or_else(|| format!("HTTP {status}"), ToString::to_string)
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Classifies failed responses into [`ClassifiedFailure`]s
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<RefinementRule>,
    payload_rules: Vec<PayloadFailureRule>,
    message_paths: Vec<String>,
    code_paths: Vec<String>,
    remaining_headers: Vec<String>,
    reset_headers: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            payload_rules: Vec::new(),
            message_paths: [
                "message",
                "error.message",
                "error_description",
                "error",
                "errors[0].message",
                "fault.message",
                "Message",
            ]
            .map(String::from)
            .to_vec(),
            code_paths: ["code", "error.code", "errorCode", "errors[0].code", "Code"]
                .map(String::from)
                .to_vec(),
            remaining_headers: ["x-ratelimit-remaining", "x-rate-limit-remaining"]
                .map(String::from)
                .to_vec(),
            reset_headers: ["x-ratelimit-reset", "x-rate-limit-reset"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl ErrorClassifier {
    /// Create a classifier with no provider-specific rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder starting from the defaults
    pub fn builder() -> ErrorClassifierBuilder {
        ErrorClassifierBuilder::default()
    }

    /// Refinement rules, in evaluation order
    pub fn rules(&self) -> &[RefinementRule] {
        &self.rules
    }

    /// Classify a completed response as a failure.
    ///
    /// For a 2xx status this only yields a meaningful kind when a payload
    /// rule matches; otherwise the result is `Unrecognized`. Use
    /// [`ErrorClassifier::inspect`] when the response may be a success.
    pub fn classify(
        &self,
        status: u16,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> ClassifiedFailure {
        self.classify_at(Utc::now(), status, headers, body)
    }

    /// [`ErrorClassifier::classify`] against a fixed clock.
    ///
    /// Absolute times (an HTTP-date `Retry-After`, epoch reset headers) are
    /// turned into delays relative to `now`, so equal inputs always give
    /// equal failures.
    pub fn classify_at(
        &self,
        now: DateTime<Utc>,
        status: u16,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> ClassifiedFailure {
        let details = ErrorDetails::parse(body, &self.message_paths, &self.code_paths);

        let (kind, status) = if is_success(status) {
            match self.payload_failure(details.json.as_ref()) {
                Some(kind) => (kind, kind.synthetic_status()),
                None => (FailureKind::Unrecognized, status),
            }
        } else {
            (self.kind_for_status(status, headers), status)
        };

        self.finish(now, kind, status, headers, &details)
    }

    /// Inspect a completed response: `None` on success, the failure otherwise.
    ///
    /// Success is decided by the payload as well as the status, so a 2xx
    /// whose body matches a payload rule is reported as a failure.
    pub fn inspect(
        &self,
        status: u16,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Option<ClassifiedFailure> {
        self.inspect_at(Utc::now(), status, headers, body)
    }

    /// [`ErrorClassifier::inspect`] against a fixed clock
    pub fn inspect_at(
        &self,
        now: DateTime<Utc>,
        status: u16,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Option<ClassifiedFailure> {
        if !is_success(status) {
            return Some(self.classify_at(now, status, headers, body));
        }
        if self.payload_rules.is_empty() {
            return None;
        }
        let json = body.and_then(|b| serde_json::from_slice::<Value>(b).ok())?;
        if self.payload_failure(Some(&json)).is_none() {
            return None;
        }
        debug!(status, "success response carries an embedded failure");
        Some(self.classify_at(now, status, headers, body))
    }

    fn kind_for_status(&self, status: u16, headers: &HeaderMap) -> FailureKind {
        match status {
            401 | 403 => FailureKind::Unauthorized,
            404 => FailureKind::NotFound,
            409 => FailureKind::Conflict,
            429 => FailureKind::RateLimited,
            400..=499 if self.rate_limit_exhausted(headers) => FailureKind::RateLimited,
            500..=599 => FailureKind::ServerFault,
            _ => FailureKind::Unrecognized,
        }
    }

    fn payload_failure(&self, body: Option<&Value>) -> Option<FailureKind> {
        let body = body?;
        self.payload_rules
            .iter()
            .find(|rule| rule.matches(body))
            .map(|rule| rule.kind)
    }

    fn finish(
        &self,
        now: DateTime<Utc>,
        kind: FailureKind,
        status: u16,
        headers: &HeaderMap,
        details: &ErrorDetails,
    ) -> ClassifiedFailure {
        let message = details.message(status);

        let kind = self
            .rules
            .iter()
            .find(|rule| rule.applies(status, &message, details.code.as_deref()))
            .map_or(kind, |rule| rule.kind);

        let mut failure = ClassifiedFailure::new(kind, status, message);
        if let Some(code) = &details.code {
            failure = failure.with_error_code(code.clone());
        }
        if let Some(delay) = self.retry_after(now, headers) {
            failure = failure.with_retry_after(delay);
        }
        failure
    }

    fn rate_limit_exhausted(&self, headers: &HeaderMap) -> bool {
        self.remaining_headers.iter().any(|name| {
            header_str(headers, name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .is_some_and(|remaining| remaining == 0)
        })
    }

    /// Server's retry delay: `Retry-After` (delta seconds or HTTP date),
    /// then the vendor reset headers (delta seconds, or epoch seconds for
    /// large values). Capped at [`MAX_RETRY_AFTER`].
    pub fn retry_after(&self, now: DateTime<Utc>, headers: &HeaderMap) -> Option<Duration> {
        let now_secs = u64::try_from(now.timestamp()).unwrap_or(0);

        let delay = header_str(headers, "retry-after")
            .map(str::trim)
            .and_then(|value| {
                if let Ok(secs) = value.parse::<u64>() {
                    return Some(Duration::from_secs(secs));
                }
                let date = DateTime::parse_from_rfc2822(value).ok()?;
                Some((date.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
            })
            .or_else(|| {
                self.reset_headers.iter().find_map(|name| {
                    let value = header_str(headers, name)?.trim().parse::<u64>().ok()?;
                    let secs = if value >= EPOCH_THRESHOLD {
                        value.saturating_sub(now_secs)
                    } else {
                        value
                    };
                    Some(Duration::from_secs(secs))
                })
            })?;

        Some(delay.min(MAX_RETRY_AFTER))
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ErrorClassifier`]
#[derive(Default)]
pub struct ErrorClassifierBuilder {
    classifier: ErrorClassifier,
}

impl ErrorClassifierBuilder {
    /// Add a refinement rule (evaluated in insertion order, first match wins)
    #[must_use]
    pub fn rule(mut self, rule: RefinementRule) -> Self {
        self.classifier.rules.push(rule);
        self
    }

    /// Add a payload failure rule
    #[must_use]
    pub fn payload_rule(mut self, rule: PayloadFailureRule) -> Self {
        self.classifier.payload_rules.push(rule);
        self
    }

    /// Replace the body paths searched for an error message
    #[must_use]
    pub fn message_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.classifier.message_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the body paths searched for an error code
    #[must_use]
    pub fn code_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.classifier.code_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Add a header reporting remaining requests (`0` means rate limited)
    #[must_use]
    pub fn remaining_header(mut self, name: impl Into<String>) -> Self {
        self.classifier
            .remaining_headers
            .push(name.into().to_lowercase());
        self
    }

    /// Add a header reporting when the rate limit resets
    #[must_use]
    pub fn reset_header(mut self, name: impl Into<String>) -> Self {
        self.classifier.reset_headers.push(name.into().to_lowercase());
        self
    }

    /// Build the classifier
    pub fn build(self) -> ErrorClassifier {
        self.classifier
    }
}
