//! Loader types
//!
//! Declarative provider definition types for YAML parsing.

use crate::classify::FailureKind;
use crate::types::{BackoffType, Method};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Provider Definition
// ============================================================================

/// Top-level provider definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderDefinition {
    /// Provider name
    pub name: String,
    /// Provider definition version
    #[serde(default = "default_version")]
    pub version: String,
    /// Endpoint every collection path is relative to
    pub base_url: String,
    /// Scopes (regions, zones) listed when the caller names none
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Transport settings
    #[serde(default)]
    pub http: HttpDefinition,
    /// Retry configuration
    #[serde(default)]
    pub retry: RetryDefinition,
    /// Error classification configuration
    #[serde(default)]
    pub errors: ErrorsDefinition,
    /// Collection definitions
    pub collections: Vec<CollectionDefinition>,
    /// Global headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ProviderDefinition {
    /// Find a collection by name
    pub fn collection(&self, name: &str) -> Option<&CollectionDefinition> {
        self.collections.iter().find(|c| c.name == name)
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// Transport section of a provider file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Per-attempt timeout, seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Client-side pacing in requests per second; unpaced when absent
    #[serde(default)]
    pub rate_limit_rps: Option<u32>,
    /// Rate limit burst, defaults to the rate
    #[serde(default)]
    pub rate_limit_burst: Option<u32>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Pause the shared limiter for a 429's `Retry-After`
    #[serde(default)]
    pub hold_off_on_throttle: bool,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            rate_limit_rps: None,
            rate_limit_burst: None,
            user_agent: None,
            hold_off_on_throttle: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// Retry Definition
// ============================================================================

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryDefinition {
    /// Attempts allowed in total, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Time budget in seconds
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_secs: u64,
    /// Backoff growth
    #[serde(default)]
    pub backoff: BackoffType,
    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Largest backoff delay in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Retry 409 Conflict responses
    #[serde(default)]
    pub retry_on_conflict: bool,
}

impl Default for RetryDefinition {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_elapsed_secs: default_max_elapsed(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            retry_on_conflict: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_elapsed() -> u64 {
    300
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    60_000
}

// ============================================================================
// Errors Definition
// ============================================================================

/// Error classification configuration
///
/// Empty lists keep the classifier's built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorsDefinition {
    /// Paths to the error message in error bodies
    #[serde(default)]
    pub message_paths: Vec<String>,
    /// Paths to the error code in error bodies
    #[serde(default)]
    pub code_paths: Vec<String>,
    /// Extra headers whose value 0 marks an exhausted rate limit
    #[serde(default)]
    pub rate_limit_remaining_headers: Vec<String>,
    /// Extra headers carrying the rate limit reset time
    #[serde(default)]
    pub rate_limit_reset_headers: Vec<String>,
    /// Refinement rules, first match wins
    #[serde(default)]
    pub rules: Vec<RefinementRuleDefinition>,
    /// Rules flagging failures embedded in 2xx payloads
    #[serde(default)]
    pub payload_failures: Vec<PayloadFailureDefinition>,
}

/// One refinement rule; exactly one matcher must be set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RefinementRuleDefinition {
    /// Kind assigned on match
    pub kind: FailureKind,
    /// Case-insensitive substring of the error message
    #[serde(default)]
    pub message_contains: Option<String>,
    /// Exact provider error code
    #[serde(default)]
    pub error_code: Option<String>,
    /// Regex over the error message
    #[serde(default)]
    pub pattern: Option<String>,
    /// Only apply to these statuses (all when empty)
    #[serde(default)]
    pub statuses: Vec<u16>,
}

/// One payload failure rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PayloadFailureDefinition {
    /// Path into the success body
    pub path: String,
    /// Value that signals failure; any non-null value when absent
    #[serde(default)]
    pub equals: Option<serde_json::Value>,
    /// Kind assigned on match
    #[serde(default = "default_payload_kind")]
    pub kind: FailureKind,
}

fn default_payload_kind() -> FailureKind {
    FailureKind::ServerFault
}

// ============================================================================
// Collection Definition
// ============================================================================

/// A listable resource collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CollectionDefinition {
    /// Collection name
    pub name: String,
    /// URL path, may contain a `{scope}` placeholder
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Path to the records in the response body
    #[serde(default)]
    pub records_path: Option<String>,
    /// Static query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Collection-specific headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Query parameter carrying the sort order
    #[serde(default)]
    pub sort_param: Option<String>,
    /// Query parameter carrying the scope, for providers that take it as a parameter
    #[serde(default)]
    pub scope_param: Option<String>,
    /// How the collection is paged
    #[serde(default)]
    pub pagination: PaginationDefinition,
}

// ============================================================================
// Pagination Definition
// ============================================================================

/// Pagination scheme of one collection, tagged by `type`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationDefinition {
    /// No pagination
    #[default]
    None,
    /// `?offset=&limit=` style
    Offset {
        /// Name of the offset parameter
        offset_param: String,
        /// Name of the limit parameter
        limit_param: String,
        /// Page size
        limit: u32,
        /// Stop condition
        #[serde(default)]
        stop: StopConditionDefinition,
    },
    /// `?page=` style
    PageNumber {
        /// Name of the page parameter
        page_param: String,
        /// Number of the first page
        #[serde(default = "default_start_page")]
        start_page: u32,
        /// Name of the page size parameter, if sent
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size
        #[serde(default)]
        page_size: Option<u32>,
        /// Stop condition
        #[serde(default)]
        stop: StopConditionDefinition,
    },
    /// Continuation token read from the body or a header
    Cursor {
        /// Parameter the token is sent back in
        cursor_param: String,
        /// Path to next cursor in response body
        #[serde(default)]
        cursor_path: Option<String>,
        /// Response header carrying the next cursor
        #[serde(default)]
        cursor_header: Option<String>,
        /// Stop condition checked before reading the cursor
        #[serde(default)]
        stop: Option<StopConditionDefinition>,
    },
    /// RFC 8288 `Link` header
    LinkHeader {
        /// Link relation to follow
        #[serde(default = "default_link_rel")]
        rel: String,
    },
    /// Next URL in the response body
    NextUrl {
        /// Path to next URL
        next_url_path: String,
    },
}

fn default_start_page() -> u32 {
    1
}

fn default_link_rel() -> String {
    "next".to_string()
}

/// When a walk ends early, tagged by `type`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopConditionDefinition {
    /// The page had no items
    #[default]
    EmptyPage,
    /// Items fetched reached the total at `path`
    TotalCount {
        /// Path to total count
        path: String,
    },
    /// Page count reached the total at `path`
    TotalPages {
        /// Path to total pages
        path: String,
    },
    /// The value at `path` equals `value`
    Field {
        /// Path to field
        path: String,
        /// Value to match
        value: serde_json::Value,
    },
}
