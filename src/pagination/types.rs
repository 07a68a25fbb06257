//! Pagination types and traits
//!
//! Defines the core pagination abstractions: markers, pages, the fetch
//! context, the page-fetcher capability and the marker strategies that
//! translate between markers and HTTP requests.

use crate::decode::{lookup, lookup_string};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

// ============================================================================
// Marker
// ============================================================================

/// Opaque continuation token round-tripped from one fetch into the next.
///
/// Only the fetcher that produced a marker interprets it. The pagination
/// core compares markers for equality within one iteration (loop guard)
/// and never across fetchers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Cursor or "start after" token
    Cursor(String),
    /// Row or byte offset
    Offset(u64),
    /// Page number
    Page(u32),
    /// Absolute URL of the next page
    Url(String),
}

impl Marker {
    /// Create a cursor marker
    pub fn cursor(token: impl Into<String>) -> Self {
        Self::Cursor(token.into())
    }

    /// Create a URL marker
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cursor(token) => write!(f, "cursor:{token}"),
            Self::Offset(offset) => write!(f, "offset:{offset}"),
            Self::Page(page) => write!(f, "page:{page}"),
            Self::Url(url) => write!(f, "url:{url}"),
        }
    }
}

// ============================================================================
// Page
// ============================================================================

/// One fetched batch of items plus an optional continuation marker.
///
/// A page without a marker is the terminal page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    items: Vec<T>,
    next_marker: Option<Marker>,
}

impl<T> Page<T> {
    /// Create a page
    pub fn new(items: Vec<T>, next_marker: Option<Marker>) -> Self {
        Self { items, next_marker }
    }

    /// Create a terminal page
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Items in provider order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Marker for the following page
    pub fn next_marker(&self) -> Option<&Marker> {
        self.next_marker.as_ref()
    }

    /// Whether this is the terminal page
    pub fn is_last(&self) -> bool {
        self.next_marker.is_none()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Split into items and marker
    pub fn into_parts(self) -> (Vec<T>, Option<Marker>) {
        (self.items, self.next_marker)
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Invariant parameters of one paged query.
///
/// Set once when an iteration is created and shared read-only by every
/// fetch of that iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchContext {
    /// Scope such as a region or zone
    pub scope: Option<String>,
    /// Provider filters passed as query parameters
    pub filters: BTreeMap<String, String>,
    /// Sort order
    pub sort: Option<String>,
    /// Page size hint
    pub page_size: Option<u32>,
}

impl FetchContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add a filter
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Set the sort order
    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set the page size hint
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }
}

// ============================================================================
// Page Fetcher
// ============================================================================

/// Fetches one page of a resource collection.
///
/// Implementations are supplied per collection type. Retry belongs
/// underneath this trait; whatever error a fetch returns is final for the
/// iteration that issued it.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    /// Fetch the page at `marker` (`None` for the first page)
    async fn fetch_page(&self, marker: Option<&Marker>, context: &FetchContext)
        -> Result<Page<T>>;
}

/// [`PageFetcher`] backed by a closure, see [`fetcher_fn`]
pub struct FnFetcher<F, T> {
    f: F,
    _item: PhantomData<fn() -> T>,
}

/// Build a [`PageFetcher`] from a closure.
///
/// The closure receives owned copies of the marker and context so the
/// returned future can be `'static`.
///
/// ```rust,ignore
/// let fetcher = fetcher_fn(|marker, _ctx| async move {
///     match marker {
///         None => Ok(Page::new(vec![1, 2], Some(Marker::cursor("m1")))),
///         Some(_) => Ok(Page::last(vec![3])),
///     }
/// });
/// ```
pub fn fetcher_fn<F, Fut, T>(f: F) -> FnFetcher<F, T>
where
    F: Fn(Option<Marker>, FetchContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send,
{
    FnFetcher {
        f,
        _item: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> PageFetcher<T> for FnFetcher<F, T>
where
    F: Fn(Option<Marker>, FetchContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send,
    T: Send,
{
    async fn fetch_page(
        &self,
        marker: Option<&Marker>,
        context: &FetchContext,
    ) -> Result<Page<T>> {
        (self.f)(marker.cloned(), context.clone()).await
    }
}

// ============================================================================
// Marker Strategies
// ============================================================================

/// Request parameters for fetching one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Query parameters to add/replace
    pub query_params: HashMap<String, String>,
    /// Absolute URL replacing the collection URL (link header / next URL)
    pub url: Option<String>,
}

impl PageRequest {
    /// Request with no extra parameters
    pub fn empty() -> Self {
        Self::default()
    }

    /// Request with a single parameter
    pub fn with_param(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut params = HashMap::new();
        params.insert(key.into(), value.into());
        Self {
            query_params: params,
            url: None,
        }
    }

    /// Request for an absolute URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            query_params: HashMap::new(),
            url: Some(url.into()),
        }
    }

    /// Add a parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }
}

/// Maps markers to requests and responses to markers for one pagination scheme.
///
/// Strategies hold no iteration state: everything needed to request the
/// next page travels in the marker.
pub trait MarkerStrategy: Send + Sync + fmt::Debug {
    /// Parameters for fetching the page at `marker` (`None` for the first page)
    fn request(&self, marker: Option<&Marker>, context: &FetchContext) -> Result<PageRequest>;

    /// Marker of the page after the one just fetched, `None` when it was the last
    fn next_marker(
        &self,
        body: &Value,
        headers: &HeaderMap,
        item_count: usize,
        current: Option<&Marker>,
        context: &FetchContext,
    ) -> Option<Marker>;
}

/// Stop conditions for pagination
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StopCondition {
    /// Stop when page is empty (no records)
    #[default]
    EmptyPage,

    /// Stop when a field has a specific value
    Field {
        /// Path to the field
        path: String,
        /// Value that means "no more pages"
        value: Value,
    },

    /// Stop when the number of items fetched reaches a total count
    TotalCount {
        /// Path to total count field
        path: String,
    },

    /// Stop when page number reaches total pages
    TotalPages {
        /// Path to total pages field
        path: String,
    },
}

impl StopCondition {
    /// Create a field-based stop condition
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Create a total count stop condition
    pub fn total_count(path: impl Into<String>) -> Self {
        Self::TotalCount { path: path.into() }
    }

    /// Create a total pages stop condition
    pub fn total_pages(path: impl Into<String>) -> Self {
        Self::TotalPages { path: path.into() }
    }
}

/// Result of checking a stop condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// Continue pagination
    Continue,
    /// Stop pagination
    Stop,
}

impl StopResult {
    /// Check if we should stop
    pub fn should_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// How far an iteration has progressed, as far as the marker can tell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Items fetched so far including the current page
    pub fetched: Option<u64>,
    /// Number of the current page
    pub page: Option<u32>,
}

/// Check a stop condition against a response
pub fn check_stop_condition(
    condition: &StopCondition,
    body: &Value,
    item_count: usize,
    progress: Progress,
) -> StopResult {
    let stop = match condition {
        StopCondition::EmptyPage => item_count == 0,
        StopCondition::Field { path, value } => {
            lookup(body, path).is_some_and(|v| v == value)
        }
        StopCondition::TotalCount { path } => {
            match (
                lookup_string(body, path).and_then(|s| s.parse::<u64>().ok()),
                progress.fetched,
            ) {
                (Some(total), Some(fetched)) => fetched >= total,
                _ => item_count == 0,
            }
        }
        StopCondition::TotalPages { path } => {
            match (
                lookup_string(body, path).and_then(|s| s.parse::<u32>().ok()),
                progress.page,
            ) {
                (Some(total), Some(page)) => page >= total,
                _ => item_count == 0,
            }
        }
    };

    if stop {
        StopResult::Stop
    } else {
        StopResult::Continue
    }
}
