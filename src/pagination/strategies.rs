//! Marker strategies for the pagination schemes cloud APIs use
//!
//! Strategies are stateless: the position of a walk lives entirely in the
//! [`Marker`] handed back from `next_marker`, so one strategy serves any
//! number of concurrent walks.

use super::types::{
    check_stop_condition, FetchContext, Marker, MarkerStrategy, PageRequest, Progress,
    StopCondition,
};
use crate::decode::lookup_string;
use crate::error::{Error, Result};
use reqwest::header::HeaderMap;
use serde_json::Value;

fn unexpected_marker(strategy: &str, marker: &Marker) -> Error {
    Error::pagination(format!("{strategy} pagination cannot resume from {marker}"))
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Where a cursor strategy reads the next token from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorSource {
    /// Path into the response body
    Body(String),
    /// Response header name
    Header(String),
}

/// Opaque continuation token echoed back as a query parameter.
///
/// Covers `?marker=<last id>` listings as well as `?pageToken=...` and
/// `?NextToken=...` styles. An absent or empty token ends the walk.
#[derive(Debug, Clone)]
pub struct CursorStrategy {
    /// Parameter carrying the token on the next request
    pub cursor_param: String,
    /// Where to read the next cursor
    pub source: CursorSource,
    /// Extra end-of-walk check run before the token is read
    pub stop_condition: Option<StopCondition>,
}

impl CursorStrategy {
    /// Read the next cursor from a body path
    pub fn new(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            source: CursorSource::Body(cursor_path.into()),
            stop_condition: None,
        }
    }

    /// Read the next cursor from a response header
    pub fn from_header(cursor_param: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            source: CursorSource::Header(header.into()),
            stop_condition: None,
        }
    }

    /// End the walk when `condition` holds, whatever the token says
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = Some(condition);
        self
    }
}

impl MarkerStrategy for CursorStrategy {
    fn request(&self, marker: Option<&Marker>, _context: &FetchContext) -> Result<PageRequest> {
        match marker {
            None => Ok(PageRequest::empty()),
            Some(Marker::Cursor(token)) => Ok(PageRequest::with_param(&self.cursor_param, token)),
            Some(other) => Err(unexpected_marker("cursor", other)),
        }
    }

    fn next_marker(
        &self,
        body: &Value,
        headers: &HeaderMap,
        item_count: usize,
        _current: Option<&Marker>,
        _context: &FetchContext,
    ) -> Option<Marker> {
        if let Some(condition) = &self.stop_condition {
            if check_stop_condition(condition, body, item_count, Progress::default()).should_stop()
            {
                return None;
            }
        }

        let token = match &self.source {
            CursorSource::Body(path) => lookup_string(body, path),
            CursorSource::Header(name) => headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }?;

        if token.is_empty() {
            None
        } else {
            Some(Marker::Cursor(token))
        }
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Record offset plus page limit (`?offset=100&limit=50`, `?skip=&take=`).
///
/// The marker holds the offset of the next record. A page shorter than
/// the limit is the last one.
#[derive(Debug, Clone)]
pub struct OffsetStrategy {
    /// Parameter carrying the offset
    pub offset_param: String,
    /// Parameter carrying the limit
    pub limit_param: String,
    /// Records per page when the context gives no page size
    pub limit_value: u32,
    /// When to end the walk early
    pub stop_condition: StopCondition,
}

impl OffsetStrategy {
    /// Strategy starting at offset zero
    pub fn new(
        offset_param: impl Into<String>,
        limit_param: impl Into<String>,
        limit_value: u32,
    ) -> Self {
        Self {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
            limit_value,
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Replace the default empty-page check
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = condition;
        self
    }

    fn limit(&self, context: &FetchContext) -> u32 {
        context.page_size.unwrap_or(self.limit_value).max(1)
    }

    fn offset_of(marker: Option<&Marker>) -> Result<u64> {
        match marker {
            None => Ok(0),
            Some(Marker::Offset(offset)) => Ok(*offset),
            Some(other) => Err(unexpected_marker("offset", other)),
        }
    }
}

impl MarkerStrategy for OffsetStrategy {
    fn request(&self, marker: Option<&Marker>, context: &FetchContext) -> Result<PageRequest> {
        let offset = Self::offset_of(marker)?;
        Ok(PageRequest::with_param(&self.offset_param, offset.to_string())
            .param(&self.limit_param, self.limit(context).to_string()))
    }

    fn next_marker(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        item_count: usize,
        current: Option<&Marker>,
        context: &FetchContext,
    ) -> Option<Marker> {
        let offset = Self::offset_of(current).ok()?;
        let fetched = offset.checked_add(u64::try_from(item_count).ok()?)?;
        let progress = Progress {
            fetched: Some(fetched),
            page: None,
        };

        if check_stop_condition(&self.stop_condition, body, item_count, progress).should_stop() {
            return None;
        }

        // A short page is the last one
        if item_count < self.limit(context) as usize {
            return None;
        }

        Some(Marker::Offset(fetched))
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Numbered pages (`?page=2&per_page=50`).
///
/// The marker is the number of the page to request next.
#[derive(Debug, Clone)]
pub struct PageNumberStrategy {
    /// Parameter carrying the page number
    pub page_param: String,
    /// Number of the first page, 0 or 1 for most providers
    pub start_page: u32,
    /// Parameter carrying the page size, if the provider takes one
    pub page_size_param: Option<String>,
    /// Page size when the context gives none
    pub page_size: Option<u32>,
    /// When to end the walk early
    pub stop_condition: StopCondition,
}

impl PageNumberStrategy {
    /// Strategy starting at `start_page` with no size parameter
    pub fn new(page_param: impl Into<String>, start_page: u32) -> Self {
        Self {
            page_param: page_param.into(),
            start_page,
            page_size_param: None,
            page_size: None,
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Send `size` in `param` on every request
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u32) -> Self {
        self.page_size_param = Some(param.into());
        self.page_size = Some(size);
        self
    }

    /// Replace the default empty-page check
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = condition;
        self
    }

    fn size(&self, context: &FetchContext) -> Option<u32> {
        context.page_size.or(self.page_size)
    }

    fn page_of(&self, marker: Option<&Marker>) -> Result<u32> {
        match marker {
            None => Ok(self.start_page),
            Some(Marker::Page(page)) => Ok(*page),
            Some(other) => Err(unexpected_marker("page number", other)),
        }
    }
}

impl MarkerStrategy for PageNumberStrategy {
    fn request(&self, marker: Option<&Marker>, context: &FetchContext) -> Result<PageRequest> {
        let mut request =
            PageRequest::with_param(&self.page_param, self.page_of(marker)?.to_string());
        if let (Some(param), Some(size)) = (&self.page_size_param, self.size(context)) {
            request = request.param(param, size.to_string());
        }
        Ok(request)
    }

    fn next_marker(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        item_count: usize,
        current: Option<&Marker>,
        context: &FetchContext,
    ) -> Option<Marker> {
        let page = self.page_of(current).ok()?;
        let size = self.size(context);
        // Pages counted from 1 regardless of the provider's start page
        let before = page.saturating_sub(self.start_page);
        let ordinal = before.saturating_add(1);
        let progress = Progress {
            fetched: size.map(|s| {
                (u64::from(before) * u64::from(s)).saturating_add(item_count as u64)
            }),
            page: Some(ordinal),
        };

        if check_stop_condition(&self.stop_condition, body, item_count, progress).should_stop() {
            return None;
        }

        if let Some(size) = size {
            if item_count < size as usize {
                return None;
            }
        }

        page.checked_add(1).map(Marker::Page)
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Follows the RFC 8288 `Link` header, e.g.
/// `Link: <https://api.example.com/v1/disks?page=2>; rel="next"`.
///
/// The linked URL is requested as-is.
#[derive(Debug, Clone)]
pub struct LinkHeaderStrategy {
    /// Relation to follow, `next` by default
    pub rel: String,
}

impl Default for LinkHeaderStrategy {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderStrategy {
    /// Follow links with relation `rel`
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }
}

impl MarkerStrategy for LinkHeaderStrategy {
    fn request(&self, marker: Option<&Marker>, _context: &FetchContext) -> Result<PageRequest> {
        match marker {
            None => Ok(PageRequest::empty()),
            Some(Marker::Url(url)) => Ok(PageRequest::with_url(url)),
            Some(other) => Err(unexpected_marker("link header", other)),
        }
    }

    fn next_marker(
        &self,
        _body: &Value,
        headers: &HeaderMap,
        _item_count: usize,
        _current: Option<&Marker>,
        _context: &FetchContext,
    ) -> Option<Marker> {
        let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
        parse_link_header(link, &self.rel).map(Marker::Url)
    }
}

/// URL of the first link in `header` whose relations include `target_rel`
pub(crate) fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut params = link.split(';').map(str::trim);
        let url = params.next()?.strip_prefix('<')?.strip_suffix('>')?;
        let rels = params.find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim() == "rel").then(|| value.trim().trim_matches(|c: char| c == '"' || c == '\''))
        })?;
        rels.split_whitespace()
            .any(|rel| rel == target_rel)
            .then(|| url.to_string())
    })
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Absolute next-page URL carried in the body, such as
/// `{"links": {"next": "https://..."}}`.
#[derive(Debug, Clone)]
pub struct NextUrlStrategy {
    /// Body path of the URL
    pub path: String,
}

impl NextUrlStrategy {
    /// Read the next URL at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl MarkerStrategy for NextUrlStrategy {
    fn request(&self, marker: Option<&Marker>, _context: &FetchContext) -> Result<PageRequest> {
        match marker {
            None => Ok(PageRequest::empty()),
            Some(Marker::Url(url)) => Ok(PageRequest::with_url(url)),
            Some(other) => Err(unexpected_marker("next URL", other)),
        }
    }

    fn next_marker(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        _item_count: usize,
        _current: Option<&Marker>,
        _context: &FetchContext,
    ) -> Option<Marker> {
        lookup_string(body, &self.path)
            .filter(|url| !url.is_empty())
            .map(Marker::Url)
    }
}

// ============================================================================
// Single Page
// ============================================================================

/// Collections answered in one response
#[derive(Debug, Clone, Default)]
pub struct SinglePage;

impl MarkerStrategy for SinglePage {
    fn request(&self, _marker: Option<&Marker>, _context: &FetchContext) -> Result<PageRequest> {
        Ok(PageRequest::empty())
    }

    fn next_marker(
        &self,
        _body: &Value,
        _headers: &HeaderMap,
        _item_count: usize,
        _current: Option<&Marker>,
        _context: &FetchContext,
    ) -> Option<Marker> {
        None
    }
}
