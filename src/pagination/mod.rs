//! Pagination module
//!
//! Lazily walks marker-chained collections.
//!
//! # Overview
//!
//! A [`PageFetcher`] fetches one [`Page`] given an optional [`Marker`] and a
//! fixed [`FetchContext`]. [`PagedIterable`] drives the fetcher as the
//! consumer pulls, following markers until a page carries none.
//! [`ConcatIterable`] drains several iterables in order, which is how a
//! per-region fan-out is flattened into one sequence.
//!
//! HTTP-backed fetchers describe their provider's scheme with a
//! [`MarkerStrategy`]: cursor, offset, page number, link header, next URL.

mod iterable;
mod strategies;
mod types;

pub use iterable::{concat, ConcatIterable, ItemStream, PageStream, PagedIterable};
pub use strategies::{
    CursorSource, CursorStrategy, LinkHeaderStrategy, NextUrlStrategy, OffsetStrategy,
    PageNumberStrategy, SinglePage,
};
pub use types::{
    check_stop_condition, fetcher_fn, FetchContext, FnFetcher, Marker, MarkerStrategy, Page,
    PageFetcher, PageRequest, Progress, StopCondition, StopResult,
};
