//! Lazy paged sequences
//!
//! [`PagedIterable`] walks a marker chain by calling its [`PageFetcher`]
//! one page at a time as the consumer pulls. [`ConcatIterable`] drains
//! several of them back to back, e.g. one per region.

use super::types::{FetchContext, Marker, Page, PageFetcher};
use crate::error::Result;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stream of pages, ending after the terminal page or the first error
pub type PageStream<T> = BoxStream<'static, Result<Page<T>>>;

/// Stream of items, ending after the last item or the first error
pub type ItemStream<T> = BoxStream<'static, Result<T>>;

// ============================================================================
// PagedIterable
// ============================================================================

/// Restartable, lazily fetched sequence over every page of a collection.
///
/// Each call to [`pages`](Self::pages) or [`items`](Self::items) starts a
/// fresh walk from the first page. A walk is forward-only: it ends when a
/// page carries no marker, when a marker repeats one already seen in the
/// same walk, or after the first fetch error.
pub struct PagedIterable<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    context: Arc<FetchContext>,
}

impl<T> Clone for PagedIterable<T> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            context: Arc::clone(&self.context),
        }
    }
}

impl<T> fmt::Debug for PagedIterable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedIterable")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PagedIterable<T> {
    /// Create an iterable over `fetcher` with a fixed context
    pub fn new(fetcher: impl PageFetcher<T> + 'static, context: FetchContext) -> Self {
        Self::from_shared(Arc::new(fetcher), context)
    }

    /// Create an iterable over a shared fetcher
    pub fn from_shared(fetcher: Arc<dyn PageFetcher<T>>, context: FetchContext) -> Self {
        Self {
            fetcher,
            context: Arc::new(context),
        }
    }

    /// One iterable per scope over the same fetcher, concatenated in scope order
    pub fn scoped<I, S>(
        fetcher: Arc<dyn PageFetcher<T>>,
        context: &FetchContext,
        scopes: I,
    ) -> ConcatIterable<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        scopes
            .into_iter()
            .map(|scope| Self::from_shared(Arc::clone(&fetcher), context.clone().scope(scope)))
            .collect()
    }

    /// The fixed context of every fetch
    pub fn context(&self) -> &FetchContext {
        &self.context
    }

    /// Walk the pages
    pub fn pages(&self) -> PageStream<T> {
        let walk = PageWalk {
            fetcher: Arc::clone(&self.fetcher),
            context: Arc::clone(&self.context),
            next: NextFetch::First,
            seen: HashSet::new(),
            fetched: 0,
        };

        stream::unfold(walk, |mut walk| async move {
            let marker = match std::mem::replace(&mut walk.next, NextFetch::Finished) {
                NextFetch::Finished => return None,
                NextFetch::First => None,
                NextFetch::At(marker) => Some(marker),
            };

            debug!(
                page = walk.fetched + 1,
                marker = marker.as_ref().map(tracing::field::display),
                scope = walk.context.scope.as_deref(),
                "fetching page"
            );

            match walk.fetcher.fetch_page(marker.as_ref(), &walk.context).await {
                Ok(page) => {
                    walk.fetched += 1;
                    walk.advance(&page);
                    Some((Ok(page), walk))
                }
                Err(e) => Some((Err(e), walk)),
            }
        })
        .fuse()
        .boxed()
    }

    /// Walk the items of every page in order
    pub fn items(&self) -> ItemStream<T> {
        self.pages()
            .flat_map(|page| match page {
                Ok(page) => stream::iter(page.into_iter().map(Ok)).left_stream(),
                Err(e) => stream::once(future::ready(Err(e))).right_stream(),
            })
            .boxed()
    }

    /// Fetch only the first page
    pub async fn first_page(&self) -> Result<Page<T>> {
        self.fetcher.fetch_page(None, &self.context).await
    }

    /// Drain every item into memory
    pub async fn collect_all(&self) -> Result<Vec<T>> {
        self.items().try_collect().await
    }
}

enum NextFetch {
    First,
    At(Marker),
    Finished,
}

struct PageWalk<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    context: Arc<FetchContext>,
    next: NextFetch,
    seen: HashSet<Marker>,
    fetched: usize,
}

impl<T> PageWalk<T> {
    fn advance(&mut self, page: &Page<T>) {
        let Some(marker) = page.next_marker() else {
            debug!(pages = self.fetched, "reached last page");
            return;
        };
        if self.seen.insert(marker.clone()) {
            self.next = NextFetch::At(marker.clone());
        } else {
            warn!(
                %marker,
                pages = self.fetched,
                "provider repeated a marker, ending iteration"
            );
        }
    }
}

// ============================================================================
// ConcatIterable
// ============================================================================

/// Several paged sources drained one after another in a fixed order.
///
/// Only the source currently being drained is fetched from, so at most one
/// page is buffered at a time.
pub struct ConcatIterable<T> {
    sources: Vec<PagedIterable<T>>,
}

impl<T> Clone for ConcatIterable<T> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
        }
    }
}

impl<T> fmt::Debug for ConcatIterable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatIterable")
            .field("sources", &self.sources)
            .finish()
    }
}

impl<T> FromIterator<PagedIterable<T>> for ConcatIterable<T> {
    fn from_iter<I: IntoIterator<Item = PagedIterable<T>>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
        }
    }
}

impl<T: Send + 'static> ConcatIterable<T> {
    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there are no sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Append a source
    pub fn push(&mut self, source: PagedIterable<T>) {
        self.sources.push(source);
    }

    /// Pages of every source, source by source.
    ///
    /// The first error from any source ends the whole sequence.
    pub fn pages(&self) -> PageStream<T> {
        end_after_error(
            stream::iter(self.sources.clone())
                .flat_map(|source| source.pages())
                .boxed(),
        )
    }

    /// Items of every source, source by source
    pub fn items(&self) -> ItemStream<T> {
        end_after_error(
            stream::iter(self.sources.clone())
                .flat_map(|source| source.items())
                .boxed(),
        )
    }

    /// Drain every item of every source into memory
    pub async fn collect_all(&self) -> Result<Vec<T>> {
        self.items().try_collect().await
    }
}

/// Yield the first error, then stop
fn end_after_error<I: Send + 'static>(
    stream: BoxStream<'static, Result<I>>,
) -> BoxStream<'static, Result<I>> {
    let mut failed = false;
    stream
        .take_while(move |item| {
            let keep = !failed;
            failed = item.is_err();
            future::ready(keep)
        })
        .boxed()
}

/// Concatenate paged sources in the given order
pub fn concat<T, I>(sources: I) -> ConcatIterable<T>
where
    I: IntoIterator<Item = PagedIterable<T>>,
{
    sources.into_iter().collect()
}
