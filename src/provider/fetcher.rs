//! HTTP-backed page fetcher

use super::types::Collection;
use crate::decode::RecordDecoder;
use crate::error::{Error, Result};
use crate::http::{ApiRequest, HttpClient};
use crate::pagination::{FetchContext, Marker, Page, PageFetcher};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fetches pages of one collection over HTTP.
///
/// Each fetch is a single logical call: the client classifies and retries
/// it, the collection's decoder extracts the records and its marker
/// strategy derives the next marker from the same response.
pub struct HttpPageFetcher<T> {
    client: Arc<HttpClient>,
    collection: Arc<Collection>,
    cancel: CancellationToken,
    _item: PhantomData<fn() -> T>,
}

impl<T> HttpPageFetcher<T> {
    /// Create a fetcher for `collection`
    pub fn new(client: Arc<HttpClient>, collection: Arc<Collection>) -> Self {
        Self {
            client,
            collection,
            cancel: CancellationToken::new(),
            _item: PhantomData,
        }
    }

    /// Abort in-flight attempts and retry waits when `token` fires
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The collection being fetched
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Build the request for the page at `marker`
    pub fn build_request(
        &self,
        marker: Option<&Marker>,
        context: &FetchContext,
    ) -> Result<ApiRequest> {
        let collection = &self.collection;
        let page = collection.strategy.request(marker, context)?;

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let url = match page.url {
            // Next-page URLs already carry every parameter of the query
            Some(url) => url,
            None => {
                params.extend(collection.params.clone());
                if let (Some(param), Some(scope)) = (&collection.scope_param, &context.scope) {
                    params.insert(param.clone(), scope.clone());
                }
                params.extend(context.filters.clone());
                if let (Some(param), Some(sort)) = (&collection.sort_param, &context.sort) {
                    params.insert(param.clone(), sort.clone());
                }
                collection.url_for(context)?
            }
        };
        params.extend(page.query_params);

        let mut request = ApiRequest::new(collection.method, url);
        for (key, value) in params {
            request = request.query(key, value);
        }
        for (key, value) in &collection.headers {
            request = request.header(key, value);
        }
        Ok(request)
    }
}

impl<T> fmt::Debug for HttpPageFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPageFetcher")
            .field("collection", &self.collection.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> PageFetcher<T> for HttpPageFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(
        &self,
        marker: Option<&Marker>,
        context: &FetchContext,
    ) -> Result<Page<T>> {
        let request = self.build_request(marker, context)?;
        let response = self.client.send_with_cancel(&request, &self.cancel).await?;

        let body = response.json_value()?;
        let records = self.collection.decoder.decode_value(&body)?;
        let item_count = records.len();

        let items = records
            .into_iter()
            .map(|record| {
                serde_json::from_value(record).map_err(|e| {
                    Error::decode(format!(
                        "Collection '{}': invalid record: {e}",
                        self.collection.name
                    ))
                })
            })
            .collect::<Result<Vec<T>>>()?;

        let next = self.collection.strategy.next_marker(
            &body,
            &response.headers,
            item_count,
            marker,
            context,
        );

        debug!(
            collection = %self.collection.name,
            scope = context.scope.as_deref(),
            items = item_count,
            next = next.as_ref().map(tracing::field::display),
            "page decoded"
        );

        Ok(Page::new(items, next))
    }
}
