//! Provider module
//!
//! Runtime view of a provider definition.
//!
//! # Overview
//!
//! The provider module provides:
//! - `Provider` - Shared HTTP client plus the provider's collections
//! - `Collection` - Path, parameters, decoder and marker strategy of one collection
//! - `HttpPageFetcher` - `PageFetcher` that lists a collection over HTTP
//!
//! Listing a collection returns a lazy [`PagedIterable`]; listing it across
//! several scopes (regions, zones) returns a [`ConcatIterable`] that drains
//! one scope after the other.

mod fetcher;
mod types;

pub use fetcher::HttpPageFetcher;
pub use types::{Collection, SCOPE_PLACEHOLDER};

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::loader::ProviderDefinition;
use crate::pagination::{ConcatIterable, FetchContext, PageFetcher, PagedIterable};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A configured cloud API provider
pub struct Provider {
    name: String,
    client: Arc<HttpClient>,
    collections: BTreeMap<String, Arc<Collection>>,
    default_scopes: Vec<String>,
    cancel: CancellationToken,
}

impl Provider {
    /// Build the runtime provider from its definition
    pub fn from_definition(def: &ProviderDefinition) -> Result<Self> {
        let classifier = def.errors.to_classifier()?;
        let client = HttpClient::with_config(def.http_config())?.with_classifier(classifier);

        let collections = def
            .collections
            .iter()
            .map(|c| -> Result<_> {
                Ok((c.name.clone(), Arc::new(Collection::from_definition(c)?)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        debug!(
            provider = %def.name,
            collections = collections.len(),
            "provider ready"
        );

        Ok(Self {
            name: def.name.clone(),
            client: Arc::new(client),
            collections,
            default_scopes: def.scopes.clone(),
            cancel: CancellationToken::new(),
        })
    }

    /// Cancel every fetch started from this provider when `token` fires
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Provider name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection names, sorted
    pub fn collections(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    /// Look up a collection
    pub fn collection(&self, name: &str) -> Result<&Arc<Collection>> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound {
                collection: name.to_string(),
            })
    }

    /// Scopes listed when the caller names none
    pub fn default_scopes(&self) -> &[String] {
        &self.default_scopes
    }

    /// The shared HTTP client
    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }

    /// Page fetcher for a collection
    pub fn fetcher<T>(&self, collection: &str) -> Result<HttpPageFetcher<T>> {
        let collection = Arc::clone(self.collection(collection)?);
        Ok(HttpPageFetcher::new(Arc::clone(&self.client), collection)
            .with_cancellation(self.cancel.clone()))
    }

    /// Lazily list a collection
    pub fn list<T>(&self, collection: &str, context: FetchContext) -> Result<PagedIterable<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let fetcher = self.fetcher::<T>(collection)?;
        Ok(PagedIterable::new(fetcher, context))
    }

    /// Lazily list a collection in every scope, in the order given.
    ///
    /// An empty `scopes` falls back to the provider's default scopes.
    pub fn list_scoped<T, I, S>(
        &self,
        collection: &str,
        scopes: I,
        context: &FetchContext,
    ) -> Result<ConcatIterable<T>>
    where
        T: DeserializeOwned + Send + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fetcher: Arc<dyn PageFetcher<T>> = Arc::new(self.fetcher::<T>(collection)?);
        let mut scopes: Vec<String> = scopes.into_iter().map(Into::into).collect();
        if scopes.is_empty() {
            scopes.clone_from(&self.default_scopes);
        }
        Ok(PagedIterable::scoped(fetcher, context, scopes))
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("default_scopes", &self.default_scopes)
            .finish_non_exhaustive()
    }
}
