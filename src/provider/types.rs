//! Runtime collection types

use crate::decode::JsonDecoder;
use crate::error::{Error, Result};
use crate::loader::CollectionDefinition;
use crate::pagination::{FetchContext, MarkerStrategy};
use crate::types::Method;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Placeholder substituted with the fetch context's scope
pub const SCOPE_PLACEHOLDER: &str = "{scope}";

/// A listable collection, ready to be fetched
#[derive(Clone)]
pub struct Collection {
    /// Collection name
    pub name: String,
    /// URL path, may contain `{scope}`
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Static query parameters
    pub params: BTreeMap<String, String>,
    /// Collection-specific headers
    pub headers: HashMap<String, String>,
    /// Query parameter carrying the sort order
    pub sort_param: Option<String>,
    /// Query parameter carrying the scope
    pub scope_param: Option<String>,
    /// Extracts records from each response body
    pub decoder: JsonDecoder,
    /// Pagination scheme
    pub strategy: Arc<dyn MarkerStrategy>,
}

impl Collection {
    /// Build from a definition
    pub fn from_definition(def: &CollectionDefinition) -> Result<Self> {
        let decoder = match &def.records_path {
            Some(path) => JsonDecoder::parse(path)?,
            None => JsonDecoder::new(),
        };

        Ok(Self {
            name: def.name.clone(),
            path: def.path.clone(),
            method: def.method,
            params: def.params.clone(),
            headers: def.headers.clone(),
            sort_param: def.sort_param.clone(),
            scope_param: def.scope_param.clone(),
            decoder,
            strategy: def.pagination.to_strategy()?,
        })
    }

    /// Whether the path needs a scope
    pub fn is_scoped(&self) -> bool {
        self.path.contains(SCOPE_PLACEHOLDER)
    }

    /// Path for one fetch, with the scope substituted
    pub fn url_for(&self, context: &FetchContext) -> Result<String> {
        if !self.is_scoped() {
            return Ok(self.path.clone());
        }
        match context.scope.as_deref() {
            Some(scope) if !scope.is_empty() => {
                Ok(self.path.replace(SCOPE_PLACEHOLDER, &encode_segment(scope)))
            }
            _ => Err(Error::invalid_value(
                "scope",
                format!("collection '{}' needs a scope for '{}'", self.name, self.path),
            )),
        }
    }
}

/// Percent-encode `value` for use as a single path segment
fn encode_segment(value: &str) -> String {
    // form encoding writes spaces as '+', which a path keeps literally
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
