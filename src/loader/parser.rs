//! YAML parser for provider definitions
//!
//! Parses and validates provider YAML files.

use crate::decode::JsonDecoder;
use crate::error::{Error, Result};
use crate::loader::types::{CollectionDefinition, ProviderDefinition};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use url::Url;

/// Load a provider definition from a YAML file
///
/// # Examples
///
/// ```ignore
/// let provider = load_provider("./providers/acme.yaml")?;
/// ```
pub fn load_provider(path: impl AsRef<Path>) -> Result<ProviderDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read provider file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_provider_from_str(&content)
}

/// Load a provider definition from a YAML string
pub fn load_provider_from_str(yaml: &str) -> Result<ProviderDefinition> {
    let def: ProviderDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse provider YAML: {e}")))?;

    validate_provider(&def)?;
    Ok(def)
}

/// Validate a provider definition
pub fn validate_provider(def: &ProviderDefinition) -> Result<()> {
    if def.name.is_empty() {
        return Err(Error::config("Provider name cannot be empty"));
    }

    if def.base_url.is_empty() {
        return Err(Error::config("Provider base_url cannot be empty"));
    }
    Url::parse(&def.base_url).map_err(|e| {
        Error::invalid_value("base_url", format!("'{}': {e}", def.base_url))
    })?;

    if def.retry.max_attempts == 0 {
        return Err(Error::invalid_value(
            "retry.max_attempts",
            "must be at least 1",
        ));
    }
    if def.http.rate_limit_rps == Some(0) {
        return Err(Error::invalid_value("http.rate_limit_rps", "must be at least 1"));
    }

    def.errors.to_classifier()?;

    if def.collections.is_empty() {
        return Err(Error::config("Provider must have at least one collection"));
    }

    let names: HashSet<_> = def.collections.iter().map(|c| &c.name).collect();
    if names.len() != def.collections.len() {
        return Err(Error::config("Duplicate collection names found"));
    }

    for collection in &def.collections {
        validate_collection(collection)?;
    }

    Ok(())
}

/// Validate a collection definition
fn validate_collection(collection: &CollectionDefinition) -> Result<()> {
    if collection.name.is_empty() {
        return Err(Error::config("Collection name cannot be empty"));
    }

    if collection.path.is_empty() {
        return Err(Error::config(format!(
            "Collection '{}' path cannot be empty",
            collection.name
        )));
    }

    collection.pagination.to_strategy().map_err(|e| {
        Error::config(format!("Collection '{}': {e}", collection.name))
    })?;
    if let Some(path) = &collection.records_path {
        JsonDecoder::parse(path).map_err(|e| {
            Error::config(format!("Collection '{}': {e}", collection.name))
        })?;
    }

    Ok(())
}
