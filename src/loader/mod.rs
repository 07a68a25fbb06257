//! YAML Loader module
//!
//! Parse provider definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ProviderDefinition` - Declarative provider specification
//! - `CollectionDefinition` - Listable collection configuration
//! - YAML parsing with validation
//! - Conversion into the runtime client, classifier, policy and strategies

mod convert;
mod parser;
mod types;

pub use parser::{load_provider, load_provider_from_str, validate_provider};
pub use types::{
    CollectionDefinition, ErrorsDefinition, HttpDefinition, PaginationDefinition,
    PayloadFailureDefinition, ProviderDefinition, RefinementRuleDefinition, RetryDefinition,
    StopConditionDefinition,
};

#[cfg(test)]
mod tests;
