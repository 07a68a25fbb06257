// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Nimbus
//!
//! Pagination, error classification and retry core for multi-provider
//! cloud API clients.
//!
//! ## Features
//!
//! - **Lazy Pagination**: Marker-chained `PagedIterable` with a loop guard,
//!   restartable walks and per-scope concatenation
//! - **Marker Strategies**: Cursor, offset, page number, link header, next URL
//! - **Error Classification**: Status-code-first dispatch with pluggable
//!   refinement rules and failures embedded in 2xx payloads
//! - **Retry**: Pure retry decisions, exponential backoff, `Retry-After`
//!   handling and cancellable waits
//! - **YAML Providers**: Describe a provider's collections and error
//!   conventions declaratively
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use nimbus::{load_provider, FetchContext, Provider, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let def = load_provider("providers/acme.yaml")?;
//!     let provider = Provider::from_definition(&def)?;
//!
//!     let servers = provider.list_scoped::<serde_json::Value, _, _>(
//!         "servers",
//!         ["us-east", "eu-west"],
//!         &FetchContext::new(),
//!     )?;
//!
//!     let mut items = servers.items();
//!     while let Some(server) = items.next().await {
//!         println!("{}", server?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Provider                              │
//! │   list(collection, ctx) → PagedIterable                         │
//! │   list_scoped(collection, scopes, ctx) → ConcatIterable         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────────┴──┬──────────────┬────────────────┐
//! │ Pagination │      Classify      │    Retry     │     HTTP       │
//! ├────────────┼────────────────────┼──────────────┼────────────────┤
//! │ Marker     │ Status dispatch    │ RetryPolicy  │ RequestExecutor│
//! │ Page       │ Refinement rules   │ Backoff      │ HttpClient     │
//! │ Strategies │ Payload failures   │ Retrier      │ Rate limit     │
//! └────────────┴────────────────────┴──────────────┴────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Failure classification of HTTP responses
pub mod classify;

/// Retry policy and retry loop
pub mod retry;

/// HTTP client with classification, retry and rate limiting
pub mod http;

/// Lazy paged sequences and marker strategies
pub mod pagination;

/// Response decoders
pub mod decode;

/// YAML loader for provider definitions
pub mod loader;

/// Runtime providers and HTTP page fetchers
pub mod provider;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use classify::{ClassifiedFailure, ErrorClassifier, FailureKind};
pub use loader::{load_provider, load_provider_from_str, ProviderDefinition};
pub use pagination::{
    concat, ConcatIterable, FetchContext, Marker, Page, PageFetcher, PagedIterable,
};
pub use provider::Provider;
pub use retry::{Retrier, RetryPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
