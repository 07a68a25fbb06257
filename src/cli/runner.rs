//! CLI runner - executes commands

use crate::classify::ErrorClassifier;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::error::{Error, Result};
use crate::loader::{load_provider, ProviderDefinition};
use crate::pagination::{FetchContext, ItemStream, PageStream};
use crate::provider::Provider;
use crate::retry::{AttemptState, RetryDecision, RetryPolicy};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort pending requests and retry waits when `token` fires
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::List {
                collection,
                scopes,
                filters,
                sort,
                page_size,
                max,
                pages,
            } => {
                let mut context = FetchContext::new();
                for (key, value) in filters {
                    context = context.filter(key, value);
                }
                if let Some(sort) = sort {
                    context = context.sort(sort);
                }
                if let Some(size) = page_size {
                    context = context.page_size(*size);
                }
                self.list(collection, scopes, context, *max, *pages).await
            }
            Commands::Classify {
                status,
                headers,
                body,
                attempt,
            } => self.classify(*status, headers, body.as_deref(), *attempt),
            Commands::Collections => self.collections(),
            Commands::Validate => self.validate(),
        }
    }

    /// Load provider definition
    fn load_definition(&self) -> Result<ProviderDefinition> {
        let path = self
            .cli
            .provider
            .as_ref()
            .ok_or_else(|| Error::config("Provider file not specified (use -p flag)"))?;
        load_provider(path)
    }

    /// List a collection as RECORD (or PAGE) messages
    async fn list(
        &self,
        collection: &str,
        scopes: &[String],
        context: FetchContext,
        max: Option<usize>,
        pages: bool,
    ) -> Result<()> {
        let def = self.load_definition()?;
        let provider = Provider::from_definition(&def)?.with_cancellation(self.cancel.clone());

        // Scoped paths need a scope per listing; unscoped ones are listed once
        let scopes: Vec<String> = if scopes.is_empty() && provider.collection(collection)?.is_scoped()
        {
            provider.default_scopes().to_vec()
        } else {
            scopes.to_vec()
        };

        if pages {
            let stream: PageStream<Value> = if scopes.is_empty() {
                provider.list(collection, context)?.pages()
            } else {
                provider.list_scoped(collection, scopes, &context)?.pages()
            };
            return self.emit_pages(collection, stream, max).await;
        }

        let stream: ItemStream<Value> = if scopes.is_empty() {
            provider.list(collection, context)?.items()
        } else {
            provider.list_scoped(collection, scopes, &context)?.items()
        };
        self.emit_items(collection, stream, max).await
    }

    async fn emit_items(
        &self,
        collection: &str,
        mut stream: ItemStream<Value>,
        max: Option<usize>,
    ) -> Result<()> {
        let mut count = 0usize;
        while max.map_or(true, |max| count < max) {
            let Some(item) = stream.next().await else {
                break;
            };
            let item = item?;
            self.output_message(&json!({
                "type": "RECORD",
                "record": {
                    "collection": collection,
                    "data": item
                }
            }));
            count += 1;
        }

        info!(collection, items = count, "listing complete");
        Ok(())
    }

    async fn emit_pages(
        &self,
        collection: &str,
        mut stream: PageStream<Value>,
        max: Option<usize>,
    ) -> Result<()> {
        let mut count = 0usize;
        let mut page_count = 0usize;
        while max.map_or(true, |max| count < max) {
            let Some(page) = stream.next().await else {
                break;
            };
            let page = page?;
            let marker = page.next_marker().map(ToString::to_string);
            let (items, _) = page.into_parts();
            count += items.len();
            page_count += 1;
            self.output_message(&json!({
                "type": "PAGE",
                "page": {
                    "collection": collection,
                    "items": items,
                    "next_marker": marker
                }
            }));
        }

        info!(collection, pages = page_count, items = count, "listing complete");
        Ok(())
    }

    /// Classify a response with the provider's rules (or the defaults)
    fn classify(
        &self,
        status: u16,
        headers: &[(String, String)],
        body: Option<&str>,
        attempt: u32,
    ) -> Result<()> {
        let (classifier, policy) = match &self.cli.provider {
            Some(_) => {
                let def = self.load_definition()?;
                (def.errors.to_classifier()?, def.retry.to_policy())
            }
            None => (ErrorClassifier::default(), RetryPolicy::default()),
        };

        let headers = header_map(headers)?;
        let message = classification_message(
            &classifier,
            &policy,
            status,
            &headers,
            body.map(str::as_bytes),
            attempt,
        );
        self.output_message(&message);
        Ok(())
    }

    /// List collection names
    fn collections(&self) -> Result<()> {
        let def = self.load_definition()?;
        let provider = Provider::from_definition(&def)?;

        self.output_message(&json!({
            "type": "COLLECTIONS",
            "provider": provider.name(),
            "collections": provider.collections(),
            "scopes": provider.default_scopes()
        }));

        Ok(())
    }

    /// Validate provider definition
    fn validate(&self) -> Result<()> {
        let def = self.load_definition()?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Provider '{}' v{} is valid with {} collections",
                    def.name,
                    def.version,
                    def.collections.len()
                )
            }
        }));

        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Build a header map from `(name, value)` pairs
fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_value("header", format!("'{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_value("header", format!("'{name}': {e}")))?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}

/// CLASSIFICATION message for one response
fn classification_message(
    classifier: &ErrorClassifier,
    policy: &RetryPolicy,
    status: u16,
    headers: &HeaderMap,
    body: Option<&[u8]>,
    attempt: u32,
) -> Value {
    let Some(failure) = classifier.inspect(status, headers, body) else {
        return json!({
            "type": "CLASSIFICATION",
            "classification": {
                "success": true,
                "status_code": status
            }
        });
    };

    let state = AttemptState::new(attempt.max(1), Duration::ZERO);
    let decision = match policy.decide(&failure, &state) {
        RetryDecision::Retry { after } => json!({
            "action": "retry",
            "after_ms": millis(after)
        }),
        RetryDecision::GiveUp => json!({ "action": "give_up" }),
    };

    json!({
        "type": "CLASSIFICATION",
        "classification": {
            "success": false,
            "kind": failure.kind,
            "status_code": failure.status_code,
            "message": failure.raw_message,
            "error_code": failure.error_code,
            "retry_after_ms": failure.retry_after.map(millis),
            "decision": decision
        }
    })
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_header_map() {
        let headers = header_map(&pairs(&[("Retry-After", "5"), ("X-Trace", "abc")])).unwrap();
        assert_eq!(headers.get("retry-after").unwrap(), "5");
        assert_eq!(headers.get("x-trace").unwrap(), "abc");

        assert!(header_map(&pairs(&[("bad header", "x")])).is_err());
    }

    #[test]
    fn test_classification_success() {
        let message = classification_message(
            &ErrorClassifier::default(),
            &RetryPolicy::default(),
            200,
            &HeaderMap::new(),
            Some(br#"{"items": []}"#.as_slice()),
            1,
        );
        assert_eq!(
            message,
            json!({
                "type": "CLASSIFICATION",
                "classification": { "success": true, "status_code": 200 }
            })
        );
    }

    #[test]
    fn test_classification_rate_limited_uses_retry_after() {
        let headers = header_map(&pairs(&[("Retry-After", "7")])).unwrap();
        let message = classification_message(
            &ErrorClassifier::default(),
            &RetryPolicy::default(),
            429,
            &headers,
            None,
            1,
        );

        let classification = &message["classification"];
        assert_eq!(classification["kind"], "rate_limited");
        assert_eq!(classification["retry_after_ms"], 7000);
        assert_eq!(
            classification["decision"],
            json!({ "action": "retry", "after_ms": 7000 })
        );
    }

    #[test]
    fn test_classification_not_found_gives_up() {
        let message = classification_message(
            &ErrorClassifier::default(),
            &RetryPolicy::default(),
            404,
            &HeaderMap::new(),
            Some(br#"{"message": "no such server"}"#.as_slice()),
            1,
        );

        let classification = &message["classification"];
        assert_eq!(classification["kind"], "not_found");
        assert_eq!(classification["message"], "no such server");
        assert_eq!(classification["decision"], json!({ "action": "give_up" }));
    }

    #[test]
    fn test_classification_last_attempt_gives_up() {
        let policy = RetryPolicy::builder().max_attempts(2).build();
        let message = classification_message(
            &ErrorClassifier::default(),
            &policy,
            503,
            &HeaderMap::new(),
            None,
            2,
        );
        assert_eq!(
            message["classification"]["decision"],
            json!({ "action": "give_up" })
        );
    }
}
