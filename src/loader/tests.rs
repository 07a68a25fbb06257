//! Tests for YAML loader module

use super::*;
use crate::classify::FailureKind;
use crate::error::Error;
use crate::pagination::{FetchContext, Marker, MarkerStrategy};
use crate::types::{BackoffType, Method};
use pretty_assertions::assert_eq;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

const MINIMAL: &str = r#"
name: acme
base_url: https://api.acme.example/v2
collections:
  - name: servers
    path: /servers
"#;

// ============================================================================
// Basic Loading Tests
// ============================================================================

#[test]
fn test_load_minimal_provider() {
    let def = load_provider_from_str(MINIMAL).unwrap();

    assert_eq!(def.name, "acme");
    assert_eq!(def.version, "0.1.0");
    assert_eq!(def.base_url, "https://api.acme.example/v2");
    assert!(def.scopes.is_empty());
    assert_eq!(def.collections.len(), 1);

    let servers = def.collection("servers").unwrap();
    assert_eq!(servers.path, "/servers");
    assert_eq!(servers.method, Method::GET);
    assert_eq!(servers.pagination, PaginationDefinition::None);
    assert!(def.collection("volumes").is_none());
}

#[test]
fn test_load_defaults() {
    let def = load_provider_from_str(MINIMAL).unwrap();

    assert_eq!(def.http, HttpDefinition::default());
    assert_eq!(def.http.timeout_secs, 30);
    assert_eq!(def.retry, RetryDefinition::default());
    assert_eq!(def.retry.max_attempts, 5);
    assert!(def.errors.rules.is_empty());
}

#[test]
fn test_load_provider_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();

    let def = load_provider(file.path()).unwrap();
    assert_eq!(def.name, "acme");
}

#[test]
fn test_load_provider_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_provider(dir.path().join("missing.yaml")).unwrap_err();

    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains("missing.yaml"));
}

#[test]
fn test_load_invalid_yaml() {
    let err = load_provider_from_str("name: [unclosed").unwrap_err();
    assert!(err.to_string().contains("Failed to parse provider YAML"));
}

// ============================================================================
// Section Tests
// ============================================================================

#[test]
fn test_load_http_and_retry() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
headers:
  X-Api-Version: "2"
http:
  timeout_secs: 10
  rate_limit_rps: 5
  user_agent: acme-cli/1.0
  hold_off_on_throttle: true
retry:
  max_attempts: 3
  max_elapsed_secs: 60
  backoff: linear
  initial_backoff_ms: 250
  max_backoff_ms: 2000
  retry_on_conflict: true
collections:
  - name: servers
    path: /servers
"#;

    let def = load_provider_from_str(yaml).unwrap();
    let config = def.http_config();

    assert_eq!(config.base_url.as_deref(), Some("https://api.acme.example"));
    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.user_agent, "acme-cli/1.0");
    assert_eq!(
        config.default_headers.get("X-Api-Version").map(String::as_str),
        Some("2")
    );

    let limit = config.rate_limit.unwrap();
    assert_eq!(limit.requests_per_second, 5);
    assert_eq!(limit.burst_size, 5);
    assert!(config.hold_off_on_throttle);

    let policy = config.retry;
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.max_elapsed, Duration::from_secs(60));
    assert_eq!(policy.backoff.kind, BackoffType::Linear);
    assert_eq!(policy.backoff.initial, Duration::from_millis(250));
    assert_eq!(policy.backoff.max, Duration::from_millis(2000));
    assert!(policy.retry_on_conflict);
}

#[test]
fn test_load_no_rate_limit_by_default() {
    let def = load_provider_from_str(MINIMAL).unwrap();
    assert!(def.http_config().rate_limit.is_none());
    assert!(!def.http_config().hold_off_on_throttle);
}

#[test]
fn test_load_error_rules() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
errors:
  message_paths: [fault.detail]
  rate_limit_remaining_headers: [X-Acme-Quota-Left]
  rules:
    - kind: not_found
      message_contains: could not be found
      statuses: [400]
    - kind: rate_limited
      error_code: Throttling
    - kind: server_fault
      pattern: "(?i)locked.*in progress"
  payload_failures:
    - path: status
      equals: error
    - path: error
      kind: unauthorized
collections:
  - name: servers
    path: /servers
"#;

    let def = load_provider_from_str(yaml).unwrap();
    assert_eq!(def.errors.rules.len(), 3);
    assert_eq!(def.errors.rules[0].kind, FailureKind::NotFound);
    assert_eq!(def.errors.rules[0].statuses, vec![400]);
    assert_eq!(def.errors.payload_failures[0].kind, FailureKind::ServerFault);
    assert_eq!(def.errors.payload_failures[1].kind, FailureKind::Unauthorized);

    let classifier = def.errors.to_classifier().unwrap();
    let headers = HeaderMap::new();

    let body = br#"{"fault": {"detail": "Image abc could not be found"}}"#;
    let failure = classifier.classify(400, &headers, Some(body.as_slice()));
    assert_eq!(failure.kind, FailureKind::NotFound);
    assert_eq!(failure.raw_message, "Image abc could not be found");

    let body = br#"{"status": "error"}"#;
    let failure = classifier.inspect(200, &headers, Some(body.as_slice())).unwrap();
    assert_eq!(failure.kind, FailureKind::ServerFault);
    assert_eq!(failure.status_code, 500);

    let mut headers = HeaderMap::new();
    headers.insert("x-acme-quota-left", "0".parse().unwrap());
    let failure = classifier.classify(400, &headers, None);
    assert_eq!(failure.kind, FailureKind::RateLimited);
}

#[test]
fn test_load_collection_details() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
scopes: [us-east, eu-west]
collections:
  - name: servers
    path: /{scope}/servers
    method: GET
    records_path: servers
    sort_param: sort
    params:
      detail: "true"
    headers:
      Accept: application/json
"#;

    let def = load_provider_from_str(yaml).unwrap();
    let servers = def.collection("servers").unwrap();

    assert_eq!(def.scopes, vec!["us-east".to_string(), "eu-west".to_string()]);
    assert_eq!(servers.records_path.as_deref(), Some("servers"));
    assert_eq!(servers.sort_param.as_deref(), Some("sort"));
    assert_eq!(servers.params.get("detail").map(String::as_str), Some("true"));
    assert_eq!(
        servers.headers.get("Accept").map(String::as_str),
        Some("application/json")
    );
}

// ============================================================================
// Pagination Definition Tests
// ============================================================================

#[test]
fn test_load_offset_pagination() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: servers
    path: /servers
    pagination:
      type: offset
      offset_param: offset
      limit_param: limit
      limit: 100
      stop:
        type: total_count
        path: meta.total
"#;

    let def = load_provider_from_str(yaml).unwrap();
    assert_eq!(
        def.collections[0].pagination,
        PaginationDefinition::Offset {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            limit: 100,
            stop: StopConditionDefinition::TotalCount {
                path: "meta.total".to_string()
            },
        }
    );

    let strategy = def.collections[0].pagination.to_strategy().unwrap();
    let request = strategy.request(None, &FetchContext::new()).unwrap();
    assert_eq!(request.query_params.get("limit"), Some(&"100".to_string()));
}

#[test]
fn test_load_page_number_pagination() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: servers
    path: /servers
    pagination:
      type: page_number
      page_param: page
      page_size_param: per_page
      page_size: 50
"#;

    let def = load_provider_from_str(yaml).unwrap();
    let strategy = def.collections[0].pagination.to_strategy().unwrap();

    let request = strategy.request(None, &FetchContext::new()).unwrap();
    assert_eq!(request.query_params.get("page"), Some(&"1".to_string()));
    assert_eq!(request.query_params.get("per_page"), Some(&"50".to_string()));
}

#[test]
fn test_load_cursor_pagination() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: servers
    path: /servers
    pagination:
      type: cursor
      cursor_param: marker
      cursor_path: servers[-1].id
      stop:
        type: empty_page
"#;

    let def = load_provider_from_str(yaml).unwrap();
    let strategy = def.collections[0].pagination.to_strategy().unwrap();

    let body = json!({"servers": [{"id": "a"}, {"id": "b"}]});
    let next = strategy.next_marker(&body, &HeaderMap::new(), 2, None, &FetchContext::new());
    assert_eq!(next, Some(Marker::cursor("b")));

    let body = json!({"servers": []});
    let next = strategy.next_marker(&body, &HeaderMap::new(), 0, None, &FetchContext::new());
    assert_eq!(next, None);
}

#[test]
fn test_load_link_header_and_next_url_pagination() {
    let yaml = r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: images
    path: /images
    pagination:
      type: link_header
  - name: volumes
    path: /volumes
    pagination:
      type: next_url
      next_url_path: links.next
"#;

    let def = load_provider_from_str(yaml).unwrap();
    assert_eq!(
        def.collections[0].pagination,
        PaginationDefinition::LinkHeader {
            rel: "next".to_string()
        }
    );
    assert!(def.collections[1].pagination.to_strategy().is_ok());
}

// ============================================================================
// Validation Tests
// ============================================================================

fn assert_invalid(yaml: &str, needle: &str) {
    let err = load_provider_from_str(yaml).unwrap_err();
    assert!(
        err.to_string().contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn test_validation_empty_name() {
    assert_invalid(
        r#"
name: ""
base_url: https://api.acme.example
collections:
  - name: servers
    path: /servers
"#,
        "name cannot be empty",
    );
}

#[test]
fn test_validation_bad_base_url() {
    assert_invalid(
        r#"
name: acme
base_url: not a url
collections:
  - name: servers
    path: /servers
"#,
        "base_url",
    );
}

#[test]
fn test_validation_no_collections() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
collections: []
"#,
        "at least one collection",
    );
}

#[test]
fn test_validation_duplicate_collections() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: servers
    path: /servers
  - name: servers
    path: /v2/servers
"#,
        "Duplicate collection names",
    );
}

#[test]
fn test_validation_empty_collection_path() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: servers
    path: ""
"#,
        "path cannot be empty",
    );
}

#[test]
fn test_validation_zero_attempts() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
retry:
  max_attempts: 0
collections:
  - name: servers
    path: /servers
"#,
        "retry.max_attempts",
    );
}

#[test]
fn test_validation_invalid_regex_rule() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
errors:
  rules:
    - kind: conflict
      pattern: "(unclosed"
collections:
  - name: servers
    path: /servers
"#,
        "pattern",
    );
}

#[test]
fn test_validation_malformed_records_query() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: zones
    path: /zones
    records_path: "$.zones[*"
"#,
        "Collection 'zones'",
    );
}

#[test]
fn test_validation_rule_needs_one_matcher() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
errors:
  rules:
    - kind: conflict
      message_contains: locked
      error_code: Locked
collections:
  - name: servers
    path: /servers
"#,
        "exactly one of",
    );
}

#[test]
fn test_validation_cursor_needs_source() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
collections:
  - name: servers
    path: /servers
    pagination:
      type: cursor
      cursor_param: marker
"#,
        "Collection 'servers'",
    );
}

#[test]
fn test_validation_unknown_failure_kind() {
    assert_invalid(
        r#"
name: acme
base_url: https://api.acme.example
errors:
  rules:
    - kind: teapot
      message_contains: short and stout
collections:
  - name: servers
    path: /servers
"#,
        "Failed to parse provider YAML",
    );
}
