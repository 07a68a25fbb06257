//! Tests for the classification module

use super::*;
use pretty_assertions::assert_eq;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use std::time::Duration;
use test_case::test_case;

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(value));
    }
    map
}

// ============================================================================
// Status Dispatch
// ============================================================================

#[test_case(401, FailureKind::Unauthorized)]
#[test_case(403, FailureKind::Unauthorized)]
#[test_case(404, FailureKind::NotFound)]
#[test_case(409, FailureKind::Conflict)]
#[test_case(429, FailureKind::RateLimited)]
#[test_case(500, FailureKind::ServerFault)]
#[test_case(502, FailureKind::ServerFault)]
#[test_case(503, FailureKind::ServerFault)]
#[test_case(400, FailureKind::Unrecognized)]
#[test_case(422, FailureKind::Unrecognized)]
#[test_case(302, FailureKind::Unrecognized)]
fn test_status_dispatch(status: u16, expected: FailureKind) {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(status, &HeaderMap::new(), None);
    assert_eq!(failure.kind, expected);
    assert_eq!(failure.status_code, status);
}

#[test]
fn test_rate_limited_with_retry_after_seconds() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(429, &headers(&[("retry-after", "30")]), None);

    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(failure.status_code, 429);
    assert_eq!(failure.raw_message, "Too Many Requests");
}

#[test]
fn test_not_found_without_body() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(404, &HeaderMap::new(), None);

    assert_eq!(failure.kind, FailureKind::NotFound);
    assert_eq!(failure.retry_after, None);
    assert_eq!(failure.raw_message, "Not Found");
}

#[test]
fn test_4xx_with_exhausted_rate_limit_header() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(
        400,
        &headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "12")]),
        None,
    );

    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(12)));
}

#[test]
fn test_remaining_header_above_zero_is_not_rate_limited() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(400, &headers(&[("x-rate-limit-remaining", "17")]), None);
    assert_eq!(failure.kind, FailureKind::Unrecognized);
}

#[test]
fn test_custom_rate_limit_headers() {
    let classifier = ErrorClassifier::builder()
        .remaining_header("X-Quota-Left")
        .reset_header("X-Quota-Reset")
        .build();
    let failure = classifier.classify(
        403,
        &headers(&[("x-quota-left", "0"), ("x-quota-reset", "5")]),
        None,
    );

    // 403 dispatches before the rate-limit header check
    assert_eq!(failure.kind, FailureKind::Unauthorized);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(5)));

    let failure = classifier.classify(420, &headers(&[("x-quota-left", "0")]), None);
    assert_eq!(failure.kind, FailureKind::RateLimited);
}

#[test]
fn test_retry_after_http_date_in_the_past_is_zero() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(
        429,
        &headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")]),
        None,
    );
    assert_eq!(failure.retry_after, Some(Duration::ZERO));
}

fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc)
}

#[test]
fn test_reset_header_as_epoch_seconds() {
    let classifier = ErrorClassifier::new();
    let now = fixed_now();
    let reset = (now.timestamp() + 120).to_string();
    let mut map = HeaderMap::new();
    map.insert("x-ratelimit-reset", HeaderValue::from_str(&reset).unwrap());

    let failure = classifier.classify_at(now, 429, &map, None);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(120)));
}

#[test]
fn test_retry_after_http_date_against_fixed_clock() {
    let classifier = ErrorClassifier::new();
    let hdrs = headers(&[("retry-after", "Sun, 01 Mar 2026 12:00:45 GMT")]);

    let failure = classifier.classify_at(fixed_now(), 503, &hdrs, None);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(45)));
}

#[test]
fn test_huge_retry_after_is_capped() {
    let classifier = ErrorClassifier::new();
    let hdrs = headers(&[("retry-after", "18446744073709551615")]);

    let failure = classifier.classify(429, &hdrs, None);
    assert_eq!(failure.retry_after, Some(MAX_RETRY_AFTER));
}

#[test]
fn test_classification_is_deterministic() {
    let classifier = ErrorClassifier::builder()
        .rule(RefinementRule::message_contains("quota", FailureKind::RateLimited))
        .build();
    let hdrs = headers(&[("retry-after", "7")]);
    let body: &[u8] = br#"{"message": "quota exceeded for project"}"#;

    let first = classifier.classify(400, &hdrs, Some(body));
    let second = classifier.classify(400, &hdrs, Some(body));
    assert_eq!(first, second);
    assert_eq!(first.kind, FailureKind::RateLimited);
}

#[test]
fn test_classification_with_absolute_times_is_deterministic() {
    let classifier = ErrorClassifier::new();
    let now = fixed_now();
    let mut map = HeaderMap::new();
    let reset = (now.timestamp() + 100).to_string();
    map.insert("x-ratelimit-reset", HeaderValue::from_str(&reset).unwrap());

    let first = classifier.classify_at(now, 429, &map, None);
    let second = classifier.classify_at(now, 429, &map, None);
    assert_eq!(first, second);

    let dated = headers(&[("retry-after", "Sun, 01 Mar 2026 12:01:40 GMT")]);
    assert_eq!(
        classifier.inspect_at(now, 429, &dated, None),
        classifier.inspect_at(now, 429, &dated, None)
    );
    assert_eq!(
        classifier.classify_at(now, 429, &dated, None).retry_after,
        Some(Duration::from_secs(100))
    );
}

// ============================================================================
// Body Parsing
// ============================================================================

#[test]
fn test_json_message_and_code_extraction() {
    let classifier = ErrorClassifier::new();
    let body: &[u8] = br#"{"error": {"code": "InstanceLimitExceeded", "message": "too many instances"}}"#;
    let failure = classifier.classify(400, &HeaderMap::new(), Some(body));

    assert_eq!(failure.raw_message, "too many instances");
    assert_eq!(failure.error_code.as_deref(), Some("InstanceLimitExceeded"));
}

#[test]
fn test_xml_message_and_code_extraction() {
    let classifier = ErrorClassifier::new();
    let body: &[u8] = b"<?xml version=\"1.0\"?><Response><Errors><Error><Code>InvalidInstanceID.NotFound</Code><Message>The instance ID 'i-1' does not exist</Message></Error></Errors></Response>";
    let failure = classifier.classify(400, &HeaderMap::new(), Some(body));

    assert_eq!(failure.raw_message, "The instance ID 'i-1' does not exist");
    assert_eq!(
        failure.error_code.as_deref(),
        Some("InvalidInstanceID.NotFound")
    );
}

#[test]
fn test_plain_text_body_is_kept_as_message() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(502, &HeaderMap::new(), Some(b"  upstream went away \n".as_slice()));
    assert_eq!(failure.raw_message, "upstream went away");
}

#[test]
fn test_long_plain_text_body_is_truncated() {
    let classifier = ErrorClassifier::new();
    let body = "x".repeat(2000);
    let failure = classifier.classify(500, &HeaderMap::new(), Some(body.as_bytes()));
    assert_eq!(failure.raw_message.len(), 515);
    assert!(failure.raw_message.ends_with("..."));
}

// ============================================================================
// Refinement Rules
// ============================================================================

#[test]
fn test_message_refinement_reclassifies_400_as_not_found() {
    let classifier = ErrorClassifier::builder()
        .rule(RefinementRule::message_contains("does not exist", FailureKind::NotFound).for_statuses([400]))
        .build();
    let body: &[u8] = br#"{"message": "Server srv-1 Does Not Exist"}"#;

    let failure = classifier.classify(400, &HeaderMap::new(), Some(body));
    assert_eq!(failure.kind, FailureKind::NotFound);
    assert_eq!(failure.status_code, 400);

    // restricted to 400
    let failure = classifier.classify(500, &HeaderMap::new(), Some(body));
    assert_eq!(failure.kind, FailureKind::ServerFault);
}

#[test]
fn test_error_code_refinement() {
    let classifier = ErrorClassifier::builder()
        .rule(RefinementRule::error_code("RequestLimitExceeded", FailureKind::RateLimited))
        .build();
    let body: &[u8] = b"<Response><Errors><Error><Code>RequestLimitExceeded</Code><Message>Request limit exceeded.</Message></Error></Errors></Response>";

    let failure = classifier.classify(503, &HeaderMap::new(), Some(body));
    assert_eq!(failure.kind, FailureKind::RateLimited);
}

#[test]
fn test_pattern_refinement() {
    let classifier = ErrorClassifier::builder()
        .rule(RefinementRule::pattern(r"(?i)locked.*in progress", FailureKind::ServerFault).unwrap())
        .build();
    let body: &[u8] = br#"{"message": "Locked: operation in progress on volume"}"#;

    let failure = classifier.classify(409, &HeaderMap::new(), Some(body));
    assert_eq!(failure.kind, FailureKind::ServerFault);

    let body: &[u8] = br#"{"message": "name already in use"}"#;
    let failure = classifier.classify(409, &HeaderMap::new(), Some(body));
    assert_eq!(failure.kind, FailureKind::Conflict);
}

#[test]
fn test_invalid_pattern_is_rejected() {
    assert!(RefinementRule::pattern("([", FailureKind::NotFound).is_err());
}

#[test]
fn test_first_matching_rule_wins() {
    let classifier = ErrorClassifier::builder()
        .rule(RefinementRule::message_contains("throttl", FailureKind::RateLimited))
        .rule(RefinementRule::message_contains("throttled", FailureKind::NotFound))
        .build();
    let body: &[u8] = br#"{"message": "request throttled"}"#;
    let failure = classifier.classify(400, &HeaderMap::new(), Some(body));
    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(classifier.rules().len(), 2);
}

// ============================================================================
// Success-with-embedded-failure
// ============================================================================

#[test]
fn test_inspect_success_is_none() {
    let classifier = ErrorClassifier::builder()
        .payload_rule(PayloadFailureRule::field_equals("status", "error"))
        .build();
    let body = json!({"status": "ok", "items": []}).to_string();
    assert!(classifier
        .inspect(200, &HeaderMap::new(), Some(body.as_bytes()))
        .is_none());
    assert!(classifier.inspect(204, &HeaderMap::new(), None).is_none());
}

#[test]
fn test_inspect_payload_failure_synthesizes_500() {
    let classifier = ErrorClassifier::builder()
        .payload_rule(PayloadFailureRule::field_equals("status", "error"))
        .build();
    let body = json!({"status": "error", "message": "job failed"}).to_string();

    let failure = classifier
        .inspect(200, &HeaderMap::new(), Some(body.as_bytes()))
        .unwrap();
    assert_eq!(failure.kind, FailureKind::ServerFault);
    assert_eq!(failure.status_code, 500);
    assert_eq!(failure.raw_message, "job failed");
}

#[test]
fn test_payload_rule_with_kind_and_refinement() {
    let classifier = ErrorClassifier::builder()
        .payload_rule(PayloadFailureRule::field_present("errorresponse").with_kind(FailureKind::Unrecognized))
        .rule(RefinementRule::message_contains("does not exist", FailureKind::NotFound))
        .message_paths(["errorresponse.errortext"])
        .build();
    let body = json!({"errorresponse": {"errortext": "vm does not exist"}}).to_string();

    let failure = classifier
        .inspect(200, &HeaderMap::new(), Some(body.as_bytes()))
        .unwrap();
    assert_eq!(failure.kind, FailureKind::NotFound);
    assert_eq!(failure.raw_message, "vm does not exist");
}

#[test]
fn test_inspect_non_success_always_classifies() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.inspect(503, &HeaderMap::new(), None).unwrap();
    assert_eq!(failure.kind, FailureKind::ServerFault);
}

#[test]
fn test_classify_success_without_payload_failure_is_unrecognized() {
    let classifier = ErrorClassifier::new();
    let failure = classifier.classify(200, &HeaderMap::new(), Some(b"{}".as_slice()));
    assert_eq!(failure.kind, FailureKind::Unrecognized);
    assert_eq!(failure.status_code, 200);
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn test_failure_kind_transience() {
    assert!(FailureKind::RateLimited.is_transient());
    assert!(FailureKind::ServerFault.is_transient());
    assert!(!FailureKind::Unauthorized.is_transient());
    assert!(!FailureKind::NotFound.is_transient());
    assert!(!FailureKind::Conflict.is_transient());
    assert!(!FailureKind::Unrecognized.is_transient());
}

#[test]
fn test_network_failure_display() {
    let failure = ClassifiedFailure::network("connection refused");
    assert!(failure.is_network());
    assert_eq!(failure.kind, FailureKind::ServerFault);
    assert_eq!(failure.to_string(), "ServerFault (network): connection refused");
}
