//! Tests for decoder module

use super::*;
use crate::error::Error;
use serde_json::json;

// ============================================================================
// JsonDecoder Tests
// ============================================================================

#[test]
fn test_json_decoder_top_level_array() {
    let decoder = JsonDecoder::new();
    let records = decoder.decode(br#"[{"id": 1}, {"id": 2}]"#).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["id"], 2);
}

#[test]
fn test_json_decoder_with_path() {
    let decoder = JsonDecoder::with_path("servers");
    let body = json!({
        "servers": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
        "next_marker": "m1"
    });
    let records = decoder.decode_value(&body).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["id"], "a");
    assert_eq!(decoder.record_path(), Some("servers"));
}

#[test]
fn test_json_decoder_nested_path_with_prefix() {
    let decoder = JsonDecoder::with_path("$.result.items");
    let body = json!({"result": {"items": [{"id": 1}]}});
    let records = decoder.decode_value(&body).unwrap();
    assert_eq!(records, vec![json!({"id": 1})]);
}

#[test]
fn test_json_decoder_missing_path_is_empty() {
    let decoder = JsonDecoder::with_path("volumes");
    let records = decoder.decode_value(&json!({"servers": []})).unwrap();
    assert!(records.is_empty());

    let records = decoder.decode_value(&json!({"volumes": null})).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_json_decoder_single_object_at_path() {
    let decoder = JsonDecoder::with_path("server");
    let records = decoder.decode_value(&json!({"server": {"id": 9}})).unwrap();
    assert_eq!(records, vec![json!({"id": 9})]);
}

#[test]
fn test_json_decoder_wildcard_path() {
    let decoder = JsonDecoder::with_path("$.regions[*].name");
    let body = json!({"regions": [{"name": "us-east"}, {"name": "eu-west"}]});
    let records = decoder.decode_value(&body).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_json_decoder_wildcard_without_root() {
    let decoder = JsonDecoder::parse("zones[*]").unwrap();
    assert_eq!(decoder.record_path(), Some("$.zones[*]"));

    let body = json!({"zones": [{"id": "a"}, {"id": "b"}]});
    let records = decoder.decode_value(&body).unwrap();
    assert_eq!(records, vec![json!({"id": "a"}), json!({"id": "b"})]);
}

#[test]
fn test_json_decoder_rejects_bad_query() {
    let err = JsonDecoder::parse("$.items[*").unwrap_err();
    assert!(matches!(err, Error::JsonPath { .. }));
}

#[test]
fn test_json_decoder_invalid_body() {
    let decoder = JsonDecoder::new();
    let err = decoder.decode(b"not json").unwrap_err();
    assert!(err.to_string().contains("Failed to parse JSON"));
}

// ============================================================================
// Path Helper Tests
// ============================================================================

#[test]
fn test_lookup_indexing() {
    let body = json!({"items": [{"id": "first"}, {"id": "middle"}, {"id": "last"}]});
    assert_eq!(lookup(&body, "items[0].id"), Some(&json!("first")));
    assert_eq!(lookup(&body, "$.items[-1].id"), Some(&json!("last")));
    assert_eq!(lookup(&body, "items[7].id"), None);
    assert_eq!(lookup(&body, "items[-9].id"), None);
    assert_eq!(lookup(&body, "items[x]"), None);
    assert_eq!(lookup(&body, "items.id"), None);
}

#[test]
fn test_lookup_string_scalars() {
    let body = json!({
        "meta": {"next": "abc", "total": 42, "more": true, "nothing": null}
    });
    assert_eq!(lookup_string(&body, "meta.next"), Some("abc".to_string()));
    assert_eq!(lookup_string(&body, "$.meta.total"), Some("42".to_string()));
    assert_eq!(lookup_string(&body, "meta.more"), Some("true".to_string()));
    assert_eq!(lookup_string(&body, "meta.nothing"), None);
    assert_eq!(lookup_string(&body, "meta"), None);
    assert_eq!(lookup_string(&body, "missing.path"), None);
}
