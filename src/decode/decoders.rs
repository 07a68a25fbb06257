//! Decoder implementations

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use serde_json::Value;

// ============================================================================
// JSON Decoder
// ============================================================================

/// Where the records of a page live in the body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum RecordPath {
    /// The body itself (an array, or one record)
    #[default]
    Body,
    /// Dotted field walk such as `result.items`
    Field(String),
    /// Wildcard query handed to jsonpath-rust
    Query(String),
}

impl RecordPath {
    fn parse(path: &str) -> Self {
        if path.contains('*') {
            let query = if path.starts_with('$') {
                path.to_string()
            } else {
                format!("$.{path}")
            };
            Self::Query(query)
        } else {
            Self::Field(path.to_string())
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Body => None,
            Self::Field(path) | Self::Query(path) => Some(path),
        }
    }
}

/// Pulls the item array of one page out of a JSON body
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    path: RecordPath,
}

impl JsonDecoder {
    /// Decoder treating the whole body as the records
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder reading records at `path`.
    ///
    /// Paths without `*` are walked field by field; wildcard paths are
    /// evaluated as JSONPath.
    pub fn with_path(path: impl AsRef<str>) -> Self {
        Self {
            path: RecordPath::parse(path.as_ref()),
        }
    }

    /// Like [`JsonDecoder::with_path`], but rejects a malformed JSONPath up front
    pub fn parse(path: impl AsRef<str>) -> Result<Self> {
        let decoder = Self::with_path(path);
        if let RecordPath::Query(query) = &decoder.path {
            compile(query)?;
        }
        Ok(decoder)
    }

    /// The configured record path
    pub fn record_path(&self) -> Option<&str> {
        self.path.as_str()
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode_value(&self, body: &Value) -> Result<Vec<Value>> {
        let found = match &self.path {
            RecordPath::Body => body.clone(),
            RecordPath::Field(path) => lookup(body, path).cloned().unwrap_or(Value::Null),
            RecordPath::Query(query) => compile(query)?.find(body),
        };

        Ok(match found {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            record => vec![record],
        })
    }
}

fn compile(query: &str) -> Result<jsonpath_rust::JsonPath> {
    jsonpath_rust::JsonPath::try_from(query).map_err(|e| Error::JsonPath {
        message: format!("Invalid JSONPath '{query}': {e}"),
    })
}

// ============================================================================
// Path Lookup
// ============================================================================

/// Borrow the value at a dotted `path`.
///
/// A leading `$.` is ignored. Segments may index arrays, counting from the
/// end when negative: `items[0].id`, `items[-1]`.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    path.split('.').try_fold(value, |current, segment| {
        let Some((field, rest)) = segment.split_once('[') else {
            return current.get(segment);
        };

        let current = if field.is_empty() {
            current
        } else {
            current.get(field)?
        };
        let index: i64 = rest.strip_suffix(']')?.parse().ok()?;
        let items = current.as_array()?;
        let position = if index < 0 {
            items.len().checked_sub(usize::try_from(index.unsigned_abs()).ok()?)?
        } else {
            usize::try_from(index).ok()?
        };
        items.get(position)
    })
}

/// The scalar at `path` as a string.
///
/// Objects, arrays and null are not scalars and give `None`.
pub fn lookup_string(value: &Value, path: &str) -> Option<String> {
    match lookup(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
