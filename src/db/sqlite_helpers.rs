//! SQLite helper utilities for type conversion.
//!
//! JSON columns are stored as TEXT and timestamps as RFC 3339 strings.
//! Report rows come back with whatever shape the stored query selects, so
//! row decoding dispatches on the runtime value type instead of a typed
//! struct.

use anyhow::{Result, anyhow};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

// ============================================================================
// Timestamp Helpers (stored as RFC 3339 TEXT in SQLite)
// ============================================================================

/// Current UTC timestamp as an RFC 3339 string for SQLite storage.
#[inline]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 string back to a DateTime.
#[inline]
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", s, e))
}

// ============================================================================
// JSON Helpers (stored as TEXT in SQLite)
// ============================================================================

/// Serialize any serializable value to a JSON string.
#[inline]
pub fn to_json_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Deserialize an optional JSON TEXT column. NULL, empty and invalid
/// content all decode to the given fallback.
#[inline]
pub fn json_from_text(s: Option<&str>, fallback: JsonValue) -> JsonValue {
    match s {
        Some(s) if !s.trim().is_empty() => serde_json::from_str(s).unwrap_or(fallback),
        _ => fallback,
    }
}

// ============================================================================
// Dynamic Row Decoding
// ============================================================================

/// Decode a row of unknown shape into a JSON object, preserving column order.
pub fn row_to_json(row: &SqliteRow) -> JsonValue {
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        object.insert(
            column.name().to_string(),
            column_to_json(row, column.ordinal()),
        );
    }
    JsonValue::Object(object)
}

/// Decode a single column by its runtime SQLite datatype. Unknown declared
/// types fall back to a string read; anything undecodable becomes null.
fn column_to_json(row: &SqliteRow, index: usize) -> JsonValue {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) => {
            if raw.is_null() {
                return JsonValue::Null;
            }
            raw.type_info().name().to_uppercase()
        }
        Err(_) => return JsonValue::Null,
    };

    match type_name.as_str() {
        "BOOLEAN" | "BOOL" => row
            .try_get::<bool, _>(index)
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get::<f64, _>(index)
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            })
            .unwrap_or(JsonValue::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_datetime_roundtrip() {
        let dt = Utc::now();
        let s = dt.to_rfc3339();
        let parsed = str_to_datetime(&s).unwrap();
        assert_eq!(dt.timestamp(), parsed.timestamp());
    }

    #[test]
    fn test_invalid_datetime() {
        assert!(str_to_datetime("not-a-timestamp").is_err());
    }

    #[test]
    fn test_json_text_roundtrip() {
        let value = json!({"active": {"default": 1}});
        let text = to_json_text(&value);
        let parsed = json_from_text(Some(&text), json!({}));
        assert_eq!(value, parsed);
    }

    #[test]
    fn test_json_from_text_fallback() {
        assert_eq!(json_from_text(None, json!({})), json!({}));
        assert_eq!(json_from_text(Some(""), json!({})), json!({}));
        assert_eq!(json_from_text(Some("{broken"), json!({})), json!({}));
    }
}
