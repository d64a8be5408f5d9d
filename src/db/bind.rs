//! Named placeholder expansion and value binding for trusted report SQL.
//!
//! Stored base queries use `:name` placeholders. The driver binds
//! positionally, so the query is rewritten to `?` markers with the name
//! order recorded. This is a literal scanner, not a SQL parser: it only
//! knows enough to skip string literals, comments and `::` casts.

use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

/// Rewrite `:name` placeholders to `?` and return the referenced names in
/// bind order. A name repeated in the query repeats in the output.
pub fn extract_placeholders(sql: &str) -> (String, Vec<String>) {
    let bytes = sql.as_bytes();
    let mut rewritten = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        match bytes[i] {
            // String literals; a doubled quote closes and reopens, which
            // reads the same as staying inside.
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b':' => {
                // `::` is cast syntax, not a placeholder
                if bytes.get(i + 1) == Some(&b':') {
                    i += 2;
                    continue;
                }
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > start {
                    rewritten.push_str(&sql[copied..i]);
                    rewritten.push('?');
                    names.push(sql[start..end].to_string());
                    i = end;
                    copied = i;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    rewritten.push_str(&sql[copied.min(sql.len())..]);
    (rewritten, names)
}

/// Bind a JSON value to the next positional marker. Arrays and objects bind
/// as their compact JSON text.
pub fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &JsonValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}
