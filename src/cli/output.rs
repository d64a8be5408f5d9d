//! Table rendering for CLI output.

use comfy_table::{Table, presets::UTF8_FULL};
use serde_json::Value as JsonValue;

use crate::services::result::ReportResult;

/// Print result rows as a table, with a pagination summary when present.
pub fn print_table(result: &ReportResult) {
    if result.rows.is_empty() {
        println!("No rows.");
        return;
    }

    let headers: Vec<&str> = result.rows[0]
        .as_object()
        .map(|object| object.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(headers.clone());

    for row in &result.rows {
        table.add_row(headers.iter().map(|h| cell(row.get(*h))));
    }

    println!("{table}");

    if let Some(pagination) = result.meta.get("pagination") {
        println!(
            "page {}/{} ({} rows total)",
            pagination
                .get("current_page")
                .and_then(JsonValue::as_i64)
                .unwrap_or(1),
            pagination
                .get("last_page")
                .and_then(JsonValue::as_i64)
                .unwrap_or(1),
            pagination
                .get("total")
                .and_then(JsonValue::as_i64)
                .unwrap_or(0),
        );
    }
}

fn cell(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
