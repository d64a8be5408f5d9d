//! Uniform row/meta container produced by the report runner.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::services::exporter::ReportExporter;

/// The output of one report execution: normalized rows plus metadata
/// (pagination info when the query was paginated).
#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub name: String,
    pub slug: String,
    pub rows: Vec<JsonValue>,
    pub meta: JsonValue,
}

impl ReportResult {
    pub fn new(name: &str, slug: &str, rows: Vec<JsonValue>, meta: JsonValue) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            rows,
            meta,
        }
    }

    /// Format renderers over this result.
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }

    /// Compact JSON of the whole result object (name, slug, rows, meta).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    // Convenience pass-throughs with the conventional defaults.

    pub fn to_csv(&self) -> String {
        self.exporter().to_csv(',', '"')
    }

    pub fn to_xml(&self) -> String {
        self.exporter().to_xml("report", "row")
    }

    pub fn to_html_table(&self) -> String {
        self.exporter().to_html_table()
    }

    pub fn to_json_api(&self, resource_type: &str) -> JsonValue {
        self.exporter().to_json_api(resource_type)
    }

    pub fn to_data_tables(&self) -> JsonValue {
        self.exporter().to_data_tables()
    }
}
