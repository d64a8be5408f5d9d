//! Stateless format renderers over a report result.
//!
//! Every renderer reads the borrowed result and produces output
//! independently; none of them mutate anything.

use std::io::Cursor;

use anyhow::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Value as JsonValue, json};

use crate::error::ReportsError;
use crate::services::result::ReportResult;

pub struct ReportExporter<'a> {
    result: &'a ReportResult,
}

impl<'a> ReportExporter<'a> {
    pub fn new(result: &'a ReportResult) -> Self {
        Self { result }
    }

    /// Column names, taken from the first row.
    fn headers(&self) -> Vec<&str> {
        self.result
            .rows
            .first()
            .and_then(|row| row.as_object())
            .map(|object| object.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// CSV with a header line. Fields containing the delimiter, the quote
    /// character, or line breaks are quoted with the quote char doubled
    /// inside. Rows are joined with `\n`; an empty result is an empty string.
    pub fn to_csv(&self, delimiter: char, quote: char) -> String {
        let rows = &self.result.rows;
        if rows.is_empty() {
            return String::new();
        }

        let headers = self.headers();
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(csv_line(
            headers.iter().map(|h| h.to_string()),
            delimiter,
            quote,
        ));

        for row in rows {
            let values = headers
                .iter()
                .map(|h| cell_text(row.get(*h).unwrap_or(&JsonValue::Null)));
            lines.push(csv_line(values, delimiter, quote));
        }

        lines.join("\n")
    }

    /// Rows nested under `<root><row_node><column>value</column>...`, plus a
    /// `<meta>` element when meta is non-empty. Non-scalar cell values are
    /// serialized as JSON text.
    pub fn to_xml(&self, root: &str, row_node: &str) -> String {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .ok();
        writer.write_event(Event::Start(BytesStart::new(root))).ok();

        for row in &self.result.rows {
            writer
                .write_event(Event::Start(BytesStart::new(row_node)))
                .ok();
            if let Some(object) = row.as_object() {
                for (key, value) in object {
                    write_text_element(&mut writer, key, &cell_text(value));
                }
            }
            writer
                .write_event(Event::End(BytesEnd::new(row_node)))
                .ok();
        }

        if let Some(meta) = self.result.meta.as_object() {
            if !meta.is_empty() {
                writer
                    .write_event(Event::Start(BytesStart::new("meta")))
                    .ok();
                for (key, value) in meta {
                    write_text_element(&mut writer, key, &cell_text(value));
                }
                writer.write_event(Event::End(BytesEnd::new("meta"))).ok();
            }
        }

        writer.write_event(Event::End(BytesEnd::new(root))).ok();

        String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
    }

    /// A plain `<table>` with escaped cells. An empty result renders empty
    /// thead/tbody so the markup stays embeddable.
    pub fn to_html_table(&self) -> String {
        let rows = &self.result.rows;
        if rows.is_empty() {
            return "<table><thead></thead><tbody></tbody></table>".to_string();
        }

        let headers = self.headers();
        let head: String = headers
            .iter()
            .map(|h| format!("<th>{}</th>", html_escape(h)))
            .collect();

        let mut body = String::new();
        for row in rows {
            let cells: String = headers
                .iter()
                .map(|h| {
                    format!(
                        "<td>{}</td>",
                        html_escape(&cell_text(row.get(*h).unwrap_or(&JsonValue::Null)))
                    )
                })
                .collect();
            body.push_str(&format!("<tr>{cells}</tr>"));
        }

        format!("<table><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>")
    }

    /// JSON:API shape: `{data: [{type, id, attributes}...], meta}`. The id
    /// comes from the row's `id` column, else the 1-based row index, and is
    /// always a string.
    pub fn to_json_api(&self, resource_type: &str) -> JsonValue {
        let data: Vec<JsonValue> = self
            .result
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let id = row
                    .get("id")
                    .map(cell_text)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| (index + 1).to_string());

                json!({
                    "type": resource_type,
                    "id": id,
                    "attributes": row,
                })
            })
            .collect();

        json!({
            "data": data,
            "meta": self.result.meta,
        })
    }

    /// The shape the DataTables widget consumes directly.
    pub fn to_data_tables(&self) -> JsonValue {
        json!({
            "data": self.result.rows,
            "recordsTotal": self.result.rows.len(),
            "recordsFiltered": self.result.rows.len(),
            "meta": self.result.meta,
        })
    }

    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        Err(ReportsError::ExportUnavailable {
            format: "PDF",
            backend: "a PDF rendering backend",
        }
        .into())
    }

    pub fn to_word(&self) -> Result<Vec<u8>> {
        Err(ReportsError::ExportUnavailable {
            format: "DOCX",
            backend: "a Word document backend",
        }
        .into())
    }

    pub fn to_excel(&self) -> Result<Vec<u8>> {
        Err(ReportsError::ExportUnavailable {
            format: "XLSX",
            backend: "a spreadsheet backend",
        }
        .into())
    }
}

/// Render a cell for textual output. Null is empty, scalars print plainly,
/// arrays and objects become JSON text.
fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_line(values: impl Iterator<Item = String>, delimiter: char, quote: char) -> String {
    let fields: Vec<String> = values
        .map(|value| {
            if value.contains(delimiter)
                || value.contains(quote)
                || value.contains('\n')
                || value.contains('\r')
            {
                let doubled = value.replace(quote, &format!("{quote}{quote}"));
                format!("{quote}{doubled}{quote}")
            } else {
                value
            }
        })
        .collect();

    fields.join(&delimiter.to_string())
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) {
    writer.write_event(Event::Start(BytesStart::new(name))).ok();
    writer.write_event(Event::Text(BytesText::new(text))).ok();
    writer.write_event(Event::End(BytesEnd::new(name))).ok();
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
