//! CSV export for spreadsheets.

use crate::results::ShapedTable;
use crate::types::{QueryGenError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Encoded CSV attachment of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvAttachment {
    pub base64: String,
    pub filename: String,
}

impl CsvAttachment {
    /// Attachment of an empty result: no data, no name.
    pub fn empty() -> Self {
        Self {
            base64: String::new(),
            filename: String::new(),
        }
    }
}

/// CSV exporter.
pub struct CsvExporter;

impl CsvExporter {
    /// Render a table as CSV bytes (header + rows).
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::InternalError` if the writer fails
    pub fn export(table: &ShapedTable) -> Result<Vec<u8>> {
        Self::export_with_delimiter(table, b',')
    }

    /// Export with custom delimiter.
    ///
    /// # Arguments
    ///
    /// * `table` - Shaped rows
    /// * `delimiter` - Field delimiter (default: ',')
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::InternalError` if the writer fails
    pub fn export_with_delimiter(table: &ShapedTable, delimiter: u8) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        writer.write_record(&table.columns).map_err(csv_error)?;

        for row in &table.rows {
            let record = table
                .columns
                .iter()
                .map(|column| row.get(column).map(cell).unwrap_or_default());
            writer.write_record(record).map_err(csv_error)?;
        }

        writer
            .into_inner()
            .map_err(|e| QueryGenError::InternalError(format!("CSV flush failed: {e}")))
    }

    /// CSV as base64 with a random `result_<8 hex>.csv` name.
    ///
    /// An empty table yields [`CsvAttachment::empty`].
    pub fn attachment(table: &ShapedTable) -> Result<CsvAttachment> {
        if table.rows.is_empty() {
            return Ok(CsvAttachment::empty());
        }

        let bytes = Self::export(table)?;
        Ok(CsvAttachment {
            base64: STANDARD.encode(bytes),
            filename: random_filename(),
        })
    }
}

fn random_filename() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("result_{}.csv", &id[..8])
}

fn cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn csv_error(err: csv::Error) -> QueryGenError {
    QueryGenError::InternalError(format!("CSV export failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn table(rows: Vec<JsonValue>, columns: &[&str]) -> ShapedTable {
        ShapedTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| match row {
                    JsonValue::Object(map) => map,
                    _ => Map::new(),
                })
                .collect(),
            truncated: false,
        }
    }

    #[test]
    fn test_export_quotes_only_when_needed() {
        let t = table(
            vec![
                json!({"name": "Ada", "city": "New York, NY", "age": 36}),
                json!({"name": "Bob", "city": null, "age": 41}),
            ],
            &["name", "city", "age"],
        );

        let csv = String::from_utf8(CsvExporter::export(&t).unwrap()).unwrap();
        assert_eq!(csv, "name,city,age\nAda,\"New York, NY\",36\nBob,,41\n");
    }

    #[test]
    fn test_arrays_are_json_text() {
        let t = table(vec![json!({"tags": ["a", "b"]})], &["tags"]);
        let csv = String::from_utf8(CsvExporter::export(&t).unwrap()).unwrap();
        assert_eq!(csv, "tags\n\"[\"\"a\"\",\"\"b\"\"]\"\n");
    }

    #[test]
    fn test_attachment_name_and_encoding() {
        let t = table(vec![json!({"id": 1})], &["id"]);
        let attachment = CsvExporter::attachment(&t).unwrap();

        assert_eq!(STANDARD.decode(&attachment.base64).unwrap(), b"id\n1\n");
        assert!(attachment.filename.starts_with("result_"));
        assert!(attachment.filename.ends_with(".csv"));
        assert_eq!(attachment.filename.len(), "result_".len() + 8 + ".csv".len());
    }

    #[test]
    fn test_empty_table_has_empty_attachment() {
        let t = table(vec![], &["id"]);
        assert_eq!(CsvExporter::attachment(&t).unwrap(), CsvAttachment::empty());
    }
}
