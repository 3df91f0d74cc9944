use async_trait::async_trait;

use crate::domains::export::types::*;
use crate::domains::export::writer::{header_keys, row_cells, ExportWriter};
use crate::domains::export::writers::csv_writer::write_delimited;

/// Tab-separated text saved as `.xls` so spreadsheet apps open it directly.
/// No quoting is applied.
#[derive(Debug, Clone, Default)]
pub struct ExcelWriter;

impl ExcelWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_records(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError> {
        if records.is_empty() {
            return Ok(None);
        }

        let headers = header_keys(records);
        let rows: Vec<Vec<String>> = records.iter().map(|record| row_cells(record, &headers)).collect();
        let content = write_delimited(&headers, &rows, '\t');

        Ok(Some(ExportResult {
            content: content.into_bytes(),
            filename: ExportFormat::Excel.filename_for(base_filename),
            mime_type: ExportFormat::Excel.mime_type(),
        }))
    }
}

#[async_trait]
impl ExportWriter for ExcelWriter {
    async fn encode(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError> {
        self.encode_records(records, base_filename)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Excel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tab_separated_without_quoting() {
        let records = vec![
            json!({"name": "Alice Smith", "city": "London, UK"}).as_object().cloned().unwrap(),
            json!({"name": "Bob", "city": "Leeds"}).as_object().cloned().unwrap(),
        ];
        let result = ExcelWriter::new().encode_records(&records, "movers").unwrap().unwrap();
        let text = String::from_utf8(result.content).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["name\tcity", "Alice Smith\tLondon, UK", "Bob\tLeeds"]);
        assert_eq!(result.filename, "movers.xls");
        assert_eq!(result.mime_type, "application/vnd.ms-excel");
    }

    #[test]
    fn test_single_column_with_blank_cells_stays_unquoted() {
        let records = vec![
            json!({"note": "x"}).as_object().cloned().unwrap(),
            json!({"note": ""}).as_object().cloned().unwrap(),
            json!({"note": null}).as_object().cloned().unwrap(),
        ];
        let result = ExcelWriter::new().encode_records(&records, "notes").unwrap().unwrap();
        assert_eq!(String::from_utf8(result.content).unwrap(), "note\nx\n\n");
    }

    #[test]
    fn test_empty_input_produces_no_file() {
        assert!(ExcelWriter::new().encode_records(&[], "empty").unwrap().is_none());
    }
}
