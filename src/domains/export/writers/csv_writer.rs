use async_trait::async_trait;

use crate::domains::export::types::*;
use crate::domains::export::writer::{header_keys, row_cells, ExportWriter};

/// Comma-separated writer.
///
/// A cell containing a comma is wrapped in double quotes; embedded quotes are
/// left as they are and nothing else is ever quoted.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    delimiter: char,
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn quote_cell(cell: String) -> String {
        if cell.contains(',') {
            format!("\"{}\"", cell)
        } else {
            cell
        }
    }

    pub fn encode_records(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError> {
        if records.is_empty() {
            return Ok(None);
        }

        let headers = header_keys(records);
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|record| row_cells(record, &headers).into_iter().map(Self::quote_cell).collect())
            .collect();

        let content = write_delimited(&headers, &rows, self.delimiter);
        log::debug!("CSV encoded {} records ({} bytes)", records.len(), content.len());

        Ok(Some(ExportResult {
            content: content.into_bytes(),
            filename: ExportFormat::Csv.filename_for(base_filename),
            mime_type: ExportFormat::Csv.mime_type(),
        }))
    }
}

#[async_trait]
impl ExportWriter for CsvWriter {
    async fn encode(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError> {
        self.encode_records(records, base_filename)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Join header and rows with `delimiter`, one line per row, no trailing newline.
///
/// Cells are written verbatim; callers decide on any quoting.
pub(crate) fn write_delimited<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>], delimiter: char) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(join_cells(headers, delimiter));
    for row in rows {
        lines.push(join_cells(row, delimiter));
    }
    lines.join("\n")
}

fn join_cells<S: AsRef<str>>(cells: &[S], delimiter: char) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push(delimiter);
        }
        line.push_str(cell.as_ref());
    }
    line
}
