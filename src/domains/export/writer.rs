use async_trait::async_trait;
use serde_json::Value;

use crate::config::ExportConfig;
use crate::domains::export::types::*;
use crate::domains::export::writers::{CsvWriter, ExcelWriter, HtmlDocumentWriter, JsonWriter};

/// Format-specific encoder: turns filtered records into a file payload.
///
/// Returns `Ok(None)` when the writer declines to produce a file (empty input
/// for the delimited formats).
#[async_trait]
pub trait ExportWriter: Send + Sync {
    async fn encode(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError>;

    fn format(&self) -> ExportFormat;
}

/// Writer factory for creating format-specific writers
pub struct WriterFactory;

impl WriterFactory {
    /// `title` is used by the document format; an empty title falls back to
    /// the configured default.
    pub fn create_writer(format: ExportFormat, config: &ExportConfig, title: &str) -> Box<dyn ExportWriter> {
        match format {
            ExportFormat::Csv => Box::new(CsvWriter::new()),
            ExportFormat::Json => Box::new(JsonWriter::new()),
            ExportFormat::Pdf => {
                let title = if title.trim().is_empty() { config.default_title.as_str() } else { title };
                Box::new(HtmlDocumentWriter::new(title, config.pdf_assembly_delay()))
            }
            ExportFormat::Excel => Box::new(ExcelWriter::new()),
        }
    }
}

/// Column names, taken from the first record's keys.
pub fn header_keys(records: &[ExportRecord]) -> Vec<String> {
    records
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default()
}

/// Plain-text rendering of one cell.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // For nested values, fall back to compact JSON
        Some(other) => other.to_string(),
    }
}

/// Cells of `record` in header order.
pub fn row_cells(record: &ExportRecord, headers: &[String]) -> Vec<String> {
    headers.iter().map(|key| cell_text(record.get(key))).collect()
}
