use async_trait::async_trait;

use crate::domains::export::types::*;
use crate::domains::export::writer::ExportWriter;

/// Pretty-printed JSON array (2-space indent), records serialized verbatim.
#[derive(Debug, Clone, Default)]
pub struct JsonWriter;

impl JsonWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_records(&self, records: &[ExportRecord], base_filename: &str) -> Result<ExportResult, ExportError> {
        let content = serde_json::to_vec_pretty(records)?;

        Ok(ExportResult {
            content,
            filename: ExportFormat::Json.filename_for(base_filename),
            mime_type: ExportFormat::Json.mime_type(),
        })
    }
}

#[async_trait]
impl ExportWriter for JsonWriter {
    async fn encode(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError> {
        self.encode_records(records, base_filename).map(Some)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}
