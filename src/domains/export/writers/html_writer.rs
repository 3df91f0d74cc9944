use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domains::export::types::*;
use crate::domains::export::writer::{header_keys, row_cells, ExportWriter};

/// Printable HTML report behind the "PDF" option.
///
/// Values and title are inserted as-is, without escaping.
#[derive(Debug, Clone)]
pub struct HtmlDocumentWriter {
    title: String,
    assembly_delay: Duration,
}

impl HtmlDocumentWriter {
    pub fn new(title: impl Into<String>, assembly_delay: Duration) -> Self {
        Self {
            title: title.into(),
            assembly_delay,
        }
    }

    pub fn render(&self, records: &[ExportRecord], generated_at: DateTime<Utc>) -> String {
        let headers = header_keys(records);

        let mut table = String::from("<table>\n<thead>\n<tr>\n");
        for header in &headers {
            table.push_str(&format!("    <th>{}</th>\n", header));
        }
        table.push_str("</tr>\n</thead>\n<tbody>\n");
        for record in records {
            table.push_str("<tr>\n");
            for cell in row_cells(record, &headers) {
                table.push_str(&format!("    <td>{}</td>\n", cell));
            }
            table.push_str("</tr>\n");
        }
        table.push_str("</tbody>\n</table>");

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; color: #333; }}
        h1 {{ color: #1f2937; }}
        .generated {{ color: #6b7280; font-size: 12px; margin-bottom: 16px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f4f4f4; font-weight: 600; }}
        tr:nth-child(even) {{ background-color: #fafafa; }}
    </style>
</head>
<body>
<h1>{title}</h1>
<p class="generated">Generated on {generated}</p>
{table}
</body>
</html>"#,
            title = self.title,
            generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            table = table,
        )
    }

    pub fn encode_records_at(
        &self,
        records: &[ExportRecord],
        base_filename: &str,
        generated_at: DateTime<Utc>,
    ) -> ExportResult {
        ExportResult {
            content: self.render(records, generated_at).into_bytes(),
            filename: ExportFormat::Pdf.filename_for(base_filename),
            mime_type: ExportFormat::Pdf.mime_type(),
        }
    }
}

#[async_trait]
impl ExportWriter for HtmlDocumentWriter {
    async fn encode(&self, records: &[ExportRecord], base_filename: &str) -> Result<Option<ExportResult>, ExportError> {
        // Document assembly step; the pipeline waits for it before downloading
        if !self.assembly_delay.is_zero() {
            tokio::time::sleep(self.assembly_delay).await;
        }
        log::debug!("Assembled HTML document '{}' with {} rows", self.title, records.len());
        Ok(Some(self.encode_records_at(records, base_filename, Utc::now())))
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }
}
