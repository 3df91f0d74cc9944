use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domains::core::file_delivery_service::FileDeliveryError;
use crate::errors::ValidationError;

/// One exportable row: field name to scalar value, in insertion order.
pub type ExportRecord = serde_json::Map<String, serde_json::Value>;

/// Export formats offered by the export dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    /// Rendered as a styled HTML document, saved with an `.html` extension.
    Pdf,
    /// Tab-separated text saved with an `.xls` extension.
    Excel,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Csv,
        ExportFormat::Json,
        ExportFormat::Pdf,
        ExportFormat::Excel,
    ];

    /// Get file extension for this format
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "html",
            ExportFormat::Excel => "xls",
        }
    }

    pub fn mime_type(&self) -> String {
        match self {
            ExportFormat::Csv => mime::TEXT_CSV_UTF_8.to_string(),
            ExportFormat::Json => mime::APPLICATION_JSON.to_string(),
            ExportFormat::Pdf => mime::TEXT_HTML.to_string(),
            ExportFormat::Excel => "application/vnd.ms-excel".to_string(),
        }
    }

    /// Label shown in the format picker and in notices.
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
            ExportFormat::Pdf => "PDF",
            ExportFormat::Excel => "Excel",
        }
    }

    pub fn filename_for(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.file_extension())
    }
}

/// Named lookback windows offered by the date range picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DateRangeFilter {
    #[default]
    All,
    Today,
    Week,
    Month,
    Quarter,
    Year,
}

impl DateRangeFilter {
    pub const ALL: [DateRangeFilter; 6] = [
        DateRangeFilter::All,
        DateRangeFilter::Today,
        DateRangeFilter::Week,
        DateRangeFilter::Month,
        DateRangeFilter::Quarter,
        DateRangeFilter::Year,
    ];

    /// Lookback window in whole days; `None` means no filtering.
    pub fn lookback_days(&self) -> Option<i64> {
        match self {
            DateRangeFilter::All => None,
            DateRangeFilter::Today => Some(1),
            DateRangeFilter::Week => Some(7),
            DateRangeFilter::Month => Some(30),
            DateRangeFilter::Quarter => Some(90),
            DateRangeFilter::Year => Some(365),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateRangeFilter::All => "All time",
            DateRangeFilter::Today => "Today",
            DateRangeFilter::Week => "Last 7 days",
            DateRangeFilter::Month => "Last 30 days",
            DateRangeFilter::Quarter => "Last 90 days",
            DateRangeFilter::Year => "Last 365 days",
        }
    }
}

/// Generated file payload. Lives only until it has been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub content: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

/// Where the pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExportStage {
    #[default]
    Idle,
    Filtering,
    Encoding,
    Downloading,
    Aborted,
}

/// Immutable export dialog state. Every transition returns a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportState {
    pub format: ExportFormat,
    pub date_range: DateRangeFilter,
    pub dialog_open: bool,
    pub busy: bool,
    pub stage: ExportStage,
}

impl ExportState {
    pub fn new(format: ExportFormat, date_range: DateRangeFilter) -> Self {
        Self {
            format,
            date_range,
            ..Self::default()
        }
    }

    pub fn with_format(self, format: ExportFormat) -> Self {
        Self { format, ..self }
    }

    pub fn with_date_range(self, date_range: DateRangeFilter) -> Self {
        Self { date_range, ..self }
    }

    pub fn open_dialog(self) -> Self {
        Self { dialog_open: true, ..self }
    }

    pub fn close_dialog(self) -> Self {
        Self { dialog_open: false, ..self }
    }

    /// Busy state entered when an export is triggered.
    pub fn begin(self) -> Self {
        Self {
            busy: true,
            stage: ExportStage::Filtering,
            ..self
        }
    }

    pub fn advance(self, stage: ExportStage) -> Self {
        Self { stage, ..self }
    }

    /// Back to idle with the busy flag cleared.
    pub fn finish(self) -> Self {
        Self {
            busy: false,
            stage: ExportStage::Idle,
            ..self
        }
    }
}

/// Filename stem and display title supplied by the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTarget {
    pub filename_stem: String,
    pub title: String,
}

impl ExportTarget {
    pub fn new(filename_stem: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            filename_stem: filename_stem.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// User-facing toast produced by an export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl ExportNotice {
    pub fn exported(record_count: usize, format: ExportFormat) -> Self {
        let noun = if record_count == 1 { "record" } else { "records" };
        Self {
            level: NoticeLevel::Success,
            message: format!("Exported {} {} as {}", record_count, noun, format.label()),
        }
    }

    pub fn no_data() -> Self {
        Self {
            level: NoticeLevel::Info,
            message: "No data available for the selected date range".to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            level: NoticeLevel::Error,
            message: "Export failed. Please try again.".to_string(),
        }
    }
}

/// Terminal result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ExportOutcome {
    #[serde(rename_all = "camelCase")]
    Completed {
        record_count: usize,
        format: ExportFormat,
        filename: String,
        bytes_written: u64,
        checksum: String,
    },
    NoData,
    Failed,
    /// Trigger arrived while another export was in flight.
    Ignored,
}

/// Everything the host needs after a trigger: next state, outcome, notice and
/// the stages the pipeline walked through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRun {
    pub state: ExportState,
    pub outcome: ExportOutcome,
    pub notice: Option<ExportNotice>,
    pub stages: Vec<ExportStage>,
}

/// Comprehensive error types for export operations
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filter left nothing to export
    #[error("No records matched the selected date range")]
    EmptyResult,
    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Delivery backend failed
    #[error("Delivery error: {0}")]
    Delivery(#[from] FileDeliveryError),
    /// Host supplied an unusable filename or title
    #[error("Invalid export target: {0}")]
    InvalidTarget(#[from] ValidationError),
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(error: serde_json::Error) -> Self {
        ExportError::Serialization(error.to_string())
    }
}
