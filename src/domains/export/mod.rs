pub mod filter;
pub mod service;
pub mod types;
pub mod writer;
pub mod writers;

pub use filter::{filter_by_date_range, preview_count};
pub use service::{ExportService, ExportServiceImpl};
pub use types::{
    DateRangeFilter, ExportError, ExportFormat, ExportNotice, ExportOutcome, ExportRecord, ExportRun,
    ExportStage, ExportState, ExportTarget,
};
pub use writer::{ExportWriter, WriterFactory};
