use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ExportConfig;
use crate::domains::core::file_delivery_service::{FileDeliveryService, ObjectUrlGuard};
use crate::domains::export::filter::{filter_by_date_range, preview_count};
use crate::domains::export::types::*;
use crate::domains::export::writer::WriterFactory;
use crate::validation::Validate;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[async_trait]
pub trait ExportService: Send + Sync {
    /// Run one export for the current dialog state.
    ///
    /// Never returns an error: every path ends in an `ExportRun` carrying the
    /// next state and, where the user should be told something, a notice.
    async fn run_export(&self, state: ExportState, records: &[ExportRecord], target: &ExportTarget) -> ExportRun;

    /// How many records the current date range would export.
    fn preview_count(&self, state: &ExportState, records: &[ExportRecord]) -> usize;

    /// Whether an export is in flight on this service.
    fn is_exporting(&self) -> bool;
}

/// Single-permit flag, released on drop.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExportServiceImpl {
    delivery: Arc<dyn FileDeliveryService>,
    config: ExportConfig,
    in_flight: AtomicBool,
    clock: Clock,
}

impl ExportServiceImpl {
    pub fn new(delivery: Arc<dyn FileDeliveryService>, config: ExportConfig) -> Self {
        Self {
            delivery,
            config,
            in_flight: AtomicBool::new(false),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for date filtering.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    async fn encode_and_deliver(
        &self,
        state: ExportState,
        stages: &mut Vec<ExportStage>,
        records: &[ExportRecord],
        target: &ExportTarget,
    ) -> Result<ExportOutcome, ExportError> {
        let state = state.advance(ExportStage::Encoding);
        stages.push(state.stage);

        target.validate()?;

        let writer = WriterFactory::create_writer(state.format, &self.config, &target.title);
        let payload = writer
            .encode(records, target.filename_stem.trim())
            .await?
            .ok_or(ExportError::EmptyResult)?;

        let state = state.advance(ExportStage::Downloading);
        stages.push(state.stage);

        let checksum = hex::encode(Sha256::digest(&payload.content));
        let guard = ObjectUrlGuard::create(self.delivery.as_ref(), payload.content, &payload.mime_type)?;
        let receipt = guard.download(&payload.filename).await?;
        guard.revoke();

        log::debug!("Export delivered to {}", receipt.location);

        Ok(ExportOutcome::Completed {
            record_count: records.len(),
            format: state.format,
            filename: receipt.filename,
            bytes_written: receipt.size_bytes,
            checksum,
        })
    }
}

#[async_trait]
impl ExportService for ExportServiceImpl {
    async fn run_export(&self, state: ExportState, records: &[ExportRecord], target: &ExportTarget) -> ExportRun {
        let ignored = |state: ExportState| ExportRun {
            state,
            outcome: ExportOutcome::Ignored,
            notice: None,
            stages: Vec::new(),
        };

        if state.busy {
            log::debug!("Export trigger ignored: state is busy");
            return ignored(state);
        }
        let Some(_permit) = InFlightGuard::acquire(&self.in_flight) else {
            log::debug!("Export trigger ignored: another export is in flight");
            return ignored(state);
        };

        let mut stages = Vec::new();
        let state = state.begin();
        stages.push(state.stage);

        let now = (self.clock)();
        let filtered = filter_by_date_range(records, state.date_range, now);
        log::debug!(
            "Export filter {:?} kept {} of {} records",
            state.date_range,
            filtered.len(),
            records.len()
        );

        if filtered.is_empty() {
            stages.push(ExportStage::Aborted);
            stages.push(ExportStage::Idle);
            log::info!("Export aborted: no records for {:?}", state.date_range);
            return ExportRun {
                state: state.advance(ExportStage::Aborted).finish(),
                outcome: ExportOutcome::NoData,
                notice: Some(ExportNotice::no_data()),
                stages,
            };
        }

        let result = self.encode_and_deliver(state, &mut stages, &filtered, target).await;
        stages.push(ExportStage::Idle);

        match result {
            Ok(outcome) => {
                log::info!("Exported {} records as {}", filtered.len(), state.format.label());
                ExportRun {
                    state: state.finish().close_dialog(),
                    outcome,
                    notice: Some(ExportNotice::exported(filtered.len(), state.format)),
                    stages,
                }
            }
            Err(ExportError::EmptyResult) => ExportRun {
                state: state.finish(),
                outcome: ExportOutcome::NoData,
                notice: Some(ExportNotice::no_data()),
                stages,
            },
            Err(e) => {
                log::error!("Export as {} failed: {}", state.format.label(), e);
                ExportRun {
                    state: state.finish(),
                    outcome: ExportOutcome::Failed,
                    notice: Some(ExportNotice::failed()),
                    stages,
                }
            }
        }
    }

    fn preview_count(&self, state: &ExportState, records: &[ExportRecord]) -> usize {
        preview_count(records, state.date_range, (self.clock)())
    }

    fn is_exporting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::file_delivery_service::{
        DeliveryReceipt, FileDeliveryError, FileDeliveryResult, ObjectUrl,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory delivery double that remembers every download.
    #[derive(Default)]
    struct RecordingDelivery {
        staged: Mutex<HashMap<String, Vec<u8>>>,
        downloads: Mutex<Vec<(String, Vec<u8>)>>,
        created: Mutex<usize>,
        fail_downloads: bool,
    }

    impl RecordingDelivery {
        fn failing() -> Self {
            Self {
                fail_downloads: true,
                ..Self::default()
            }
        }

        fn downloads(&self) -> Vec<(String, Vec<u8>)> {
            self.downloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FileDeliveryService for RecordingDelivery {
        fn create_object_url(&self, data: Vec<u8>, _mime_type: &str) -> FileDeliveryResult<ObjectUrl> {
            let url = ObjectUrl::generate("test");
            self.staged.lock().unwrap().insert(url.as_str().to_string(), data);
            *self.created.lock().unwrap() += 1;
            Ok(url)
        }

        async fn trigger_download(&self, url: &ObjectUrl, filename: &str) -> FileDeliveryResult<DeliveryReceipt> {
            if self.fail_downloads {
                return Err(FileDeliveryError::Other("disk full".to_string()));
            }
            let data = self
                .staged
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FileDeliveryError::UrlNotFound(url.to_string()))?;
            let size_bytes = data.len() as u64;
            self.downloads.lock().unwrap().push((filename.to_string(), data));
            Ok(DeliveryReceipt {
                filename: filename.to_string(),
                location: format!("memory://{}", filename),
                size_bytes,
            })
        }

        fn revoke_object_url(&self, url: &ObjectUrl) {
            self.staged.lock().unwrap().remove(url.as_str());
        }

        fn active_object_urls(&self) -> usize {
            self.staged.lock().unwrap().len()
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn config() -> ExportConfig {
        ExportConfig {
            pdf_assembly_delay_ms: 0,
            ..ExportConfig::default()
        }
    }

    fn service(delivery: Arc<RecordingDelivery>) -> ExportServiceImpl {
        ExportServiceImpl::new(delivery, config()).with_clock(now)
    }

    fn records() -> Vec<ExportRecord> {
        vec![
            json!({"name": "Alice Smith", "city": "London, UK", "date": "2024-05-31"}).as_object().cloned().unwrap(),
            json!({"name": "Bob", "city": "Leeds", "date": "2023-01-15"}).as_object().cloned().unwrap(),
        ]
    }

    fn target() -> ExportTarget {
        ExportTarget::new("crew-roster", "Crew Roster")
    }

    #[tokio::test]
    async fn test_every_format_delivers_a_named_non_empty_file() {
        for format in ExportFormat::ALL {
            let delivery = Arc::new(RecordingDelivery::default());
            let service = service(delivery.clone());
            let state = ExportState::new(format, DateRangeFilter::All).open_dialog();

            let run = service.run_export(state, &records(), &target()).await;

            let downloads = delivery.downloads();
            assert_eq!(downloads.len(), 1, "{format:?}");
            let (filename, content) = &downloads[0];
            assert_eq!(filename, &format!("crew-roster.{}", format.file_extension()));
            assert!(!content.is_empty());

            match &run.outcome {
                ExportOutcome::Completed { record_count, format: f, bytes_written, checksum, .. } => {
                    assert_eq!(*record_count, 2);
                    assert_eq!(*f, format);
                    assert_eq!(*bytes_written, content.len() as u64);
                    assert_eq!(checksum.len(), 64);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
            assert_eq!(run.notice, Some(ExportNotice::exported(2, format)));
            assert_eq!(
                run.stages,
                vec![ExportStage::Filtering, ExportStage::Encoding, ExportStage::Downloading, ExportStage::Idle]
            );
            assert!(!run.state.busy);
            assert!(!run.state.dialog_open);
            assert_eq!(delivery.active_object_urls(), 0);
            assert!(!service.is_exporting());
        }
    }

    #[tokio::test]
    async fn test_empty_collection_never_downloads() {
        for format in ExportFormat::ALL {
            let delivery = Arc::new(RecordingDelivery::default());
            let service = service(delivery.clone());
            let state = ExportState::new(format, DateRangeFilter::All).open_dialog();

            let run = service.run_export(state, &[], &target()).await;

            assert_eq!(run.outcome, ExportOutcome::NoData);
            assert_eq!(run.notice, Some(ExportNotice::no_data()));
            assert_eq!(run.stages, vec![ExportStage::Filtering, ExportStage::Aborted, ExportStage::Idle]);
            assert!(delivery.downloads().is_empty());
            assert_eq!(*delivery.created.lock().unwrap(), 0);
            assert!(!run.state.busy);
            assert!(run.state.dialog_open);
        }
    }

    #[tokio::test]
    async fn test_filtered_to_empty_never_downloads() {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(delivery.clone());
        let records = vec![json!({"name": "Old", "date": "2024-01-01"}).as_object().cloned().unwrap()];
        let state = ExportState::new(ExportFormat::Csv, DateRangeFilter::Today);

        let run = service.run_export(state, &records, &target()).await;

        assert_eq!(run.outcome, ExportOutcome::NoData);
        assert!(delivery.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_date_filter_applies_before_encoding() {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(delivery.clone());
        let state = ExportState::new(ExportFormat::Json, DateRangeFilter::Week);
        let source = records();

        let run = service.run_export(state, &source, &target()).await;

        let (_, content) = &delivery.downloads()[0];
        let parsed: Vec<ExportRecord> = serde_json::from_slice(content).unwrap();
        assert_eq!(parsed, filter_by_date_range(&source, DateRangeFilter::Week, now()));
        assert_eq!(parsed.len(), 1);
        assert_eq!(run.notice.unwrap().message, "Exported 1 record as JSON");
        // the caller's collection is untouched
        assert_eq!(source, records());
    }

    #[tokio::test]
    async fn test_csv_payload_matches_expected_rows() {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(delivery.clone());
        let rows = vec![
            json!({"name": "Alice Smith", "city": "London, UK"}).as_object().cloned().unwrap(),
            json!({"name": "Bob", "city": "Leeds"}).as_object().cloned().unwrap(),
        ];

        service
            .run_export(ExportState::new(ExportFormat::Csv, DateRangeFilter::All), &rows, &target())
            .await;

        let (_, content) = &delivery.downloads()[0];
        assert_eq!(String::from_utf8(content.clone()).unwrap(), "name,city\nAlice Smith,\"London, UK\"\nBob,Leeds");
    }

    #[tokio::test]
    async fn test_busy_state_is_ignored() {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(delivery.clone());
        let busy = ExportState::new(ExportFormat::Csv, DateRangeFilter::All).begin();

        let run = service.run_export(busy, &records(), &target()).await;

        assert_eq!(run.outcome, ExportOutcome::Ignored);
        assert_eq!(run.state, busy);
        assert!(run.notice.is_none());
        assert!(run.stages.is_empty());
        assert!(delivery.downloads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_trigger_while_in_flight_is_ignored() {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = ExportServiceImpl::new(
            delivery.clone(),
            ExportConfig {
                pdf_assembly_delay_ms: 1_000,
                ..ExportConfig::default()
            },
        )
        .with_clock(now);
        let state = ExportState::new(ExportFormat::Pdf, DateRangeFilter::All);
        let rows = records();
        let target = target();

        let (first, second) = tokio::join!(
            service.run_export(state, &rows, &target),
            service.run_export(state, &rows, &target),
        );

        assert!(matches!(first.outcome, ExportOutcome::Completed { .. }));
        assert_eq!(second.outcome, ExportOutcome::Ignored);
        assert_eq!(delivery.downloads().len(), 1);
        assert!(!service.is_exporting());
    }

    #[tokio::test]
    async fn test_delivery_failure_reports_generic_notice_and_releases_url() {
        let delivery = Arc::new(RecordingDelivery::failing());
        let service = service(delivery.clone());
        let state = ExportState::new(ExportFormat::Excel, DateRangeFilter::All).open_dialog();

        let run = service.run_export(state, &records(), &target()).await;

        assert_eq!(run.outcome, ExportOutcome::Failed);
        assert_eq!(run.notice, Some(ExportNotice::failed()));
        assert!(!run.notice.unwrap().message.contains("disk full"));
        assert_eq!(*delivery.created.lock().unwrap(), 1);
        assert_eq!(delivery.active_object_urls(), 0);
        assert!(!run.state.busy);
        assert!(run.state.dialog_open);
        assert!(!service.is_exporting());

        // no retry: the next trigger is a fresh attempt
        let again = service.run_export(run.state, &records(), &target()).await;
        assert_eq!(again.outcome, ExportOutcome::Failed);
    }

    #[tokio::test]
    async fn test_invalid_target_fails_without_download() {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(delivery.clone());
        let state = ExportState::new(ExportFormat::Csv, DateRangeFilter::All);

        let run = service.run_export(state, &records(), &ExportTarget::new("../secrets", "x")).await;

        assert_eq!(run.outcome, ExportOutcome::Failed);
        assert_eq!(run.stages, vec![ExportStage::Filtering, ExportStage::Encoding, ExportStage::Idle]);
        assert!(delivery.downloads().is_empty());
    }

    #[test]
    fn test_preview_count_uses_state_range() {
        let service = service(Arc::new(RecordingDelivery::default()));
        let rows = records();
        assert_eq!(service.preview_count(&ExportState::default(), &rows), 2);
        let week = ExportState::default().with_date_range(DateRangeFilter::Week);
        assert_eq!(service.preview_count(&week, &rows), 1);
        let year = ExportState::default().with_date_range(DateRangeFilter::Year);
        assert_eq!(service.preview_count(&year, &rows), 1);
    }
}
