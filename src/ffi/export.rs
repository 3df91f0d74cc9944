// src/ffi/export.rs
// ============================================================================
// FFI bindings for the `ExportService`.
// All logic lives in the domain/service layer. These wrappers (1) decode the
// JSON request coming from the host, (2) forward it to the export service on
// the shared runtime, and (3) hand the JSON result back across the boundary.
//
// Memory ownership: any *mut c_char written to `result` is owned by the
// caller and must be released with `export_free`.
// ============================================================================

use crate::domains::export::service::ExportService;
use crate::domains::export::types::{
    DateRangeFilter, ExportFormat, ExportRecord, ExportRun, ExportState, ExportTarget,
};
use crate::ffi::{block_on_async, error::FFIError, handle_json_result, handle_status_result, FFIResult};
use serde::{Deserialize, Serialize};
use std::ffi::{c_char, CStr, CString};
use std::os::raw::c_int;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportRunRequest {
    records: Vec<ExportRecord>,
    #[serde(default)]
    state: ExportState,
    target: ExportTarget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewCountRequest {
    records: Vec<ExportRecord>,
    #[serde(default)]
    date_range: DateRangeFilter,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct PreviewCountResponse {
    date_range: DateRangeFilter,
    count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptionDto {
    value: serde_json::Value,
    label: &'static str,
}

/// Choices the export dialog offers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportOptionsResponse {
    formats: Vec<OptionDto>,
    date_ranges: Vec<OptionDto>,
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Read a required C string argument.
///
/// # Safety
/// `ptr` must be null or a valid, null-terminated C string.
unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> FFIResult<&'a str> {
    if ptr.is_null() {
        return Err(FFIError::null_pointer(what));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FFIError::invalid_argument(&format!("Invalid UTF-8 in {}", what)))
}

fn parse_json_payload<T: serde::de::DeserializeOwned>(json_str: &str) -> FFIResult<T> {
    serde_json::from_str(json_str)
        .map_err(|e| FFIError::invalid_argument(&format!("Invalid JSON payload: {}", e)))
}

fn create_json_response<T: Serialize>(data: &T) -> FFIResult<*mut c_char> {
    let json_string = serde_json::to_string(data)
        .map_err(|e| FFIError::internal(format!("JSON serialization failed: {}", e)))?;
    Ok(CString::new(json_string)?.into_raw())
}

fn run_export_json(service: Arc<dyn ExportService>, json_str: &str) -> FFIResult<ExportRun> {
    let request: ExportRunRequest = parse_json_payload(json_str)?;
    block_on_async(async move {
        Ok(service
            .run_export(request.state, &request.records, &request.target)
            .await)
    })
}

fn preview_count_json(service: &dyn ExportService, json_str: &str) -> FFIResult<PreviewCountResponse> {
    let request: PreviewCountRequest = parse_json_payload(json_str)?;
    let state = ExportState::default().with_date_range(request.date_range);
    Ok(PreviewCountResponse {
        date_range: request.date_range,
        count: service.preview_count(&state, &request.records),
    })
}

fn export_options() -> FFIResult<ExportOptionsResponse> {
    let option = |value: serde_json::Result<serde_json::Value>, label: &'static str| -> FFIResult<OptionDto> {
        let value = value.map_err(|e| FFIError::internal(format!("JSON serialization failed: {}", e)))?;
        Ok(OptionDto { value, label })
    };
    Ok(ExportOptionsResponse {
        formats: ExportFormat::ALL
            .iter()
            .map(|f| option(serde_json::to_value(f), f.label()))
            .collect::<FFIResult<_>>()?,
        date_ranges: DateRangeFilter::ALL
            .iter()
            .map(|r| option(serde_json::to_value(r), r.label()))
            .collect::<FFIResult<_>>()?,
    })
}

// ============================================================================
// EXPORT FUNCTIONS
// ============================================================================

/// Run one export.
///
/// Request: `{"records": [...], "state": {...}, "target": {"filenameStem", "title"}}`.
/// Writes the resulting `ExportRun` as JSON into `result`. An ignored trigger,
/// an empty selection and a failed delivery are all reported inside the run,
/// not as error codes.
///
/// # Safety
/// `request_json` must be a valid, null-terminated C string and `result` a
/// valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_run(request_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        if result.is_null() {
            return Err(FFIError::null_pointer("result"));
        }
        let json_str = read_str(request_json, "request_json")?;
        let service = crate::globals::get_export_service()?;
        let run = run_export_json(service, json_str)?;
        *result = create_json_response(&run)?;
        Ok(())
    })
}

/// Count the records the date range would keep, for the dialog preview.
///
/// Request: `{"records": [...], "dateRange": "week"}`.
///
/// # Safety
/// `request_json` must be a valid, null-terminated C string and `result` a
/// valid pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_preview_count(request_json: *const c_char, result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        if result.is_null() {
            return Err(FFIError::null_pointer("result"));
        }
        let json_str = read_str(request_json, "request_json")?;
        let service = crate::globals::get_export_service()?;
        let response = preview_count_json(service.as_ref(), json_str)?;
        *result = create_json_response(&response)?;
        Ok(())
    })
}

/// Formats and date ranges with their display labels, as JSON.
///
/// Never fails in practice; on error the JSON is the serialized `FFIError`.
/// The returned string must be released with `export_free`.
#[unsafe(no_mangle)]
pub extern "C" fn export_get_options() -> *mut c_char {
    handle_json_result(export_options)
}

/// Whether an export is currently in flight.
#[unsafe(no_mangle)]
pub extern "C" fn export_is_running() -> bool {
    crate::globals::get_export_service()
        .map(|service| service.is_exporting())
        .unwrap_or(false)
}

/// Free memory allocated by the export functions.
///
/// # Safety
/// `ptr` must come from one of the export functions and must not be freed twice.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = unsafe { CString::from_raw(ptr) };
    }
}
