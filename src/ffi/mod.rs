use std::ffi::CString;
use std::future::Future;
use std::os::raw::{c_char, c_int};

use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::ffi::error::{ErrorCode, FFIError};

pub mod core;
pub mod error;
pub mod export;

pub use error::FFIResult;

/// Shared runtime for every blocking FFI entry point.
static RUNTIME: Lazy<Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("moveops-ffi")
        .build()
        .map_err(|e| e.to_string())
});

/// Run an async operation to completion on the shared runtime.
pub fn block_on_async<F, T>(future: F) -> FFIResult<T>
where
    F: Future<Output = FFIResult<T>>,
{
    match RUNTIME.as_ref() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => Err(FFIError::internal(format!("Failed to start async runtime: {}", e))),
    }
}

/// Error handling helper for FFI boundaries (returns error code)
pub fn handle_status_result<F>(func: F) -> c_int
where
    F: FnOnce() -> FFIResult<()>,
{
    match func() {
        Ok(_) => {
            error::clear_last_error();
            ErrorCode::Success as c_int
        }
        Err(e) => {
            log::error!(
                "[FFI] Code: {:?}, Message: {}, Details: {}",
                e.code,
                e.message,
                e.details.as_deref().unwrap_or("None")
            );
            error::set_last_error(&e);
            e.code as c_int
        }
    }
}

/// Serialize Ok(T) or the FFIError to JSON and hand it over as an owned C string.
pub fn handle_json_result<F, T>(func: F) -> *mut c_char
where
    F: FnOnce() -> FFIResult<T>,
    T: Serialize,
{
    let json_string = match func() {
        Ok(value) => serde_json::to_string(&value),
        Err(ffi_error) => {
            error::set_last_error(&ffi_error);
            serde_json::to_string(&ffi_error)
        }
    };

    // The caller must always be able to parse the response
    let final_json = json_string.unwrap_or_else(|e| {
        log::error!("[FFI] Serialization failed: {}", e);
        format!(
            "{{\"code\":\"{:?}\",\"message\":\"Failed to serialize result\",\"details\":null}}",
            ErrorCode::InternalError
        )
    });

    match CString::new(final_json) {
        Ok(c_string) => c_string.into_raw(),
        Err(e) => {
            log::error!("[FFI] Failed to create CString: {}", e);
            std::ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(handle_status_result(|| Ok(())), 0);
        assert_eq!(
            handle_status_result(|| Err(FFIError::invalid_argument("bad"))),
            ErrorCode::InvalidArgument as c_int
        );
    }

    #[test]
    fn test_json_result_serializes_errors_too() {
        let ptr = handle_json_result(|| Ok(vec![1, 2, 3]));
        let json = unsafe { CString::from_raw(ptr) }.into_string().unwrap();
        assert_eq!(json, "[1,2,3]");

        let ptr = handle_json_result::<_, ()>(|| Err(FFIError::not_initialized("Export service")));
        let json = unsafe { CString::from_raw(ptr) }.into_string().unwrap();
        assert!(json.contains("NotInitialized"));
    }

    #[test]
    fn test_block_on_async_runs_future() {
        let value = block_on_async(async { Ok::<_, FFIError>(41 + 1) }).unwrap();
        assert_eq!(value, 42);
    }
}
