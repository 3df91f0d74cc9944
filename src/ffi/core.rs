// src/ffi/core.rs
// ============================================================================
// Core FFI functions for library initialization and management
// ============================================================================

use crate::ffi::{error::FFIError, handle_status_result};
use std::ffi::{c_char, CStr, CString};
use std::os::raw::c_int;

/// Initialize the library. `output_dir` may be null to keep the configured
/// download directory. Returns 0 on success, non-zero on error.
///
/// # Safety
/// `output_dir` must be null or a valid, null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn initialize_library(output_dir: *const c_char) -> c_int {
    let result = std::panic::catch_unwind(|| {
        let output_dir = if output_dir.is_null() {
            None
        } else {
            match unsafe { CStr::from_ptr(output_dir) }.to_str() {
                Ok(s) => Some(s.to_string()),
                Err(_) => return Err(FFIError::invalid_argument("Invalid output_dir string")),
            }
        };
        crate::initialize(output_dir.as_deref())
    });

    match result {
        Ok(ffi_result) => handle_status_result(|| ffi_result),
        Err(panic_payload) => {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Panicked during FFI call, but panic message is not a string".to_string()
            };
            handle_status_result(|| Err(FFIError::internal(format!("Panic during initialization: {}", panic_msg))))
        }
    }
}

/// Frees a C string that was allocated by Rust and passed over FFI.
///
/// # Safety
/// `ptr` must come from this library and must not be freed twice.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = unsafe { CString::from_raw(ptr) };
    }
}

/// Get library version
/// Returns allocated string that must be freed with free_string()
#[unsafe(no_mangle)]
pub extern "C" fn get_library_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION")).map_or(std::ptr::null_mut(), CString::into_raw)
}

/// JSON of the last error raised on the calling thread, or null.
/// Returns allocated string that must be freed with free_string()
#[unsafe(no_mangle)]
pub extern "C" fn get_last_error() -> *mut c_char {
    crate::ffi::error::get_last_error_message()
}
