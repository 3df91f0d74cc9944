use std::cell::RefCell;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_char;
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, ServiceError, ValidationError};

/// Error codes for FFI boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Success (no error)
    Success = 0,

    // General errors (1-99)
    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InternalError = 6,
    NotInitialized = 7,

    // Domain errors (200-299)
    ValidationFailed = 204,
    FileError = 207,

    // Service errors (300-399)
    ConfigurationError = 310,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// Error type for FFI boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FFIError {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (JSON string)
    pub details: Option<String>,
}

impl fmt::Display for FFIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for FFIError {}

impl FFIError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: &str, details: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn null_pointer(what: &str) -> Self {
        Self::new(ErrorCode::NullPointer, &format!("Null pointer provided for {}", what))
    }

    pub fn internal(message: String) -> Self {
        Self::new(ErrorCode::InternalError, &message)
    }

    pub fn not_initialized(what: &str) -> Self {
        Self::new(ErrorCode::NotInitialized, &format!("{} not initialized; call initialize_library first", what))
    }
}

impl From<DomainError> for FFIError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(val_err) => val_err.into(),
            DomainError::File(msg) => Self::new(ErrorCode::FileError, &msg),
        }
    }
}

impl From<ServiceError> for FFIError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(domain_err) => domain_err.into(),
            ServiceError::Configuration(msg) => Self::new(ErrorCode::ConfigurationError, &msg),
        }
    }
}

impl From<ValidationError> for FFIError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        let details = serde_json::to_string(&err).unwrap_or_else(|_| "null".to_string());
        Self::with_details(ErrorCode::ValidationFailed, &message, &details)
    }
}

impl From<std::ffi::NulError> for FFIError {
    fn from(_: std::ffi::NulError) -> Self {
        Self::new(ErrorCode::InvalidUtf8, "String contains null bytes, cannot create CString")
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<FFIError>> = const { RefCell::new(None) };
}

/// Remember the most recent error on this thread for `get_last_error`.
pub fn set_last_error(error: &FFIError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(error.clone()));
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// JSON of the last error as an owned C string, or null when there is none.
pub fn get_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|error| serde_json::to_string(error).ok())
            .and_then(|json| CString::new(json).ok())
            .map_or(std::ptr::null_mut(), CString::into_raw)
    })
}

// Result type alias for FFI functions
pub type FFIResult<T> = Result<T, FFIError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::file_delivery_service::FileDeliveryError;

    #[test]
    fn test_domain_errors_map_to_codes() {
        let file: FFIError = DomainError::from(FileDeliveryError::Other("gone".into())).into();
        assert_eq!(file.code, ErrorCode::FileError);

        let validation: FFIError = DomainError::from(ValidationError::required("filename_stem")).into();
        assert_eq!(validation.code, ErrorCode::ValidationFailed);
        assert!(validation.details.unwrap().contains("filename_stem"));
    }

    #[test]
    fn test_service_errors_delegate_to_domain() {
        let err: FFIError = ServiceError::from(ValidationError::custom("bad")).into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let err: FFIError = ServiceError::Configuration("missing".into()).into();
        assert_eq!(err.code, ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_last_error_roundtrip() {
        clear_last_error();
        assert!(get_last_error_message().is_null());

        set_last_error(&FFIError::invalid_argument("nope"));
        let ptr = get_last_error_message();
        assert!(!ptr.is_null());
        let json = unsafe { CString::from_raw(ptr) }.into_string().unwrap();
        assert!(json.contains("InvalidArgument"));
        clear_last_error();
    }
}
