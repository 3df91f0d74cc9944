mod error;

pub use error::{DomainError, ServiceError, ValidationError};

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
