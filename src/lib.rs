// Public modules
pub mod config;
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod globals;
pub mod validation;

pub use domains::export::{ExportService, ExportServiceImpl};

/// Initialize logging, configuration and the export services.
/// This function must be called before any other function in the library.
///
/// `output_dir` overrides the configured download directory.
pub fn initialize(output_dir: Option<&str>) -> ffi::FFIResult<()> {
    globals::initialize(output_dir)
}

/// Shared export service, available after [`initialize`].
pub fn export_service() -> ffi::FFIResult<std::sync::Arc<dyn ExportService>> {
    globals::get_export_service()
}
