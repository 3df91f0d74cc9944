use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::config::ExportConfig;
use crate::domains::core::file_delivery_service::{FileDeliveryError, FileDeliveryService, LocalFileDeliveryService};
use crate::domains::export::service::{ExportService, ExportServiceImpl};
use crate::errors::{DomainError, ServiceError, ServiceResult};
use crate::ffi::error::{FFIError, FFIResult};

// Global state definitions
static INIT_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static EXPORT_CONFIG: Lazy<Mutex<Option<ExportConfig>>> = Lazy::new(|| Mutex::new(None));
static FILE_DELIVERY_SERVICE: Lazy<Mutex<Option<Arc<dyn FileDeliveryService>>>> = Lazy::new(|| Mutex::new(None));
static EXPORT_SERVICE: Lazy<Mutex<Option<Arc<dyn ExportService>>>> = Lazy::new(|| Mutex::new(None));

// --- Getter Functions ---

pub fn get_export_config() -> FFIResult<ExportConfig> {
    EXPORT_CONFIG
        .lock()
        .map_err(|_| FFIError::internal("EXPORT_CONFIG lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized("Export configuration"))
}

pub fn get_file_delivery_service() -> FFIResult<Arc<dyn FileDeliveryService>> {
    FILE_DELIVERY_SERVICE
        .lock()
        .map_err(|_| FFIError::internal("FILE_DELIVERY_SERVICE lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized("File delivery service"))
}

pub fn get_export_service() -> FFIResult<Arc<dyn ExportService>> {
    EXPORT_SERVICE
        .lock()
        .map_err(|_| FFIError::internal("EXPORT_SERVICE lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized("Export service"))
}

pub fn is_initialized() -> bool {
    EXPORT_SERVICE.lock().map(|guard| guard.is_some()).unwrap_or(false)
}

// --- Initialization ---

/// Set up logging, load configuration and wire the export services.
///
/// Calling it again after a successful run is a no-op.
pub fn initialize(output_dir_override: Option<&str>) -> FFIResult<()> {
    let _guard = INIT_MUTEX
        .lock()
        .map_err(|_| FFIError::internal("INIT_MUTEX lock poisoned".to_string()))?;

    if is_initialized() {
        log::debug!("Library already initialized");
        return Ok(());
    }

    init_logging();
    log::info!("Starting initialization");

    let config = load_config(output_dir_override)?;
    log::debug!("Export configuration: {:?}", config);

    let delivery = build_delivery(&config)?;
    let export_service: Arc<dyn ExportService> = Arc::new(ExportServiceImpl::new(delivery.clone(), config.clone()));

    set(&*EXPORT_CONFIG, config, "EXPORT_CONFIG")?;
    set(&*FILE_DELIVERY_SERVICE, delivery, "FILE_DELIVERY_SERVICE")?;
    set(&*EXPORT_SERVICE, export_service, "EXPORT_SERVICE")?;

    log::info!("Initialization complete");
    Ok(())
}

fn load_config(output_dir_override: Option<&str>) -> ServiceResult<ExportConfig> {
    let mut config = ExportConfig::from_env().map_err(|e| ServiceError::Configuration(e.to_string()))?;
    if let Some(dir) = output_dir_override.map(str::trim).filter(|dir| !dir.is_empty()) {
        config.output_dir = dir.to_string();
    }
    Ok(config)
}

fn build_delivery(config: &ExportConfig) -> ServiceResult<Arc<dyn FileDeliveryService>> {
    let service = LocalFileDeliveryService::new(&config.output_dir)
        .map_err(FileDeliveryError::from)
        .map_err(DomainError::from)?;
    Ok(Arc::new(service))
}

fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }

    // Another logger may already be installed by the host or a test harness
    let _ = env_logger::try_init();
}

fn set<T>(slot: &Mutex<Option<T>>, value: T, name: &str) -> FFIResult<()> {
    let mut guard = slot
        .lock()
        .map_err(|_| FFIError::internal(format!("{} lock poisoned", name)))?;
    *guard = Some(value);
    Ok(())
}
