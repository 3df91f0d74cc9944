pub mod file_delivery_service;

pub use file_delivery_service::{
    DeliveryReceipt, FileDeliveryError, FileDeliveryResult, FileDeliveryService, ObjectUrl, ObjectUrlGuard,
};
