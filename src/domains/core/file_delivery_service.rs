use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::fs; // Use tokio::fs for async file operations
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileDeliveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object URL not found: {0}")]
    UrlNotFound(String),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Unknown delivery error: {0}")]
    Other(String),
}

pub type FileDeliveryResult<T> = Result<T, FileDeliveryError>;

/// Short-lived local reference to staged payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub(crate) fn generate(namespace: &str) -> Self {
        Self(format!("blob:{}/{}", namespace, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the delivery backend did with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub filename: String,
    /// Backend specific location (absolute path for local delivery).
    pub location: String,
    pub size_bytes: u64,
}

/// Service trait for handing generated files to the user.
///
/// Mirrors the browser download dance: stage the bytes behind an object URL,
/// trigger a download of that URL under a filename, then revoke the URL.
#[async_trait]
pub trait FileDeliveryService: Send + Sync {
    /// Stage payload bytes and return a URL referencing them.
    fn create_object_url(&self, data: Vec<u8>, mime_type: &str) -> FileDeliveryResult<ObjectUrl>;

    /// Save the bytes behind `url` under `filename`. The URL stays staged until revoked.
    async fn trigger_download(&self, url: &ObjectUrl, filename: &str) -> FileDeliveryResult<DeliveryReceipt>;

    /// Release a staged payload. Revoking an unknown URL is a no-op.
    fn revoke_object_url(&self, url: &ObjectUrl);

    /// Number of staged payloads that have not been revoked yet.
    fn active_object_urls(&self) -> usize;
}

/// Scoped object URL: revoked when dropped, whichever path the caller takes.
pub struct ObjectUrlGuard<'a> {
    service: &'a dyn FileDeliveryService,
    url: Option<ObjectUrl>,
}

impl<'a> ObjectUrlGuard<'a> {
    pub fn create(
        service: &'a dyn FileDeliveryService,
        data: Vec<u8>,
        mime_type: &str,
    ) -> FileDeliveryResult<Self> {
        let url = service.create_object_url(data, mime_type)?;
        Ok(Self { service, url: Some(url) })
    }

    pub fn url(&self) -> Option<&ObjectUrl> {
        self.url.as_ref()
    }

    /// Trigger the download of the guarded URL.
    pub async fn download(&self, filename: &str) -> FileDeliveryResult<DeliveryReceipt> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| FileDeliveryError::Other("Object URL already revoked".to_string()))?;
        self.service.trigger_download(url, filename).await
    }

    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(url) = self.url.take() {
            self.service.revoke_object_url(&url);
        }
    }
}

impl Drop for ObjectUrlGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

// --- Local File Delivery Implementation ---

struct StagedBlob {
    data: Arc<[u8]>,
    mime_type: String,
}

/// Delivers downloads into a directory on the local filesystem.
pub struct LocalFileDeliveryService {
    base_path: PathBuf,
    namespace: String,
    staged: Mutex<HashMap<ObjectUrl, StagedBlob>>,
}

impl LocalFileDeliveryService {
    /// Creates a new LocalFileDeliveryService.
    /// Ensures the download directory exists.
    pub fn new(base_path_str: &str) -> io::Result<Self> {
        let base_path = PathBuf::from(base_path_str);

        // Create directories synchronously during setup
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            namespace: "moveops".to_string(),
            staged: Mutex::new(HashMap::new()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Rejects anything that could escape the download directory.
    fn sanitize_filename(filename: &str) -> Result<String, FileDeliveryError> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename == "."
            || filename == ".."
        {
            Err(FileDeliveryError::InvalidFilename(filename.to_string()))
        } else {
            Ok(filename.to_string())
        }
    }

    /// Shared handle to the staged bytes; the payload itself is never copied.
    fn staged_data(&self, url: &ObjectUrl) -> FileDeliveryResult<(Arc<[u8]>, String)> {
        let staged = self
            .staged
            .lock()
            .map_err(|_| FileDeliveryError::Other("Staging lock poisoned".to_string()))?;
        staged
            .get(url)
            .map(|blob| (Arc::clone(&blob.data), blob.mime_type.clone()))
            .ok_or_else(|| FileDeliveryError::UrlNotFound(url.to_string()))
    }
}

#[async_trait]
impl FileDeliveryService for LocalFileDeliveryService {
    fn create_object_url(&self, data: Vec<u8>, mime_type: &str) -> FileDeliveryResult<ObjectUrl> {
        let url = ObjectUrl::generate(&self.namespace);
        let mut staged = self
            .staged
            .lock()
            .map_err(|_| FileDeliveryError::Other("Staging lock poisoned".to_string()))?;
        staged.insert(
            url.clone(),
            StagedBlob {
                data: Arc::from(data),
                mime_type: mime_type.to_string(),
            },
        );
        Ok(url)
    }

    async fn trigger_download(&self, url: &ObjectUrl, filename: &str) -> FileDeliveryResult<DeliveryReceipt> {
        let sanitized = Self::sanitize_filename(filename)?;
        let (data, mime_type) = self.staged_data(url)?;

        let absolute_path = self.base_path.join(&sanitized);
        if !absolute_path.starts_with(&self.base_path) {
            return Err(FileDeliveryError::PermissionDenied("Attempt to write outside base path".to_string()));
        }

        fs::create_dir_all(&self.base_path).await?;
        let size_bytes = data.len() as u64;
        fs::write(&absolute_path, &*data).await?;

        log::debug!("Delivered {} ({}, {} bytes) to {}", sanitized, mime_type, size_bytes, absolute_path.display());

        Ok(DeliveryReceipt {
            filename: sanitized,
            location: absolute_path.to_string_lossy().into_owned(),
            size_bytes,
        })
    }

    fn revoke_object_url(&self, url: &ObjectUrl) {
        let mut staged = self.staged.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        staged.remove(url);
    }

    fn active_object_urls(&self) -> usize {
        self.staged
            .lock()
            .map(|staged| staged.len())
            .unwrap_or(0)
    }
}
