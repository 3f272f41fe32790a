//! Blob storage for uploaded files.
//!
//! The core only needs three things from a backend: store bytes and get a key back,
//! delete a key, and turn a key into a client-facing URL. Keys are `<uuid>.<ext>`.

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under a fresh key ending in `extension` and return the key.
    async fn put(&self, data: Vec<u8>, extension: &str) -> Result<String, StorageError>;

    /// Remove a blob. Deleting a key that no longer exists is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Public address for a key.
    fn url(&self, key: &str) -> String;
}

/// Fresh `<uuid>.<ext>` key; the extension is lowercased and stripped of anything odd.
pub fn new_key(extension: &str) -> String {
    let ext: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_lowercase();

    if ext.is_empty() {
        format!("{}.bin", uuid::Uuid::new_v4())
    } else {
        format!("{}.{}", uuid::Uuid::new_v4(), ext)
    }
}

/// Keys we hand out never contain path separators; anything else is refused.
pub fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// `{base}/<key>` when a public base URL is configured, otherwise `uploads/<key>`.
pub fn public_url(base_url: Option<&str>, key: &str) -> String {
    match base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!("uploads/{}", key),
    }
}
