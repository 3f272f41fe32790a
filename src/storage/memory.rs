//! In-process blob store, used by tests and local tooling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{new_key, public_url, BlobStore, StorageError};

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `put` fail until switched off again.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Vec<u8>, extension: &str) -> Result<String, StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store is failing puts".to_string()));
        }
        let key = new_key(extension);
        self.blobs.lock().await.insert(key.clone(), data);
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        public_url(None, key)
    }
}
