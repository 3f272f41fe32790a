//! Local filesystem storage backend.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{check_key, new_key, public_url, BlobStore, StorageError};

pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: Option<String>,
}

impl LocalBlobStore {
    /// The `base_path` directory is created if it doesn't exist.
    pub async fn new(base_path: PathBuf, base_url: Option<String>) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&base_path).await?;
        tracing::info!("LocalBlobStore initialized at {:?}", base_path);
        Ok(Self {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, data: Vec<u8>, extension: &str) -> Result<String, StorageError> {
        let key = new_key(extension);
        let path = self.base_path.join(&key);
        tracing::debug!("LocalBlobStore: put {:?} ({} bytes)", path, data.len());

        tokio::fs::write(&path, data).await?;
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let path = self.base_path.join(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &str) -> String {
        public_url(self.base_url.as_deref(), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("uploads"), None)
            .await
            .unwrap();

        let key = store.put(b"%PDF-1.4".to_vec(), "pdf").await.unwrap();
        let path = store.base_path().join(&key);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");
        assert_eq!(store.url(&key), format!("uploads/{}", key));

        store.delete(&key).await.unwrap();
        assert!(!path.exists());
        // Already gone is fine.
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), None).await.unwrap();
        assert!(matches!(
            store.delete("../outside.txt").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(
            dir.path().to_path_buf(),
            Some("https://files.uni.edu.tr".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(store.url("a.png"), "https://files.uni.edu.tr/a.png");
    }
}
