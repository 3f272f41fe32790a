use std::sync::Arc;

use sqlx::{Pool, Sqlite};

use crate::db::files::NewFile;
use crate::db::models::{File, ResourceType};
use crate::db::FileRepository;
use crate::error::AppError;
use crate::storage::BlobStore;

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: Vec<u8>) -> Self {
        Upload {
            file_name: file_name.into(),
            content_type,
            data,
        }
    }

    pub fn extension(&self) -> String {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Declared type when it is specific, otherwise guessed from the file name.
    pub fn mime(&self) -> String {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_lowercase(),
            _ => mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }

    /// File extension for the stored blob, falling back to one implied by the MIME type.
    pub fn storage_extension(&self) -> String {
        let ext = self.extension();
        if !ext.is_empty() {
            return ext;
        }
        mime_guess::get_mime_extensions_str(&self.mime())
            .and_then(|exts| exts.first())
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    pub fn is_image(&self) -> bool {
        self.mime().starts_with("image/")
    }

    pub fn is_pdf_or_image(&self) -> bool {
        self.is_image() || self.mime() == "application/pdf"
    }

    fn display_name(&self) -> String {
        let name = self
            .file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() {
            "upload".to_string()
        } else {
            name.chars().take(255).collect()
        }
    }
}

/// Blob + `files` row bookkeeping shared by every service that accepts uploads.
///
/// `store` performs step one of attaching (an unattached row); the caller performs step
/// two inside its own transaction and calls `discard` on any failure.
#[derive(Clone)]
pub struct FileService {
    db: Pool<Sqlite>,
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(db: Pool<Sqlite>, blobs: Arc<dyn BlobStore>) -> Self {
        FileService { db, blobs }
    }

    pub async fn store(
        &self,
        upload: Upload,
        resource_type: ResourceType,
        uploaded_by: i64,
    ) -> Result<File, AppError> {
        if upload.data.is_empty() {
            return Err(AppError::validation("file", "File is empty"));
        }

        let name = upload.display_name();
        let mime = upload.mime();
        let size = upload.data.len() as i64;
        let extension = upload.storage_extension();
        let key = self.blobs.put(upload.data, &extension).await?;
        let url = self.blobs.url(&key);

        let created = FileRepository::create_unattached(
            &self.db,
            NewFile {
                name: &name,
                path: &key,
                url: &url,
                size,
                mime: &mime,
                resource_type,
                uploaded_by,
            },
        )
        .await;

        match created {
            Ok(file) => {
                tracing::debug!(file_id = file.id, ?resource_type, size, "stored upload");
                Ok(file)
            }
            Err(e) => {
                if let Err(del) = self.blobs.delete(&key).await {
                    tracing::warn!(key, "could not remove blob after failed insert: {}", del);
                }
                Err(e)
            }
        }
    }

    /// Stores several uploads; if any fails, the ones already stored are discarded.
    pub async fn store_all(
        &self,
        uploads: Vec<Upload>,
        resource_type: ResourceType,
        uploaded_by: i64,
    ) -> Result<Vec<File>, AppError> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store(upload, resource_type, uploaded_by).await {
                Ok(file) => stored.push(file),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Compensating action for files that never got attached: drop the rows and blobs
    /// right away. Anything that fails here is left for the sweeper.
    pub async fn discard(&self, files: &[File]) {
        for file in files {
            match FileRepository::delete_unattached(&self.db, file.id).await {
                Ok(true) => {
                    if let Err(e) = self.blobs.delete(&file.path).await {
                        tracing::warn!(file_id = file.id, "blob delete failed: {}", e);
                    }
                }
                Ok(false) => {
                    tracing::warn!(file_id = file.id, "file was attached meanwhile; not discarded")
                }
                Err(e) => tracing::warn!(
                    file_id = file.id,
                    "discard failed, leaving it to the sweeper: {}",
                    e
                ),
            }
        }
    }

    pub async fn get(&self, file_id: Option<i64>) -> Result<Option<File>, AppError> {
        match file_id {
            Some(id) => FileRepository::get_by_id(&self.db, id).await,
            None => Ok(None),
        }
    }

    pub async fn attached_to(
        &self,
        resource_type: ResourceType,
        resource_id: i64,
    ) -> Result<Vec<File>, AppError> {
        FileRepository::list_for_resource(&self.db, resource_type, resource_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_type_detection() {
        let pdf = Upload::new("Midterm.PDF", None, vec![1]);
        assert_eq!(pdf.extension(), "pdf");
        assert_eq!(pdf.mime(), "application/pdf");
        assert!(pdf.is_pdf_or_image());

        let png = Upload::new("photo.png", Some("application/octet-stream".into()), vec![1]);
        assert!(png.is_image());

        let exe = Upload::new("tool.exe", None, vec![1]);
        assert!(!exe.is_pdf_or_image());

        let declared = Upload::new("scan", Some("image/jpeg".into()), vec![1]);
        assert!(declared.is_image());
        assert_eq!(declared.extension(), "");
    }

    #[test]
    fn test_display_name_strips_paths() {
        let upload = Upload::new("C:\\Users\\me\\notes.pdf", None, vec![1]);
        assert_eq!(upload.display_name(), "notes.pdf");
        let upload = Upload::new("../../etc/passwd", None, vec![1]);
        assert_eq!(upload.display_name(), "passwd");
    }
}
