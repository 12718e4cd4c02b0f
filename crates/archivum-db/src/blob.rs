//! Filesystem-backed [`BlobStore`].
//!
//! Payloads live under `<root>/<kind>/<folder>/<uuid>.<ext>`. The
//! storage id handed back is `<folder>/<uuid>.<ext>`; together with the
//! [`ResourceKind`] it locates the file again for removal.

use std::path::{Component, Path, PathBuf};

use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::storage::{BlobStore, ResourceKind, StoredFile};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbError;

/// Configuration for the local blob store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root_dir: PathBuf,
    /// Prefix of the URLs handed out for stored payloads.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./data/blobs"),
            public_base_url: "/files".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root_dir: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Open the store, creating the root directory if needed.
    pub async fn new(config: &StorageConfig) -> Result<Self, DbError> {
        fs::create_dir_all(&config.root_dir)
            .await
            .map_err(|e| DbError::Blob(format!("{}: {e}", config.root_dir.display())))?;

        info!(path = %config.root_dir.display(), "Initialized blob store");

        Ok(Self {
            root_dir: config.root_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, kind: ResourceKind, storage_id: &str) -> PathBuf {
        self.root_dir.join(kind.as_str()).join(storage_id)
    }
}

impl BlobStore for LocalBlobStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        mime_type: &str,
    ) -> ArchiveResult<StoredFile> {
        let folder = folder.trim_matches('/');
        if !is_relative_path(folder) {
            return Err(ArchiveError::validation(format!("invalid folder: {folder:?}")));
        }

        let format = extension_for(mime_type);
        // Derived from the extension so `StoredFile::kind` finds it again.
        let kind = ResourceKind::from_format(format);
        let file_name = format!("{}.{format}", Uuid::new_v4());
        let storage_id = if folder.is_empty() {
            file_name
        } else {
            format!("{folder}/{file_name}")
        };

        let path = self.path_for(kind, &storage_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DbError::Blob(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&path, &bytes)
            .await
            .map_err(|e| DbError::Blob(format!("{}: {e}", path.display())))?;

        debug!(storage_id = %storage_id, size = bytes.len(), "Stored blob");

        Ok(StoredFile {
            url: format!("{}/{}/{storage_id}", self.public_base_url, kind.as_str()),
            storage_id,
            size: bytes.len() as u64,
            format: format.to_string(),
        })
    }

    async fn remove(&self, storage_id: &str, kind: ResourceKind) -> ArchiveResult<bool> {
        if !is_relative_path(storage_id) || storage_id.is_empty() {
            return Err(ArchiveError::validation(format!(
                "invalid storage id: {storage_id:?}"
            )));
        }

        let path = self.path_for(kind, storage_id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(storage_id = %storage_id, "Removed blob");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DbError::Blob(format!("{}: {e}", path.display())).into()),
        }
    }
}

/// Only plain relative segments; nothing that could escape the root.
fn is_relative_path(value: &str) -> bool {
    Path::new(value)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or_default().trim() {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/tiff" => "tiff",
        "video/mp4" => "mp4",
        "text/plain" => "txt",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir) -> LocalBlobStore {
        LocalBlobStore::new(&StorageConfig {
            root_dir: dir.path().to_path_buf(),
            public_base_url: "https://files.example/".into(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn store_then_remove() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let file = store
            .store(b"%PDF-1.7".to_vec(), "documents/RH", "application/pdf")
            .await
            .unwrap();

        assert!(file.storage_id.starts_with("documents/RH/"));
        assert!(file.storage_id.ends_with(".pdf"));
        assert_eq!(file.size, 8);
        assert_eq!(file.format, "pdf");
        assert!(file.url.starts_with("https://files.example/raw/documents/RH/"));
        assert!(dir.path().join("raw").join(&file.storage_id).exists());

        assert!(store.remove(&file.storage_id, file.kind()).await.unwrap());
        assert!(!store.remove(&file.storage_id, file.kind()).await.unwrap());
    }

    #[tokio::test]
    async fn images_are_kept_apart() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let file = store.store(vec![0u8; 4], "scans", "image/png").await.unwrap();

        assert_eq!(file.kind(), ResourceKind::Image);
        assert!(dir.path().join("image").join(&file.storage_id).exists());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        assert!(store.store(vec![1], "../outside", "text/plain").await.is_err());
        assert!(store.remove("../../etc/passwd", ResourceKind::Raw).await.is_err());
    }

    #[test]
    fn unknown_mime_falls_back_to_bin() {
        assert_eq!(extension_for("application/octet-stream"), "bin");
        assert_eq!(extension_for("application/pdf; charset=binary"), "pdf");
    }
}
