//! Blob storage collaborator interface.
//!
//! The archive never inspects payload bytes. It persists the
//! [`StoredFile`] reference a store hands back and asks the store to
//! remove payloads when their document is deleted.

use serde::{Deserialize, Serialize};

use crate::error::ArchiveResult;

/// Reference to a payload held by a [`BlobStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StoredFile {
    /// Store-assigned identifier, used for removal.
    pub storage_id: String,
    pub url: String,
    /// Size in bytes.
    pub size: u64,
    /// File extension / format (e.g., `pdf`).
    pub format: String,
}

impl StoredFile {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_format(&self.format)
    }
}

/// Coarse payload family; stores may keep families apart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    pub fn from_format(format: &str) -> Self {
        match format.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff" => Self::Image,
            "mp4" | "mov" | "avi" | "mkv" | "webm" => Self::Video,
            _ => Self::Raw,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Raw => "raw",
        }
    }
}

pub trait BlobStore: Send + Sync {
    /// Persist a payload under `folder` and return its reference.
    fn store(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        mime_type: &str,
    ) -> impl Future<Output = ArchiveResult<StoredFile>> + Send;

    /// Remove a payload. Returns `false` when nothing was stored under
    /// `storage_id`.
    fn remove(
        &self,
        storage_id: &str,
        kind: ResourceKind,
    ) -> impl Future<Output = ArchiveResult<bool>> + Send;
}
