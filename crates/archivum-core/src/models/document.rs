//! Versioned document domain model.
//!
//! A document is a current-file pointer plus an immutable, ordered
//! version history. Version numbers run `1..=N` without gaps and
//! `current_file` always mirrors the file of the last version.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::identity::ServiceCode;
use crate::error::{ArchiveError, ArchiveResult};
use crate::storage::StoredFile;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Pending,
    Signed,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Pending => "pending",
            DocumentStatus::Signed => "signed",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DocumentStatus::Draft),
            "pending" => Ok(DocumentStatus::Pending),
            "signed" => Ok(DocumentStatus::Signed),
            "archived" => Ok(DocumentStatus::Archived),
            other => Err(ArchiveError::validation(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

/// One immutable snapshot of a document's payload reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentVersion {
    /// Sequential number, starting at 1.
    pub number: u32,
    pub file: StoredFile,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub service: ServiceCode,
    pub category: String,
    pub status: DocumentStatus,
    /// File of the most recent version.
    pub current_file: StoredFile,
    pub uploader_id: Uuid,
    pub tags: BTreeSet<String>,
    pub metadata: Map<String, Value>,
    pub versions: Vec<DocumentVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Build a new document whose history holds exactly version #1.
    pub fn new(id: Uuid, input: CreateDocument, at: DateTime<Utc>) -> ArchiveResult<Self> {
        let input = input.normalized()?;
        let service = ServiceCode::new(input.service)?;
        let first = DocumentVersion {
            number: 1,
            file: input.file.clone(),
            uploaded_by: input.uploader_id,
            uploaded_at: at,
        };
        Ok(Self {
            id,
            title: input.title,
            description: input.description,
            service,
            category: input.category,
            status: input.status.unwrap_or_default(),
            current_file: input.file,
            uploader_id: input.uploader_id,
            tags: input.tags.into_iter().collect(),
            metadata: input.metadata.unwrap_or_default(),
            versions: vec![first],
            created_at: at,
            updated_at: at,
        })
    }

    pub fn latest_version(&self) -> Option<&DocumentVersion> {
        self.versions.last()
    }

    /// Checks the history invariants: non-empty, numbered `1..=N`, and
    /// `current_file` equal to the last version's file.
    pub fn history_is_consistent(&self) -> bool {
        let numbered = self
            .versions
            .iter()
            .enumerate()
            .all(|(i, v)| usize::try_from(v.number).is_ok_and(|n| n == i + 1));
        numbered
            && self
                .latest_version()
                .is_some_and(|last| last.file == self.current_file)
    }

    /// Every distinct stored payload referenced by this document, in
    /// version order, deduplicated by storage id.
    pub fn distinct_payloads(&self) -> Vec<&StoredFile> {
        let mut seen = BTreeSet::new();
        self.versions
            .iter()
            .map(|v| &v.file)
            .chain(std::iter::once(&self.current_file))
            .filter(|f| seen.insert(f.storage_id.as_str()))
            .collect()
    }
}

/// Merge `patch` into `base`: keys in the patch overwrite, `null` values
/// remove the key.
pub fn merge_metadata(base: &Map<String, Value>, patch: Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in patch {
        if value.is_null() {
            merged.remove(&key);
        } else {
            merged.insert(key, value);
        }
    }
    merged
}

/// Fields required to archive a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocument {
    pub title: String,
    pub description: Option<String>,
    pub service: String,
    pub category: String,
    pub status: Option<DocumentStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub metadata: Option<Map<String, Value>>,
    /// Payload already placed in blob storage; becomes version #1.
    pub file: StoredFile,
    pub uploader_id: Uuid,
}

impl CreateDocument {
    /// Trim text fields and reject missing required fields.
    pub fn normalized(mut self) -> ArchiveResult<Self> {
        self.title = required("title", &self.title)?;
        self.service = required("service", &self.service)?;
        self.category = required("category", &self.category)?;
        required("file reference", &self.file.storage_id)?;
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.tags = normalize_tags(self.tags);
        Ok(self)
    }
}

/// Mutable document fields. The version history is not reachable from
/// here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDocument {
    pub title: Option<String>,
    /// `Some(Some(text))` = set, `Some(None)` = clear, `None` = no change.
    /// In JSON, `null` clears and an absent key leaves it alone.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub status: Option<DocumentStatus>,
    /// Replaces the whole tag set.
    pub tags: Option<Vec<String>>,
    /// Merged into existing metadata; `null` removes a key.
    pub metadata: Option<Map<String, Value>>,
}

impl UpdateDocument {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.tags.is_none()
            && self.metadata.is_none()
    }

    pub fn normalized(mut self) -> ArchiveResult<Self> {
        if let Some(title) = &self.title {
            self.title = Some(required("title", title)?);
        }
        if let Some(category) = &self.category {
            self.category = Some(required("category", category)?);
        }
        self.description = self.description.map(|d| {
            d.map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        });
        self.tags = self.tags.map(normalize_tags);
        Ok(self)
    }
}

/// Maps a present key to `Some`, keeping an explicit `null` as
/// `Some(None)`. Absent keys fall back to `None` through `default`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required(field: &str, value: &str) -> ArchiveResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ArchiveError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let set: BTreeSet<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    set.into_iter().collect()
}
