//! SurrealDB implementation of [`DocumentRepository`].
//!
//! The version history lives inside the document record. Appending is a
//! single `UPDATE` that numbers the new entry from the stored array
//! length, so concurrent appends serialize on the record and never reuse
//! a number. An append that loses the write race runs again.

use archivum_core::error::ArchiveResult;
use archivum_core::filter::Filter;
use archivum_core::models::document::{
    CreateDocument, Document, DocumentStatus, DocumentVersion, UpdateDocument,
};
use archivum_core::models::identity::ServiceCode;
use archivum_core::repository::{DocumentRepository, PaginatedResult, Pagination};
use archivum_core::storage::StoredFile;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, into_object, parse_uuid, retry_write};
use crate::error::DbError;
use crate::query::{CRITERIA_PARAM, DOCUMENT_COLUMNS, translate};

const ENTITY: &str = "document";

#[derive(Debug, SurrealValue)]
struct FileRow {
    storage_id: String,
    url: String,
    size: u64,
    format: String,
}

impl From<FileRow> for StoredFile {
    fn from(row: FileRow) -> Self {
        StoredFile {
            storage_id: row.storage_id,
            url: row.url,
            size: row.size,
            format: row.format,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct VersionRow {
    number: u32,
    storage_id: String,
    url: String,
    size: u64,
    format: String,
    uploaded_by: String,
    uploaded_at: DateTime<Utc>,
}

impl VersionRow {
    fn into_version(self) -> Result<DocumentVersion, DbError> {
        Ok(DocumentVersion {
            number: self.number,
            uploaded_by: parse_uuid(ENTITY, &self.uploaded_by)?,
            uploaded_at: self.uploaded_at,
            file: StoredFile {
                storage_id: self.storage_id,
                url: self.url,
                size: self.size,
                format: self.format,
            },
        })
    }
}

/// DB-side row struct for statements where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct DocumentRow {
    title: String,
    description: Option<String>,
    service: String,
    category: String,
    status: String,
    current_file: FileRow,
    uploader_id: String,
    tags: Vec<String>,
    metadata: serde_json::Value,
    versions: Vec<VersionRow>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct DocumentRowWithId {
    record_id: String,
    title: String,
    description: Option<String>,
    service: String,
    category: String,
    status: String,
    current_file: FileRow,
    uploader_id: String,
    tags: Vec<String>,
    metadata: serde_json::Value,
    versions: Vec<VersionRow>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self, id: Uuid) -> Result<Document, DbError> {
        let status: DocumentStatus = self
            .status
            .parse()
            .map_err(|_| DbError::decode(ENTITY, format!("unknown status: {}", self.status)))?;
        let service =
            ServiceCode::new(self.service).map_err(|e| DbError::decode(ENTITY, e.to_string()))?;
        let versions = self
            .versions
            .into_iter()
            .map(VersionRow::into_version)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Document {
            id,
            title: self.title,
            description: self.description,
            service,
            category: self.category,
            status,
            current_file: self.current_file.into(),
            uploader_id: parse_uuid(ENTITY, &self.uploader_id)?,
            tags: self.tags.into_iter().collect(),
            metadata: into_object(self.metadata),
            versions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DocumentRowWithId {
    fn try_into_document(self) -> Result<Document, DbError> {
        let id = parse_uuid(ENTITY, &self.record_id)?;
        DocumentRow {
            title: self.title,
            description: self.description,
            service: self.service,
            category: self.category,
            status: self.status,
            current_file: self.current_file,
            uploader_id: self.uploader_id,
            tags: self.tags,
            metadata: self.metadata,
            versions: self.versions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_document(id)
    }
}

fn first_row(rows: Vec<DocumentRow>, id: Uuid) -> Result<Document, DbError> {
    let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: ENTITY.into(),
        id: id.to_string(),
    })?;
    row.into_document(id)
}

/// SurrealDB implementation of the Document repository.
#[derive(Clone)]
pub struct SurrealDocumentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDocumentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn push_version(
        &self,
        id: Uuid,
        file: StoredFile,
        uploaded_by: Uuid,
    ) -> Result<Document, DbError> {
        // UPDATE on a missing record matches nothing and returns no row.
        let result = self
            .db
            .query(
                "UPDATE type::record('document', $id) SET \
                 versions += { number: array::len(versions) + 1, \
                               storage_id: $storage_id, url: $url, \
                               size: $size, format: $format, \
                               uploaded_by: $uploaded_by, \
                               uploaded_at: time::now() }, \
                 current_file = { storage_id: $storage_id, url: $url, \
                                  size: $size, format: $format }, \
                 updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("storage_id", file.storage_id))
            .bind(("url", file.url))
            .bind(("size", file.size))
            .bind(("format", file.format))
            .bind(("uploaded_by", uploaded_by.to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        first_row(rows, id)
    }
}

impl<C: Connection> DocumentRepository for SurrealDocumentRepository<C> {
    async fn create(&self, input: CreateDocument) -> ArchiveResult<Document> {
        let id = Uuid::new_v4();
        let document = Document::new(id, input, Utc::now())?;
        let file = document.current_file.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('document', $id) SET \
                 title = $title, description = $description, \
                 service = $service, category = $category, \
                 status = $status, uploader_id = $uploader_id, \
                 current_file = { storage_id: $storage_id, url: $url, \
                                  size: $size, format: $format }, \
                 versions = [{ number: 1, storage_id: $storage_id, \
                               url: $url, size: $size, format: $format, \
                               uploaded_by: $uploader_id, \
                               uploaded_at: $created_at }], \
                 tags = $tags, metadata = $metadata, \
                 created_at = $created_at, updated_at = $created_at",
            )
            .bind(("id", id.to_string()))
            .bind(("title", document.title))
            .bind(("description", document.description))
            .bind(("service", String::from(document.service)))
            .bind(("category", document.category))
            .bind(("status", document.status.as_str().to_string()))
            .bind(("uploader_id", document.uploader_id.to_string()))
            .bind(("storage_id", file.storage_id))
            .bind(("url", file.url))
            .bind(("size", file.size))
            .bind(("format", file.format))
            .bind(("tags", document.tags.into_iter().collect::<Vec<_>>()))
            .bind(("metadata", serde_json::Value::Object(document.metadata)))
            .bind(("created_at", document.created_at))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> ArchiveResult<Document> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('document', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, id)?)
    }

    async fn append_version(
        &self,
        id: Uuid,
        file: StoredFile,
        uploaded_by: Uuid,
    ) -> ArchiveResult<Document> {
        let doc = retry_write(ENTITY, || {
            self.push_version(id, file.clone(), uploaded_by)
        })
        .await?;
        Ok(doc)
    }

    async fn update(&self, id: Uuid, input: UpdateDocument) -> ArchiveResult<Document> {
        let input = input.normalized()?;

        let mut sets = Vec::new();
        if input.title.is_some() {
            sets.push("title = $title");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.category.is_some() {
            sets.push("category = $category");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.tags.is_some() {
            sets.push("tags = $tags");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('document', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));

        if let Some(title) = input.title {
            builder = builder.bind(("title", title));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(category) = input.category {
            builder = builder.bind(("category", category));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }
        if let Some(tags) = input.tags {
            builder = builder.bind(("tags", tags));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", serde_json::Value::Object(metadata)));
        }

        let result = builder.await.map_err(|e| DbError::query(ENTITY, e))?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, id)?)
    }

    async fn delete(&self, id: Uuid) -> ArchiveResult<Document> {
        let result = self
            .db
            .query("DELETE type::record('document', $id) RETURN BEFORE")
            .bind(("id", id.to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<DocumentRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, id)?)
    }

    async fn list(
        &self,
        filter: &Filter,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<Document>> {
        let clause = translate(filter, &DOCUMENT_COLUMNS)?;
        let condition = clause.sql();

        let query = format!(
            "SELECT count() AS total FROM document{condition} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM document{condition} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );

        let result = self
            .db
            .query(&query)
            .bind((CRITERIA_PARAM, clause.params()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<DocumentRowWithId> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_document())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult::new(
            items,
            pagination,
            CountRow::total(&count_rows),
        ))
    }
}
