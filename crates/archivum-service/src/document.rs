//! Document service: access-checked, audited operations over versioned
//! documents and their stored payloads.

use archivum_core::access::{Operation, ResourceRef, ensure_access, ensure_role};
use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::filter::{SearchCriteria, build_filter};
use archivum_core::models::audit::AuditAction;
use archivum_core::models::document::{
    CreateDocument, Document, DocumentStatus, DocumentVersion, UpdateDocument, merge_metadata,
};
use archivum_core::models::identity::{Actor, Role, ServiceCode};
use archivum_core::repository::{
    DocumentRepository, PaginatedResult, Pagination, ServiceScopeRepository,
};
use archivum_core::storage::{BlobStore, StoredFile};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::AuditRecorder;
use crate::config::ServiceConfig;

const RESOURCE: &str = "document";

/// Raw payload handed in by a caller.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Document fields supplied alongside an upload; the file reference is
/// filled in once the payload is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub title: String,
    pub description: Option<String>,
    pub service: String,
    pub category: String,
    pub status: Option<DocumentStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl DocumentDraft {
    fn into_create(self, file: StoredFile, uploader_id: Uuid) -> CreateDocument {
        CreateDocument {
            title: self.title,
            description: self.description,
            service: self.service,
            category: self.category,
            status: self.status,
            tags: self.tags,
            metadata: self.metadata,
            file,
            uploader_id,
        }
    }
}

pub struct DocumentService<D, S, B>
where
    D: DocumentRepository,
    S: ServiceScopeRepository,
    B: BlobStore,
{
    documents: D,
    services: S,
    blobs: B,
    audit: AuditRecorder,
    folder: String,
}

impl<D, S, B> DocumentService<D, S, B>
where
    D: DocumentRepository,
    S: ServiceScopeRepository,
    B: BlobStore,
{
    pub fn new(
        documents: D,
        services: S,
        blobs: B,
        audit: AuditRecorder,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            documents,
            services,
            blobs,
            audit,
            folder: config.document_folder.clone(),
        }
    }

    /// Create a document whose first version is an already stored file.
    ///
    /// The uploader is always the acting identity.
    pub async fn create(&self, actor: &Actor, input: CreateDocument) -> ArchiveResult<Document> {
        let input = CreateDocument {
            uploader_id: actor.id(),
            ..input
        }
        .normalized()?;
        self.authorize_create(actor, &input.service).await?;
        self.insert(actor, input).await
    }

    /// Store `upload` and create a document holding it as version #1.
    ///
    /// Access is checked before anything is stored. If the record cannot
    /// be created, the stored payload is removed again.
    pub async fn upload(
        &self,
        actor: &Actor,
        draft: DocumentDraft,
        upload: FileUpload,
    ) -> ArchiveResult<Document> {
        self.authorize_create(actor, &draft.service).await?;

        let file = self
            .blobs
            .store(upload.bytes, &self.folder, &upload.mime_type)
            .await?;

        let created = match draft.into_create(file.clone(), actor.id()).normalized() {
            Ok(input) => self.insert(actor, input).await,
            Err(e) => Err(e),
        };
        if created.is_err() {
            self.discard(&file).await;
        }
        created
    }

    /// Fetch a document. Reads are audited.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> ArchiveResult<Document> {
        let doc = self.documents.get_by_id(id).await?;
        ensure_access(&actor.identity, &doc, Operation::Read)?;

        self.audit.record(
            actor,
            AuditAction::DocumentRead,
            RESOURCE,
            Some(id.to_string()),
            json!({ "service": doc.service.as_str() }),
        );

        Ok(doc)
    }

    /// Version history, oldest first.
    pub async fn versions(&self, actor: &Actor, id: Uuid) -> ArchiveResult<Vec<DocumentVersion>> {
        let doc = self.documents.get_by_id(id).await?;
        ensure_access(&actor.identity, &doc, Operation::Read)?;
        Ok(doc.versions)
    }

    /// Append an already stored file as the next version.
    pub async fn append_version(
        &self,
        actor: &Actor,
        id: Uuid,
        file: StoredFile,
    ) -> ArchiveResult<Document> {
        let doc = self.documents.get_by_id(id).await?;
        ensure_access(&actor.identity, &doc, Operation::Update)?;
        if file.storage_id.trim().is_empty() {
            return Err(ArchiveError::validation("file reference is required"));
        }

        let updated = self.documents.append_version(id, file, actor.id()).await?;
        self.version_appended(actor, &updated);
        Ok(updated)
    }

    /// Store `upload` and append it as the next version.
    pub async fn upload_version(
        &self,
        actor: &Actor,
        id: Uuid,
        upload: FileUpload,
    ) -> ArchiveResult<Document> {
        let doc = self.documents.get_by_id(id).await?;
        ensure_access(&actor.identity, &doc, Operation::Update)?;

        let file = self
            .blobs
            .store(upload.bytes, &self.folder, &upload.mime_type)
            .await?;

        match self
            .documents
            .append_version(id, file.clone(), actor.id())
            .await
        {
            Ok(updated) => {
                self.version_appended(actor, &updated);
                Ok(updated)
            }
            Err(e) => {
                self.discard(&file).await;
                Err(e)
            }
        }
    }

    /// Apply a patch to a document's descriptive fields. Metadata keys
    /// are merged into the stored object; a `null` value removes the key.
    /// The version history is never touched.
    pub async fn update_metadata(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: UpdateDocument,
    ) -> ArchiveResult<Document> {
        let mut patch = patch.normalized()?;
        if patch.is_empty() {
            return Err(ArchiveError::validation("nothing to update"));
        }

        let doc = self.documents.get_by_id(id).await?;
        ensure_access(&actor.identity, &doc, Operation::Update)?;

        let changed = changed_fields(&patch);
        if let Some(metadata) = patch.metadata.take() {
            patch.metadata = Some(merge_metadata(&doc.metadata, metadata));
        }

        let updated = self.documents.update(id, patch).await?;

        info!(document_id = %id, "Document updated");
        self.audit.record(
            actor,
            AuditAction::DocumentUpdate,
            RESOURCE,
            Some(id.to_string()),
            json!({ "fields": changed }),
        );

        Ok(updated)
    }

    /// Delete a document, then remove each distinct payload it ever
    /// referenced. Payload removal failures are logged, not returned.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> ArchiveResult<Document> {
        let doc = self.documents.get_by_id(id).await?;
        ensure_access(&actor.identity, &doc, Operation::Delete)?;

        let deleted = self.documents.delete(id).await?;

        let payloads = deleted.distinct_payloads();
        for file in &payloads {
            self.discard(file).await;
        }

        info!(document_id = %id, payloads = payloads.len(), "Document deleted");
        self.audit.record(
            actor,
            AuditAction::DocumentDelete,
            RESOURCE,
            Some(id.to_string()),
            json!({
                "title": deleted.title,
                "service": deleted.service.as_str(),
                "versions": deleted.versions.len(),
            }),
        );

        Ok(deleted)
    }

    /// Search documents visible to the actor. Non-super-admins only ever
    /// see their own service.
    pub async fn search(
        &self,
        actor: &Actor,
        criteria: &SearchCriteria,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<Document>> {
        ensure_role(&actor.identity, Role::User)?;
        let filter = build_filter(&actor.identity, criteria);
        self.documents.list(&filter, pagination).await
    }

    /// Persist an authorized, normalized document.
    async fn insert(&self, actor: &Actor, input: CreateDocument) -> ArchiveResult<Document> {
        let doc = self.documents.create(input).await?;

        info!(document_id = %doc.id, service = %doc.service, "Document created");
        self.audit.record(
            actor,
            AuditAction::DocumentCreate,
            RESOURCE,
            Some(doc.id.to_string()),
            json!({
                "title": doc.title,
                "service": doc.service.as_str(),
                "category": doc.category,
                "storage_id": doc.current_file.storage_id,
            }),
        );

        Ok(doc)
    }

    async fn authorize_create(&self, actor: &Actor, service: &str) -> ArchiveResult<()> {
        let service = ServiceCode::new(service)?;
        ensure_access(
            &actor.identity,
            &ResourceRef::in_service(&service),
            Operation::Create,
        )?;
        if !self.services.exists(&service).await? {
            return Err(ArchiveError::validation(format!(
                "unknown service: {service}"
            )));
        }
        Ok(())
    }

    fn version_appended(&self, actor: &Actor, doc: &Document) {
        let number = doc.latest_version().map(|v| v.number);
        info!(document_id = %doc.id, version = ?number, "Document version appended");
        self.audit.record(
            actor,
            AuditAction::DocumentVersionAppend,
            RESOURCE,
            Some(doc.id.to_string()),
            json!({
                "version": number,
                "storage_id": doc.current_file.storage_id,
            }),
        );
    }

    async fn discard(&self, file: &StoredFile) {
        match self.blobs.remove(&file.storage_id, file.kind()).await {
            Ok(true) => debug!(storage_id = %file.storage_id, "Payload removed"),
            Ok(false) => debug!(storage_id = %file.storage_id, "Payload already gone"),
            Err(e) => warn!(storage_id = %file.storage_id, error = %e, "Failed to remove payload"),
        }
    }
}

fn changed_fields(patch: &UpdateDocument) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if patch.title.is_some() {
        fields.push("title");
    }
    if patch.description.is_some() {
        fields.push("description");
    }
    if patch.category.is_some() {
        fields.push("category");
    }
    if patch.status.is_some() {
        fields.push("status");
    }
    if patch.tags.is_some() {
        fields.push("tags");
    }
    if patch.metadata.is_some() {
        fields.push("metadata");
    }
    fields
}
