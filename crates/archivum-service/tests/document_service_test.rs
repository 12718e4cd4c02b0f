//! Integration tests for DocumentService over in-memory SurrealDB.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::filter::SearchCriteria;
use archivum_core::models::document::{CreateDocument, UpdateDocument};
use archivum_core::models::identity::{Actor, Identity, Role, ServiceCode};
use archivum_core::models::service_scope::{
    CreateServiceScope, ServiceScope, UpdateServiceScope,
};
use archivum_core::repository::{
    AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination, ServiceScopeRepository,
};
use archivum_core::storage::{BlobStore, ResourceKind, StoredFile};
use archivum_db::repository::{
    SurrealAuditLogRepository, SurrealDocumentRepository, SurrealServiceScopeRepository,
};
use archivum_db::{LocalBlobStore, StorageConfig};
use archivum_service::{
    AuditHandle, DocumentDraft, DocumentService, FileUpload, ServiceConfig, audit_channel,
};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

/// Blob store that hands out sequential ids and records removals.
#[derive(Clone, Default)]
struct RecordingBlobs {
    stored: Arc<AtomicUsize>,
    removed: Arc<Mutex<Vec<String>>>,
    fail_removals: bool,
}

impl RecordingBlobs {
    fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

impl BlobStore for RecordingBlobs {
    async fn store(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        _mime_type: &str,
    ) -> ArchiveResult<StoredFile> {
        let n = self.stored.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(file_with(&format!("{folder}/blob-{n}.pdf"), bytes.len() as u64))
    }

    async fn remove(&self, storage_id: &str, _kind: ResourceKind) -> ArchiveResult<bool> {
        if self.fail_removals {
            return Err(ArchiveError::Dependency("blob store offline".into()));
        }
        self.removed.lock().unwrap().push(storage_id.to_string());
        Ok(true)
    }
}

/// Service-scope store that counts existence lookups.
struct CountingScopes {
    inner: SurrealServiceScopeRepository<Db>,
    lookups: Arc<AtomicUsize>,
}

impl ServiceScopeRepository for CountingScopes {
    async fn create(&self, input: CreateServiceScope) -> ArchiveResult<ServiceScope> {
        self.inner.create(input).await
    }

    async fn get_by_id(&self, id: Uuid) -> ArchiveResult<ServiceScope> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_code(&self, code: &ServiceCode) -> ArchiveResult<ServiceScope> {
        self.inner.get_by_code(code).await
    }

    async fn exists(&self, code: &ServiceCode) -> ArchiveResult<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(code).await
    }

    async fn update(&self, id: Uuid, input: UpdateServiceScope) -> ArchiveResult<ServiceScope> {
        self.inner.update(id, input).await
    }

    async fn add_member(&self, id: Uuid, user_id: Uuid) -> ArchiveResult<ServiceScope> {
        self.inner.add_member(id, user_id).await
    }

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> ArchiveResult<ServiceScope> {
        self.inner.remove_member(id, user_id).await
    }

    async fn list(&self, pagination: Pagination) -> ArchiveResult<PaginatedResult<ServiceScope>> {
        self.inner.list(pagination).await
    }
}

type Service<B> = DocumentService<SurrealDocumentRepository<Db>, SurrealServiceScopeRepository<Db>, B>;

struct Fixture<B: BlobStore> {
    db: Surreal<Db>,
    service: Service<B>,
    audit: AuditHandle,
}

async fn setup_with<B: BlobStore>(blobs: B) -> Fixture<B> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    archivum_db::run_migrations(&db).await.unwrap();

    let scopes = SurrealServiceScopeRepository::new(db.clone());
    for (name, code) in [("Comptabilité", "Comptabilité"), ("Ressources humaines", "RH")] {
        scopes
            .create(CreateServiceScope {
                name: name.into(),
                code: ServiceCode::new(code).unwrap(),
                responsible: None,
            })
            .await
            .unwrap();
    }

    let (recorder, worker) = audit_channel(SurrealAuditLogRepository::new(db.clone()), 64);
    let service = DocumentService::new(
        SurrealDocumentRepository::new(db.clone()),
        scopes,
        blobs,
        recorder,
        &ServiceConfig::default(),
    );

    Fixture {
        db,
        service,
        audit: worker.spawn(),
    }
}

async fn setup() -> (Fixture<RecordingBlobs>, RecordingBlobs) {
    let blobs = RecordingBlobs::default();
    (setup_with(blobs.clone()).await, blobs)
}

fn actor(role: Role, service: &str) -> Actor {
    Actor::new(Identity {
        id: Uuid::new_v4(),
        role,
        service: ServiceCode::new(service).unwrap(),
        is_active: true,
    })
}

fn file_with(storage_id: &str, size: u64) -> StoredFile {
    StoredFile {
        storage_id: storage_id.into(),
        url: format!("https://files.example/raw/{storage_id}"),
        size,
        format: "pdf".into(),
    }
}

fn file(storage_id: &str) -> StoredFile {
    file_with(storage_id, 2048)
}

fn document(title: &str, service: &str, storage_id: &str) -> CreateDocument {
    CreateDocument {
        title: title.into(),
        description: None,
        service: service.into(),
        category: "invoice".into(),
        status: None,
        tags: vec![],
        metadata: None,
        file: file(storage_id),
        // Overwritten with the acting identity.
        uploader_id: Uuid::nil(),
    }
}

fn pdf() -> FileUpload {
    FileUpload {
        bytes: b"%PDF-1.7 test".to_vec(),
        mime_type: "application/pdf".into(),
    }
}

#[tokio::test]
async fn services_only_see_their_own_documents() {
    let (fx, _) = setup().await;
    let compta = actor(Role::User, "Comptabilité");
    let rh = actor(Role::User, "RH");

    let invoice = fx
        .service
        .create(&compta, document("Facture", "Comptabilité", "f1"))
        .await
        .unwrap();
    assert_eq!(invoice.uploader_id, compta.id());

    let err = fx.service.get(&rh, invoice.id).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Forbidden { .. }));

    // Asking for another service is ignored for non-super-admins.
    let criteria = SearchCriteria {
        service: Some(ServiceCode::new("Comptabilité").unwrap()),
        ..Default::default()
    };
    let page = fx
        .service
        .search(&rh, &criteria, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    let page = fx
        .service
        .search(&compta, &SearchCriteria::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let err = fx
        .service
        .create(&rh, document("Facture RH", "Comptabilité", "f2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Forbidden { .. }));
}

#[tokio::test]
async fn super_admin_sees_across_services() {
    let (fx, _) = setup().await;
    fx.service
        .create(&actor(Role::User, "Comptabilité"), document("Facture", "Comptabilité", "f1"))
        .await
        .unwrap();
    fx.service
        .create(&actor(Role::User, "RH"), document("Contrat", "RH", "c1"))
        .await
        .unwrap();

    let root = actor(Role::SuperAdmin, "DG");
    let all = fx
        .service
        .search(&root, &SearchCriteria::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);

    let rh_only = SearchCriteria {
        service: Some(ServiceCode::new("RH").unwrap()),
        ..Default::default()
    };
    let page = fx
        .service
        .search(&root, &rh_only, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].title, "Contrat");
}

#[tokio::test]
async fn admin_may_write_but_not_read_across_services() {
    let (fx, _) = setup().await;
    let contract = fx
        .service
        .create(&actor(Role::User, "RH"), document("Contrat", "RH", "c1"))
        .await
        .unwrap();
    let admin = actor(Role::Admin, "Comptabilité");

    assert!(matches!(
        fx.service.get(&admin, contract.id).await.unwrap_err(),
        ArchiveError::Forbidden { .. }
    ));

    let updated = fx
        .service
        .update_metadata(
            &admin,
            contract.id,
            UpdateDocument {
                category: Some("contract".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.category, "contract");
}

#[tokio::test]
async fn facture_accumulates_versions() {
    let (fx, _) = setup().await;
    let owner = actor(Role::User, "Comptabilité");

    let doc = fx
        .service
        .create(&owner, document("Facture", "Comptabilité", "f1"))
        .await
        .unwrap();
    fx.service
        .append_version(&owner, doc.id, file("f2"))
        .await
        .unwrap();
    let doc = fx
        .service
        .append_version(&owner, doc.id, file("f3"))
        .await
        .unwrap();

    assert_eq!(doc.current_file.storage_id, "f3");
    assert!(doc.history_is_consistent());

    let versions = fx.service.versions(&owner, doc.id).await.unwrap();
    let listed: Vec<_> = versions
        .iter()
        .map(|v| (v.number, v.file.storage_id.as_str()))
        .collect();
    assert_eq!(listed, vec![(1, "f1"), (2, "f2"), (3, "f3")]);
    assert!(versions.iter().all(|v| v.uploaded_by == owner.id()));
}

#[tokio::test]
async fn colleague_cannot_append_to_someone_elses_document() {
    let (fx, _) = setup().await;
    let owner = actor(Role::User, "RH");
    let doc = fx
        .service
        .create(&owner, document("Contrat", "RH", "c1"))
        .await
        .unwrap();

    let err = fx
        .service
        .append_version(&actor(Role::User, "RH"), doc.id, file("c2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Forbidden { .. }));

    let versions = fx.service.versions(&owner, doc.id).await.unwrap();
    assert_eq!(versions.len(), 1);
}

#[tokio::test]
async fn create_requires_known_service_and_fields() {
    let (fx, _) = setup().await;
    let root = actor(Role::SuperAdmin, "DG");

    let err = fx
        .service
        .create(&root, document("Note", "Logistique", "n1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Validation { .. }));

    let err = fx
        .service
        .create(&root, document("Note", "RH", "  "))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Validation { .. }));
}

#[tokio::test]
async fn inactive_identity_is_refused() {
    let (fx, _) = setup().await;
    let mut retired = actor(Role::Admin, "RH");
    retired.identity.is_active = false;

    let err = fx
        .service
        .create(&retired, document("Contrat", "RH", "c1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Forbidden { .. }));

    let err = fx
        .service
        .search(&retired, &SearchCriteria::default(), Pagination::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Forbidden { .. }));
}

#[tokio::test]
async fn metadata_patch_merges_keys() {
    let (fx, _) = setup().await;
    let owner = actor(Role::User, "RH");
    let doc = fx
        .service
        .create(
            &owner,
            CreateDocument {
                metadata: Some(
                    json!({ "student_id": "S-42", "draft_note": "relire" })
                        .as_object()
                        .unwrap()
                        .clone(),
                ),
                ..document("Dossier", "RH", "d1")
            },
        )
        .await
        .unwrap();

    let updated = fx
        .service
        .update_metadata(
            &owner,
            doc.id,
            UpdateDocument {
                title: Some("Dossier Dupont".into()),
                metadata: Some(
                    json!({ "draft_note": null, "year": 2024 })
                        .as_object()
                        .unwrap()
                        .clone(),
                ),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Dossier Dupont");
    assert_eq!(updated.metadata.get("student_id"), Some(&json!("S-42")));
    assert_eq!(updated.metadata.get("year"), Some(&json!(2024)));
    assert!(!updated.metadata.contains_key("draft_note"));
    assert_eq!(updated.versions, doc.versions);

    let err = fx
        .service
        .update_metadata(&owner, doc.id, UpdateDocument::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Validation { .. }));
}

#[tokio::test]
async fn delete_removes_each_payload_once() {
    let (fx, blobs) = setup().await;
    let owner = actor(Role::User, "RH");
    let doc = fx
        .service
        .create(&owner, document("Contrat", "RH", "c1"))
        .await
        .unwrap();
    fx.service
        .append_version(&owner, doc.id, file("c2"))
        .await
        .unwrap();
    // Re-upload of the first payload.
    fx.service
        .append_version(&owner, doc.id, file("c1"))
        .await
        .unwrap();

    let deleted = fx.service.delete(&owner, doc.id).await.unwrap();
    assert_eq!(deleted.versions.len(), 3);

    let mut removed = blobs.removed();
    removed.sort();
    assert_eq!(removed, vec!["c1".to_string(), "c2".to_string()]);

    assert!(matches!(
        fx.service.get(&owner, doc.id).await.unwrap_err(),
        ArchiveError::NotFound { .. }
    ));
    let page = fx
        .service
        .search(&owner, &SearchCriteria::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn delete_succeeds_when_blob_removal_fails() {
    let blobs = RecordingBlobs {
        fail_removals: true,
        ..Default::default()
    };
    let fx = setup_with(blobs).await;
    let owner = actor(Role::User, "RH");
    let doc = fx
        .service
        .create(&owner, document("Contrat", "RH", "c1"))
        .await
        .unwrap();

    fx.service.delete(&owner, doc.id).await.unwrap();

    assert!(matches!(
        fx.service.get(&owner, doc.id).await.unwrap_err(),
        ArchiveError::NotFound { .. }
    ));
}

#[tokio::test]
async fn only_owner_or_admin_deletes() {
    let (fx, blobs) = setup().await;
    let doc = fx
        .service
        .create(&actor(Role::User, "RH"), document("Contrat", "RH", "c1"))
        .await
        .unwrap();

    let err = fx
        .service
        .delete(&actor(Role::User, "RH"), doc.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Forbidden { .. }));
    assert!(blobs.removed().is_empty());

    fx.service
        .delete(&actor(Role::Admin, "RH"), doc.id)
        .await
        .unwrap();
    assert_eq!(blobs.removed(), vec!["c1".to_string()]);
}

#[tokio::test]
async fn failed_upload_discards_stored_payload() {
    let (fx, blobs) = setup().await;
    let owner = actor(Role::User, "RH");

    let err = fx
        .service
        .upload(
            &owner,
            DocumentDraft {
                title: "   ".into(),
                service: "RH".into(),
                category: "contract".into(),
                ..Default::default()
            },
            pdf(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Validation { .. }));
    assert_eq!(blobs.stored.load(Ordering::SeqCst), 1);
    assert_eq!(blobs.removed(), vec!["documents/blob-1.pdf".to_string()]);
}

#[tokio::test]
async fn upload_checks_the_service_once() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    archivum_db::run_migrations(&db).await.unwrap();

    let lookups = Arc::new(AtomicUsize::new(0));
    let scopes = CountingScopes {
        inner: SurrealServiceScopeRepository::new(db.clone()),
        lookups: Arc::clone(&lookups),
    };
    scopes
        .create(CreateServiceScope {
            name: "Ressources humaines".into(),
            code: ServiceCode::new("RH").unwrap(),
            responsible: None,
        })
        .await
        .unwrap();

    let (recorder, _worker) = audit_channel(SurrealAuditLogRepository::new(db.clone()), 16);
    let service = DocumentService::new(
        SurrealDocumentRepository::new(db.clone()),
        scopes,
        RecordingBlobs::default(),
        recorder,
        &ServiceConfig::default(),
    );

    let doc = service
        .upload(
            &actor(Role::User, "RH"),
            DocumentDraft {
                title: "Contrat".into(),
                service: "RH".into(),
                category: "contract".into(),
                ..Default::default()
            },
            pdf(),
        )
        .await
        .unwrap();

    assert_eq!(doc.versions.len(), 1);
    assert_eq!(lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn forbidden_upload_stores_nothing() {
    let (fx, blobs) = setup().await;

    let err = fx
        .service
        .upload(
            &actor(Role::User, "Comptabilité"),
            DocumentDraft {
                title: "Contrat".into(),
                service: "RH".into(),
                category: "contract".into(),
                ..Default::default()
            },
            pdf(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Forbidden { .. }));
    assert_eq!(blobs.stored.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn uploads_land_on_disk_and_leave_on_delete() {
    let dir = tempfile::TempDir::new().unwrap();
    let blobs = LocalBlobStore::new(&StorageConfig {
        root_dir: dir.path().to_path_buf(),
        public_base_url: "/files".into(),
    })
    .await
    .unwrap();
    let fx = setup_with(blobs).await;
    let owner = actor(Role::User, "RH");

    let doc = fx
        .service
        .upload(
            &owner,
            DocumentDraft {
                title: "Contrat".into(),
                service: "RH".into(),
                category: "contract".into(),
                ..Default::default()
            },
            pdf(),
        )
        .await
        .unwrap();
    let doc = fx
        .service
        .upload_version(&owner, doc.id, pdf())
        .await
        .unwrap();

    let paths: Vec<_> = doc
        .versions
        .iter()
        .map(|v| dir.path().join("raw").join(&v.file.storage_id))
        .collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.exists()));
    assert_eq!(doc.current_file.format, "pdf");

    fx.service.delete(&owner, doc.id).await.unwrap();
    assert!(paths.iter().all(|p| !p.exists()));
}

#[tokio::test]
async fn operations_are_audited_after_commit() {
    let (fx, _) = setup().await;
    let owner = actor(Role::User, "RH").with_source_address("192.0.2.10");

    let doc = fx
        .service
        .create(&owner, document("Contrat", "RH", "c1"))
        .await
        .unwrap();
    fx.service.get(&owner, doc.id).await.unwrap();
    // Denied operations leave no trace.
    let _ = fx.service.delete(&actor(Role::User, "RH"), doc.id).await;
    fx.service.delete(&owner, doc.id).await.unwrap();
    fx.audit.shutdown().await;

    let log = SurrealAuditLogRepository::new(fx.db.clone());
    let page = log
        .list(
            AuditLogFilter {
                resource_id: Some(doc.id.to_string()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();

    let mut actions: Vec<_> = page.items.iter().map(|e| e.action.as_str()).collect();
    actions.sort();
    assert_eq!(
        actions,
        vec!["document.create", "document.delete", "document.read"]
    );
    assert!(page.items.iter().all(|e| e.actor_id == owner.id()));
    assert!(
        page.items
            .iter()
            .all(|e| e.source_address.as_deref() == Some("192.0.2.10"))
    );
}
