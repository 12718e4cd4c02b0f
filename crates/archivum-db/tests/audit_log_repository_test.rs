//! Integration tests for the append-only AuditLog repository.

use archivum_core::models::audit::{AuditAction, CreateAuditLogEntry};
use archivum_core::repository::{AuditLogFilter, AuditLogRepository, Pagination};
use archivum_db::repository::SurrealAuditLogRepository;
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealAuditLogRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    archivum_db::run_migrations(&db).await.unwrap();
    SurrealAuditLogRepository::new(db)
}

fn entry(actor: Uuid, action: AuditAction, resource_id: &str) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        actor_id: actor,
        action: action.into(),
        resource_type: "document".into(),
        resource_id: Some(resource_id.into()),
        details: json!({ "title": "Facture" }),
        source_address: Some("10.0.0.7".into()),
    }
}

#[tokio::test]
async fn append_redacts_sensitive_details() {
    let repo = setup().await;
    let actor = Uuid::new_v4();

    let stored = repo
        .append(CreateAuditLogEntry {
            details: json!({
                "title": "Facture",
                "password": "hunter2",
                "nested": { "Token": "abc", "kept": 1 }
            }),
            ..entry(actor, AuditAction::DocumentCreate, "d1")
        })
        .await
        .unwrap();

    assert_eq!(stored.actor_id, actor);
    assert_eq!(stored.action, "document.create");
    assert_eq!(
        stored.details,
        json!({ "title": "Facture", "nested": { "kept": 1 } })
    );
    assert_eq!(stored.source_address.as_deref(), Some("10.0.0.7"));
}

#[tokio::test]
async fn list_filters_by_actor_and_resource() {
    let repo = setup().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    repo.append(entry(alice, AuditAction::DocumentCreate, "d1"))
        .await
        .unwrap();
    repo.append(entry(alice, AuditAction::DocumentRead, "d1"))
        .await
        .unwrap();
    repo.append(entry(bob, AuditAction::DocumentRead, "d2"))
        .await
        .unwrap();

    let by_alice = repo
        .list(
            AuditLogFilter {
                actor_id: Some(alice),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_alice.total, 2);

    let reads_of_d1 = repo
        .list(
            AuditLogFilter {
                action: Some(AuditAction::DocumentRead.into()),
                resource_id: Some("d1".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(reads_of_d1.total, 1);
    assert_eq!(reads_of_d1.items[0].actor_id, alice);
}

#[tokio::test]
async fn stored_entries_cannot_be_rewritten_or_removed() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    archivum_db::run_migrations(&db).await.unwrap();
    let repo = SurrealAuditLogRepository::new(db.clone());

    let actor = Uuid::new_v4();
    repo.append(entry(actor, AuditAction::DocumentDelete, "d1"))
        .await
        .unwrap();

    // The in-memory session has root privileges, like the server's.
    let update = db
        .query("UPDATE audit_log SET action = 'document.read'")
        .await
        .and_then(|response| response.check());
    assert!(update.is_err(), "audit entries must not be updated");

    let delete = db
        .query("DELETE audit_log")
        .await
        .and_then(|response| response.check());
    assert!(delete.is_err(), "audit entries must not be deleted");

    let page = repo
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].action, "document.delete");
}
