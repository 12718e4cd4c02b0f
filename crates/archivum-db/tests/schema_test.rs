//! Schema and migration tests against in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn migrated() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    archivum_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn migration_defines_archive_tables() {
    let db = migrated().await;

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = format!("{:?}", info.expect("INFO FOR DB should return a value"));

    for table in [
        "user",
        "service_scope",
        "document",
        "correspondence",
        "sequence",
        "audit_log",
        "_migration",
    ] {
        assert!(info.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = migrated().await;
    archivum_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn duplicate_reference_is_rejected() {
    let db = migrated().await;

    let insert = "CREATE correspondence SET \
                  reference = 'COUR-2024-00001', subject = 's', \
                  sender = 'a', recipient = 'b', service = 'RH', \
                  status = 'pending', created_by = 'x'";

    db.query(insert).await.unwrap().check().unwrap();
    let second = db.query(insert).await.unwrap().check();

    assert!(second.is_err(), "duplicate reference should be rejected");
}

#[tokio::test]
async fn document_status_is_constrained() {
    let db = migrated().await;

    let result = db
        .query(
            "CREATE document SET title = 't', service = 'RH', \
             category = 'c', status = 'shredded', uploader_id = 'u', \
             current_file = { storage_id: 's', url: 'u', size: 1, format: 'pdf' }, \
             versions = []",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown status should be rejected");
}
