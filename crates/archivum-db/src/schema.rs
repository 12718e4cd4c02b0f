//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. UUIDs and enums are stored as strings, enums
//! guarded by ASSERT. Uniqueness that the domain relies on (usernames,
//! service codes, correspondence references) is enforced with UNIQUE
//! indexes rather than read-then-write checks.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "archive_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users (identities resolved from bearer tokens)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD full_name ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['user', 'admin', 'super-admin'];
DEFINE FIELD service ON TABLE user TYPE string;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_service ON TABLE user COLUMNS service;

-- =======================================================================
-- Service scopes
-- =======================================================================
DEFINE TABLE service_scope SCHEMAFULL;
DEFINE FIELD name ON TABLE service_scope TYPE string;
DEFINE FIELD code ON TABLE service_scope TYPE string;
DEFINE FIELD members ON TABLE service_scope TYPE array DEFAULT [];
DEFINE FIELD members.* ON TABLE service_scope TYPE string;
DEFINE FIELD responsible ON TABLE service_scope TYPE option<string>;
DEFINE FIELD created_at ON TABLE service_scope TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE service_scope TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_service_scope_code ON TABLE service_scope \
    COLUMNS code UNIQUE;

-- =======================================================================
-- Documents (service scope, versioned)
-- =======================================================================
DEFINE TABLE document SCHEMAFULL;
DEFINE FIELD title ON TABLE document TYPE string;
DEFINE FIELD description ON TABLE document TYPE option<string>;
DEFINE FIELD service ON TABLE document TYPE string;
DEFINE FIELD category ON TABLE document TYPE string;
DEFINE FIELD status ON TABLE document TYPE string \
    ASSERT $value IN ['draft', 'pending', 'signed', 'archived'];
DEFINE FIELD current_file ON TABLE document TYPE object;
DEFINE FIELD current_file.storage_id ON TABLE document TYPE string;
DEFINE FIELD current_file.url ON TABLE document TYPE string;
DEFINE FIELD current_file.size ON TABLE document TYPE int;
DEFINE FIELD current_file.format ON TABLE document TYPE string;
DEFINE FIELD uploader_id ON TABLE document TYPE string;
DEFINE FIELD tags ON TABLE document TYPE array DEFAULT [];
DEFINE FIELD tags.* ON TABLE document TYPE string;
DEFINE FIELD metadata ON TABLE document TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD versions ON TABLE document TYPE array;
DEFINE FIELD versions.* ON TABLE document TYPE object;
DEFINE FIELD versions.*.number ON TABLE document TYPE int;
DEFINE FIELD versions.*.storage_id ON TABLE document TYPE string;
DEFINE FIELD versions.*.url ON TABLE document TYPE string;
DEFINE FIELD versions.*.size ON TABLE document TYPE int;
DEFINE FIELD versions.*.format ON TABLE document TYPE string;
DEFINE FIELD versions.*.uploaded_by ON TABLE document TYPE string;
DEFINE FIELD versions.*.uploaded_at ON TABLE document TYPE datetime;
DEFINE FIELD created_at ON TABLE document TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE document TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_document_service_time ON TABLE document \
    COLUMNS service, created_at;

-- =======================================================================
-- Correspondence (service scope)
-- =======================================================================
DEFINE TABLE correspondence SCHEMAFULL;
DEFINE FIELD reference ON TABLE correspondence TYPE string;
DEFINE FIELD subject ON TABLE correspondence TYPE string;
DEFINE FIELD sender ON TABLE correspondence TYPE string;
DEFINE FIELD recipient ON TABLE correspondence TYPE string;
DEFINE FIELD service ON TABLE correspondence TYPE string;
DEFINE FIELD linked_document_id ON TABLE correspondence \
    TYPE option<string>;
DEFINE FIELD status ON TABLE correspondence TYPE string \
    ASSERT $value IN ['pending', 'processed', 'archived'];
DEFINE FIELD processed_by ON TABLE correspondence TYPE option<string>;
DEFINE FIELD processed_at ON TABLE correspondence TYPE option<datetime>;
DEFINE FIELD notes ON TABLE correspondence TYPE string DEFAULT '';
DEFINE FIELD metadata ON TABLE correspondence TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_by ON TABLE correspondence TYPE string;
DEFINE FIELD created_at ON TABLE correspondence TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE correspondence TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_correspondence_reference ON TABLE correspondence \
    COLUMNS reference UNIQUE;
DEFINE INDEX idx_correspondence_service_time ON TABLE correspondence \
    COLUMNS service, created_at;

-- =======================================================================
-- Named counters (record id is the counter key)
-- =======================================================================
DEFINE TABLE sequence SCHEMAFULL;
DEFINE FIELD value ON TABLE sequence TYPE int;
DEFINE FIELD updated_at ON TABLE sequence TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
-- Table permissions only bind record-level sessions; the event also
-- stops root and namespace users.
DEFINE EVENT audit_log_append_only ON TABLE audit_log \
    WHEN $event = 'UPDATE' OR $event = 'DELETE' \
    THEN { THROW 'audit_log is append-only' };
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource_type ON TABLE audit_log TYPE string;
DEFINE FIELD resource_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD details ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD source_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_actor_time ON TABLE audit_log \
    COLUMNS actor_id, timestamp;
DEFINE INDEX idx_audit_resource ON TABLE audit_log \
    COLUMNS resource_type, resource_id;
";

// -----------------------------------------------------------------------
// Runner
// -----------------------------------------------------------------------

/// Bring the database up to the latest schema version.
///
/// Safe to call on every start: only migrations newer than the highest
/// recorded `_migration.version` are applied.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = applied_version(db).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > current);

    for migration in pending {
        apply(db, migration).await?;
    }

    Ok(())
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    info!(
        version = migration.version,
        name = migration.name,
        "Applying migration"
    );

    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "v{} '{}': {e}",
            migration.version, migration.name
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!("recording v{}: {e}", migration.version))
        })?;

    info!(version = migration.version, "Migration applied");
    Ok(())
}

/// Raw DDL of the first schema version.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
