//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table is append-only: this repository exposes no update or delete
//! and the schema denies both. Details are redacted here, at the
//! persistence boundary, so no caller can store a secret by mistake.

use archivum_core::error::ArchiveResult;
use archivum_core::models::audit::{AuditLogEntry, CreateAuditLogEntry};
use archivum_core::redaction::redact_sensitive;
use archivum_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "audit_log";

#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    actor_id: String,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: Value,
    source_address: Option<String>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AuditLogRowWithId {
    record_id: String,
    actor_id: String,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    details: Value,
    source_address: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditLogRow {
    fn into_entry(self, id: Uuid) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry {
            id,
            actor_id: parse_uuid(ENTITY, &self.actor_id)?,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            details: self.details,
            source_address: self.source_address,
            timestamp: self.timestamp,
        })
    }
}

impl AuditLogRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = parse_uuid(ENTITY, &self.record_id)?;
        AuditLogRow {
            actor_id: self.actor_id,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            details: self.details,
            source_address: self.source_address,
            timestamp: self.timestamp,
        }
        .into_entry(id)
    }
}

/// `details` is stored as an object; other JSON shapes are wrapped.
fn stored_details(details: Value) -> Value {
    match redact_sensitive(details) {
        Value::Null => json!({}),
        obj @ Value::Object(_) => obj,
        other => json!({ "value": other }),
    }
}

/// SurrealDB implementation of the AuditLog repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> ArchiveResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 actor_id = $actor_id, action = $action, \
                 resource_type = $resource_type, \
                 resource_id = $resource_id, details = $details, \
                 source_address = $source_address",
            )
            .bind(("id", id_str.clone()))
            .bind(("actor_id", input.actor_id.to_string()))
            .bind(("action", input.action))
            .bind(("resource_type", input.resource_type))
            .bind(("resource_id", input.resource_id))
            .bind(("details", stored_details(input.details)))
            .bind(("source_address", input.source_address))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<AuditLogRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<AuditLogEntry>> {
        let mut conditions = Vec::new();
        if filter.actor_id.is_some() {
            conditions.push("actor_id = $actor_id");
        }
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.resource_type.is_some() {
            conditions.push("resource_type = $resource_type");
        }
        if filter.resource_id.is_some() {
            conditions.push("resource_id = $resource_id");
        }
        if filter.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conditions.push("timestamp <= $to");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT count() AS total FROM audit_log{where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log{where_clause} \
             ORDER BY timestamp DESC \
             LIMIT $limit START $offset"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset()));

        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(resource_type) = filter.resource_type {
            builder = builder.bind(("resource_type", resource_type));
        }
        if let Some(resource_id) = filter.resource_id {
            builder = builder.bind(("resource_id", resource_id));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let result = builder.await.map_err(|e| DbError::query(ENTITY, e))?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<AuditLogRowWithId> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult::new(
            items,
            pagination,
            CountRow::total(&count_rows),
        ))
    }
}
