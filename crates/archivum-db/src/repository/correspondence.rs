//! SurrealDB implementation of [`CorrespondenceRepository`].

use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::filter::Filter;
use archivum_core::models::correspondence::{
    CorrespondenceRecord, CorrespondenceStatus, CreateCorrespondence,
};
use archivum_core::models::identity::ServiceCode;
use archivum_core::repository::{CorrespondenceRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, into_object, parse_optional_uuid, parse_uuid, retry_write};
use crate::error::DbError;
use crate::query::{CORRESPONDENCE_COLUMNS, CRITERIA_PARAM, translate};

const ENTITY: &str = "correspondence";

/// DB-side row struct for statements where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct CorrespondenceRow {
    reference: String,
    subject: String,
    sender: String,
    recipient: String,
    service: String,
    linked_document_id: Option<String>,
    status: String,
    processed_by: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    notes: String,
    metadata: serde_json::Value,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct CorrespondenceRowWithId {
    record_id: String,
    reference: String,
    subject: String,
    sender: String,
    recipient: String,
    service: String,
    linked_document_id: Option<String>,
    status: String,
    processed_by: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    notes: String,
    metadata: serde_json::Value,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CorrespondenceRow {
    fn into_record(self, id: Uuid) -> Result<CorrespondenceRecord, DbError> {
        let status: CorrespondenceStatus = self
            .status
            .parse()
            .map_err(|_| DbError::decode(ENTITY, format!("unknown status: {}", self.status)))?;
        let service =
            ServiceCode::new(self.service).map_err(|e| DbError::decode(ENTITY, e.to_string()))?;

        Ok(CorrespondenceRecord {
            id,
            reference: self.reference,
            subject: self.subject,
            sender: self.sender,
            recipient: self.recipient,
            service,
            linked_document_id: parse_optional_uuid(ENTITY, self.linked_document_id.as_deref())?,
            status,
            processed_by: parse_optional_uuid(ENTITY, self.processed_by.as_deref())?,
            processed_at: self.processed_at,
            notes: self.notes,
            metadata: into_object(self.metadata),
            created_by: parse_uuid(ENTITY, &self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl CorrespondenceRowWithId {
    fn try_into_record(self) -> Result<CorrespondenceRecord, DbError> {
        let id = parse_uuid(ENTITY, &self.record_id)?;
        CorrespondenceRow {
            reference: self.reference,
            subject: self.subject,
            sender: self.sender,
            recipient: self.recipient,
            service: self.service,
            linked_document_id: self.linked_document_id,
            status: self.status,
            processed_by: self.processed_by,
            processed_at: self.processed_at,
            notes: self.notes,
            metadata: self.metadata,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_record(id)
    }
}

/// SurrealDB implementation of the Correspondence repository.
#[derive(Clone)]
pub struct SurrealCorrespondenceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCorrespondenceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn insert(
        &self,
        reference: &str,
        created_by: Uuid,
        service: ServiceCode,
        input: CreateCorrespondence,
    ) -> Result<CorrespondenceRecord, DbError> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('correspondence', $id) SET \
                 reference = $reference, subject = $subject, \
                 sender = $sender, recipient = $recipient, \
                 service = $service, \
                 linked_document_id = $linked_document_id, \
                 status = 'pending', \
                 processed_by = NONE, processed_at = NONE, \
                 notes = $notes, metadata = $metadata, \
                 created_by = $created_by",
            )
            .bind(("id", id_str.clone()))
            .bind(("reference", reference.to_string()))
            .bind(("subject", input.subject))
            .bind(("sender", input.sender))
            .bind(("recipient", input.recipient))
            .bind(("service", String::from(service)))
            .bind((
                "linked_document_id",
                input.linked_document_id.map(|d| d.to_string()),
            ))
            .bind(("notes", input.notes.unwrap_or_default()))
            .bind((
                "metadata",
                serde_json::Value::Object(input.metadata.unwrap_or_default()),
            ))
            .bind(("created_by", created_by.to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<CorrespondenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        row.into_record(id)
    }
}

impl<C: Connection> CorrespondenceRepository for SurrealCorrespondenceRepository<C> {
    async fn create(
        &self,
        reference: &str,
        created_by: Uuid,
        input: CreateCorrespondence,
    ) -> ArchiveResult<CorrespondenceRecord> {
        let input = input.normalized()?;
        let service = input.service_code()?;

        let record = retry_write(ENTITY, || {
            self.insert(reference, created_by, service.clone(), input.clone())
        })
        .await?;
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> ArchiveResult<CorrespondenceRecord> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('correspondence', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<CorrespondenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.into_record(id)?)
    }

    async fn get_by_reference(&self, reference: &str) -> ArchiveResult<CorrespondenceRecord> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM correspondence \
                 WHERE reference = $reference",
            )
            .bind(("reference", reference.to_string()))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<CorrespondenceRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: format!("reference={reference}"),
        })?;

        Ok(row.try_into_record()?)
    }

    async fn transition(
        &self,
        id: Uuid,
        to: CorrespondenceStatus,
        actor_id: Uuid,
        notes: Option<String>,
    ) -> ArchiveResult<CorrespondenceRecord> {
        let mut sets = vec!["status = $to", "updated_at = time::now()"];
        if to == CorrespondenceStatus::Processed {
            sets.push("processed_by = $actor_id");
            sets.push("processed_at = time::now()");
        }
        if notes.is_some() {
            sets.push("notes = $notes");
        }

        // The WHERE guard makes the status check and the write one step.
        let query = format!(
            "UPDATE type::record('correspondence', $id) SET {} WHERE status IN $from",
            sets.join(", ")
        );

        let from: Vec<String> = to
            .allowed_sources()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("to", to.as_str().to_string()))
            .bind(("from", from))
            .bind(("actor_id", actor_id.to_string()));
        if let Some(notes) = notes {
            builder = builder.bind(("notes", notes.trim().to_string()));
        }

        let result = builder.await.map_err(|e| DbError::query(ENTITY, e))?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<CorrespondenceRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.into_record(id)?);
        }

        // Nothing matched: either the record is gone or its status forbids
        // the move.
        let current = self.get_by_id(id).await?;
        Err(ArchiveError::validation(format!(
            "correspondence {} cannot move from {} to {}",
            current.reference, current.status, to
        )))
    }

    async fn count(&self) -> ArchiveResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM correspondence GROUP ALL")
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total(&rows))
    }

    async fn list(
        &self,
        filter: &Filter,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<CorrespondenceRecord>> {
        let clause = translate(filter, &CORRESPONDENCE_COLUMNS)?;
        let condition = clause.sql();

        let query = format!(
            "SELECT count() AS total FROM correspondence{condition} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM correspondence{condition} \
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
        let rows: Vec<CorrespondenceRowWithId> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult::new(
            items,
            pagination,
            CountRow::total(&count_rows),
        ))
    }
}
