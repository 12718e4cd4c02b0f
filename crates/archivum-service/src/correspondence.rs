//! Correspondence service: referenced mail records and their
//! pending → processed → archived lifecycle.

use archivum_core::access::{Operation, ResourceRef, ensure_access, ensure_role};
use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::filter::{SearchCriteria, build_filter};
use archivum_core::models::audit::AuditAction;
use archivum_core::models::correspondence::{
    CorrespondenceRecord, CorrespondenceStatus, CreateCorrespondence,
};
use archivum_core::models::identity::{Actor, Role};
use archivum_core::reference::{ParsedReference, ReferenceDomain, format_reference};
use archivum_core::repository::{
    CorrespondenceRepository, PaginatedResult, Pagination, SequenceRepository,
    ServiceScopeRepository,
};
use chrono::{Datelike, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditRecorder;
use crate::config::ServiceConfig;

const RESOURCE: &str = "correspondence";

pub struct CorrespondenceService<C, Q, S>
where
    C: CorrespondenceRepository,
    Q: SequenceRepository,
    S: ServiceScopeRepository,
{
    records: C,
    sequences: Q,
    services: S,
    audit: AuditRecorder,
    domain: ReferenceDomain,
    max_attempts: u32,
}

impl<C, Q, S> CorrespondenceService<C, Q, S>
where
    C: CorrespondenceRepository,
    Q: SequenceRepository,
    S: ServiceScopeRepository,
{
    /// Fails when the configured reference domain is not upper-case
    /// alphanumeric.
    pub fn new(
        records: C,
        sequences: Q,
        services: S,
        audit: AuditRecorder,
        config: &ServiceConfig,
    ) -> ArchiveResult<Self> {
        Ok(Self {
            records,
            sequences,
            services,
            audit,
            domain: ReferenceDomain::new(&config.correspondence_domain)?,
            max_attempts: config.max_reference_attempts.max(1),
        })
    }

    pub fn domain(&self) -> &ReferenceDomain {
        &self.domain
    }

    /// Draw the next reference, e.g. `COUR-2024-00011`.
    ///
    /// The counter is shared across years. The first draw continues from
    /// the number of records already stored.
    pub async fn next_reference(&self) -> ArchiveResult<String> {
        let seed = self.records.count().await?;
        let sequence = self
            .sequences
            .next_value(&self.domain.sequence_key(), seed)
            .await?;
        Ok(format_reference(&self.domain, Utc::now().year(), sequence))
    }

    /// Register a new pending record under a freshly drawn reference.
    ///
    /// A conflict (the reference already taken, or the store still losing
    /// write races) draws a new reference, up to the configured number of
    /// attempts; the last conflict is returned.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateCorrespondence,
    ) -> ArchiveResult<CorrespondenceRecord> {
        let input = input.normalized()?;
        let service = input.service_code()?;
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

        let mut attempt = 1;
        loop {
            let reference = match self.next_reference().await {
                Ok(reference) => reference,
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "Reference draw conflicted, drawing again");
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self
                .records
                .create(&reference, actor.id(), input.clone())
                .await
            {
                Ok(record) => {
                    info!(reference = %record.reference, service = %record.service, "Correspondence registered");
                    self.audit.record(
                        actor,
                        AuditAction::CorrespondenceCreate,
                        RESOURCE,
                        Some(record.id.to_string()),
                        json!({
                            "reference": record.reference,
                            "subject": record.subject,
                            "service": record.service.as_str(),
                        }),
                    );
                    return Ok(record);
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    warn!(reference = %reference, attempt, "Reference already taken, drawing another");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> ArchiveResult<CorrespondenceRecord> {
        let record = self.records.get_by_id(id).await?;
        self.read(actor, record)
    }

    /// Look a record up by its reference. A malformed reference is a
    /// validation error; one from another domain is never stored here.
    pub async fn get_by_reference(
        &self,
        actor: &Actor,
        reference: &str,
    ) -> ArchiveResult<CorrespondenceRecord> {
        let reference = reference.trim();
        let parsed: ParsedReference = reference.parse()?;
        if parsed.domain != self.domain {
            return Err(ArchiveError::not_found(
                RESOURCE,
                format!("reference={reference}"),
            ));
        }
        let record = self.records.get_by_reference(reference).await?;
        self.read(actor, record)
    }

    /// Mark a pending record processed by the actor.
    pub async fn process(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> ArchiveResult<CorrespondenceRecord> {
        self.transition(
            actor,
            id,
            CorrespondenceStatus::Processed,
            notes,
            AuditAction::CorrespondenceProcess,
        )
        .await
    }

    pub async fn archive(&self, actor: &Actor, id: Uuid) -> ArchiveResult<CorrespondenceRecord> {
        self.transition(
            actor,
            id,
            CorrespondenceStatus::Archived,
            None,
            AuditAction::CorrespondenceArchive,
        )
        .await
    }

    /// Records visible to the actor. Category and tag criteria do not
    /// apply to correspondence and are rejected.
    pub async fn list(
        &self,
        actor: &Actor,
        criteria: &SearchCriteria,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<CorrespondenceRecord>> {
        ensure_role(&actor.identity, Role::User)?;
        let filter = build_filter(&actor.identity, criteria);
        self.records.list(&filter, pagination).await
    }

    fn read(
        &self,
        actor: &Actor,
        record: CorrespondenceRecord,
    ) -> ArchiveResult<CorrespondenceRecord> {
        ensure_access(&actor.identity, &record, Operation::Read)?;
        self.audit.record(
            actor,
            AuditAction::CorrespondenceRead,
            RESOURCE,
            Some(record.id.to_string()),
            json!({ "reference": record.reference }),
        );
        Ok(record)
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        to: CorrespondenceStatus,
        notes: Option<String>,
        action: AuditAction,
    ) -> ArchiveResult<CorrespondenceRecord> {
        let record = self.records.get_by_id(id).await?;
        ensure_access(&actor.identity, &record, Operation::Update)?;

        let from = record.status;
        if !from.can_transition_to(to) {
            return Err(ArchiveError::validation(format!(
                "correspondence {} cannot move from {from} to {to}",
                record.reference
            )));
        }
        // The store re-checks the status in the same write.
        let updated = self
            .records
            .transition(id, to, actor.id(), notes)
            .await?;

        info!(reference = %updated.reference, %from, %to, "Correspondence status changed");
        self.audit.record(
            actor,
            action,
            RESOURCE,
            Some(id.to_string()),
            json!({
                "reference": updated.reference,
                "from": from.as_str(),
                "to": to.as_str(),
            }),
        );

        Ok(updated)
    }
}
