//! Organizational services (e.g. "Comptabilité", "RH") and their members.

use archivum_core::access::{Operation, ensure_access, ensure_role};
use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::models::audit::AuditAction;
use archivum_core::models::identity::{Actor, Role, ServiceCode};
use archivum_core::models::service_scope::{
    CreateServiceScope, ServiceScope, UpdateServiceScope,
};
use archivum_core::repository::{PaginatedResult, Pagination, ServiceScopeRepository};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditRecorder;

const RESOURCE: &str = "service";

pub struct ServiceScopeService<S: ServiceScopeRepository> {
    scopes: S,
    audit: AuditRecorder,
}

impl<S: ServiceScopeRepository> ServiceScopeService<S> {
    pub fn new(scopes: S, audit: AuditRecorder) -> Self {
        Self { scopes, audit }
    }

    /// Only super-admins create services.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateServiceScope,
    ) -> ArchiveResult<ServiceScope> {
        ensure_role(&actor.identity, Role::SuperAdmin)?;
        if input.name.trim().is_empty() {
            return Err(ArchiveError::validation("name is required"));
        }

        let scope = self.scopes.create(input).await?;

        info!(service = %scope.code, "Service created");
        self.record(
            actor,
            AuditAction::ServiceCreate,
            &scope,
            json!({ "name": scope.name, "code": scope.code.as_str() }),
        );

        Ok(scope)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> ArchiveResult<ServiceScope> {
        let scope = self.scopes.get_by_id(id).await?;
        ensure_access(&actor.identity, &scope, Operation::Read)?;
        Ok(scope)
    }

    pub async fn get_by_code(&self, actor: &Actor, code: &ServiceCode) -> ArchiveResult<ServiceScope> {
        let scope = self.scopes.get_by_code(code).await?;
        ensure_access(&actor.identity, &scope, Operation::Read)?;
        Ok(scope)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        input: UpdateServiceScope,
    ) -> ArchiveResult<ServiceScope> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ArchiveError::validation("name must not be blank"));
        }
        let scope = self.scopes.get_by_id(id).await?;
        ensure_access(&actor.identity, &scope, Operation::Update)?;

        let details = json!({
            "name": input.name,
            "responsible": input.responsible.map(|r| r.map(|id| id.to_string())),
        });
        let updated = self.scopes.update(id, input).await?;

        self.record(actor, AuditAction::ServiceUpdate, &updated, details);
        Ok(updated)
    }

    pub async fn add_member(
        &self,
        actor: &Actor,
        id: Uuid,
        user_id: Uuid,
    ) -> ArchiveResult<ServiceScope> {
        let scope = self.scopes.get_by_id(id).await?;
        ensure_access(&actor.identity, &scope, Operation::Update)?;

        let updated = self.scopes.add_member(id, user_id).await?;

        info!(service = %updated.code, user_id = %user_id, "Member added");
        self.record(
            actor,
            AuditAction::ServiceMemberAdd,
            &updated,
            json!({ "user_id": user_id.to_string() }),
        );
        Ok(updated)
    }

    pub async fn remove_member(
        &self,
        actor: &Actor,
        id: Uuid,
        user_id: Uuid,
    ) -> ArchiveResult<ServiceScope> {
        let scope = self.scopes.get_by_id(id).await?;
        ensure_access(&actor.identity, &scope, Operation::Update)?;

        let updated = self.scopes.remove_member(id, user_id).await?;

        info!(service = %updated.code, user_id = %user_id, "Member removed");
        self.record(
            actor,
            AuditAction::ServiceMemberRemove,
            &updated,
            json!({ "user_id": user_id.to_string() }),
        );
        Ok(updated)
    }

    /// All services, by code. Any active identity may list them.
    pub async fn list(
        &self,
        actor: &Actor,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<ServiceScope>> {
        ensure_role(&actor.identity, Role::User)?;
        self.scopes.list(pagination).await
    }

    fn record(&self, actor: &Actor, action: AuditAction, scope: &ServiceScope, details: Value) {
        self.audit.record(
            actor,
            action,
            RESOURCE,
            Some(scope.id.to_string()),
            details,
        );
    }
}
