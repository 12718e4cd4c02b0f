//! Access control evaluator.
//!
//! [`can_access`] is a pure function of the identity, the resource and
//! the requested operation. It reads no global state and has no side
//! effects, so identical inputs always yield the same decision.
//!
//! Rules, first match wins:
//! 1. inactive identities are denied;
//! 2. super-admins are allowed;
//! 3. service-scoped resources require a matching service, except that
//!    admins may update/delete across services; a matching read or
//!    create is allowed;
//! 4. updates/deletes on owned resources are allowed to the owner and
//!    to admins, on owner-less resources to admins only;
//! 5. everything else is denied.

use uuid::Uuid;

use crate::error::{ArchiveError, ArchiveResult};
use crate::models::correspondence::CorrespondenceRecord;
use crate::models::document::Document;
use crate::models::identity::{Identity, Role, ServiceCode};
use crate::models::service_scope::ServiceScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Update and delete are privileged writes.
    pub fn is_privileged_write(self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Attributes of a resource the evaluator looks at.
pub trait Protected {
    /// Owning service, if the resource is service-scoped.
    fn service(&self) -> Option<&ServiceCode>;
    /// Owning user (e.g. the uploader), if any.
    fn owner_id(&self) -> Option<Uuid>;
}

/// Borrowed resource attributes, for checks made before an entity
/// exists (e.g. creation into a service).
#[derive(Debug, Clone, Copy)]
pub struct ResourceRef<'a> {
    pub service: Option<&'a ServiceCode>,
    pub owner_id: Option<Uuid>,
}

impl<'a> ResourceRef<'a> {
    pub fn in_service(service: &'a ServiceCode) -> Self {
        Self {
            service: Some(service),
            owner_id: None,
        }
    }
}

impl Protected for ResourceRef<'_> {
    fn service(&self) -> Option<&ServiceCode> {
        self.service
    }

    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

impl Protected for Document {
    fn service(&self) -> Option<&ServiceCode> {
        Some(&self.service)
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.uploader_id)
    }
}

impl Protected for CorrespondenceRecord {
    fn service(&self) -> Option<&ServiceCode> {
        Some(&self.service)
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.created_by)
    }
}

impl Protected for ServiceScope {
    fn service(&self) -> Option<&ServiceCode> {
        Some(&self.code)
    }

    fn owner_id(&self) -> Option<Uuid> {
        self.responsible
    }
}

pub fn can_access(identity: &Identity, resource: &impl Protected, operation: Operation) -> bool {
    if !identity.is_active {
        return false;
    }
    if identity.role == Role::SuperAdmin {
        return true;
    }

    let privileged = operation.is_privileged_write();

    if let Some(service) = resource.service() {
        let same_service = *service == identity.service;
        let admin_write = privileged && identity.role == Role::Admin;
        if !same_service && !admin_write {
            return false;
        }
        if !privileged {
            return true;
        }
    }

    if privileged {
        return match resource.owner_id() {
            Some(owner) => owner == identity.id || identity.role.at_least(Role::Admin),
            None => identity.role.at_least(Role::Admin),
        };
    }

    false
}

/// [`can_access`] as a `Result`, for use with `?` in services.
pub fn ensure_access(
    identity: &Identity,
    resource: &impl Protected,
    operation: Operation,
) -> ArchiveResult<()> {
    if can_access(identity, resource, operation) {
        Ok(())
    } else if !identity.is_active {
        Err(ArchiveError::forbidden("identity is deactivated"))
    } else {
        Err(ArchiveError::forbidden(format!(
            "{} not permitted for role {}",
            operation.as_str(),
            identity.role
        )))
    }
}

/// Require at least `role` for operations not tied to one resource.
pub fn ensure_role(identity: &Identity, role: Role) -> ArchiveResult<()> {
    if !identity.is_active {
        return Err(ArchiveError::forbidden("identity is deactivated"));
    }
    if !identity.role.at_least(role) {
        return Err(ArchiveError::forbidden(format!("requires role {role}")));
    }
    Ok(())
}
