//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Listing operations over
//! service-scoped entities take a [`Filter`] produced by
//! [`build_filter`](crate::filter::build_filter), so scoping is decided
//! before storage is consulted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ArchiveResult;
use crate::filter::Filter;
use crate::models::{
    audit::{AuditLogEntry, CreateAuditLogEntry},
    correspondence::{CorrespondenceRecord, CorrespondenceStatus, CreateCorrespondence},
    document::{CreateDocument, Document, UpdateDocument},
    identity::ServiceCode,
    service_scope::{CreateServiceScope, ServiceScope, UpdateServiceScope},
    user::{CreateUser, UpdateUser, User},
};
use crate::storage::StoredFile;

/// Default page size when a caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Upper bound on page size.
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Page-based pagination parameters. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Clamp `page` to at least 1 and `limit` to `1..=MAX_PAGE_LIMIT`.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    /// `ceil(total / limit)`.
    pub pages: u64,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        let pages = if pagination.limit == 0 {
            0
        } else {
            total.div_ceil(pagination.limit)
        };
        Self {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
            pages,
        }
    }
}

// ---------------------------------------------------------------------------
// Identities & services
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = ArchiveResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ArchiveResult<User>> + Send;
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = ArchiveResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = ArchiveResult<User>> + Send;
    /// Soft-delete: clears `is_active`.
    fn deactivate(&self, id: Uuid) -> impl Future<Output = ArchiveResult<()>> + Send;
    fn list_by_service(
        &self,
        service: &ServiceCode,
        pagination: Pagination,
    ) -> impl Future<Output = ArchiveResult<PaginatedResult<User>>> + Send;
}

pub trait ServiceScopeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateServiceScope,
    ) -> impl Future<Output = ArchiveResult<ServiceScope>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ArchiveResult<ServiceScope>> + Send;
    fn get_by_code(
        &self,
        code: &ServiceCode,
    ) -> impl Future<Output = ArchiveResult<ServiceScope>> + Send;
    /// Whether a service with this code exists.
    fn exists(&self, code: &ServiceCode) -> impl Future<Output = ArchiveResult<bool>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateServiceScope,
    ) -> impl Future<Output = ArchiveResult<ServiceScope>> + Send;
    fn add_member(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = ArchiveResult<ServiceScope>> + Send;
    fn remove_member(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = ArchiveResult<ServiceScope>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = ArchiveResult<PaginatedResult<ServiceScope>>> + Send;
}

// ---------------------------------------------------------------------------
// Documents (service-scoped, versioned)
// ---------------------------------------------------------------------------

pub trait DocumentRepository: Send + Sync {
    /// Persist a new document holding version #1.
    fn create(&self, input: CreateDocument) -> impl Future<Output = ArchiveResult<Document>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ArchiveResult<Document>> + Send;
    /// Atomically append version `len + 1` and move the current pointer.
    ///
    /// Fails with `NotFound` when the document no longer exists.
    fn append_version(
        &self,
        id: Uuid,
        file: StoredFile,
        uploaded_by: Uuid,
    ) -> impl Future<Output = ArchiveResult<Document>> + Send;
    /// Update mutable fields. `metadata`, when present, replaces the
    /// stored object; the version history is never written.
    fn update(
        &self,
        id: Uuid,
        input: UpdateDocument,
    ) -> impl Future<Output = ArchiveResult<Document>> + Send;
    /// Remove the record and return it as it was at deletion.
    fn delete(&self, id: Uuid) -> impl Future<Output = ArchiveResult<Document>> + Send;
    fn list(
        &self,
        filter: &Filter,
        pagination: Pagination,
    ) -> impl Future<Output = ArchiveResult<PaginatedResult<Document>>> + Send;
}

// ---------------------------------------------------------------------------
// Correspondence
// ---------------------------------------------------------------------------

pub trait CorrespondenceRepository: Send + Sync {
    /// Persist a new pending record under `reference`.
    ///
    /// Fails with `Conflict` when the reference is already taken.
    fn create(
        &self,
        reference: &str,
        created_by: Uuid,
        input: CreateCorrespondence,
    ) -> impl Future<Output = ArchiveResult<CorrespondenceRecord>> + Send;
    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = ArchiveResult<CorrespondenceRecord>> + Send;
    fn get_by_reference(
        &self,
        reference: &str,
    ) -> impl Future<Output = ArchiveResult<CorrespondenceRecord>> + Send;
    /// Move a record to `to` if its current status allows it.
    ///
    /// Moving to `Processed` records `actor_id` as `processed_by`.
    /// Fails with `Validation` on a disallowed transition.
    fn transition(
        &self,
        id: Uuid,
        to: CorrespondenceStatus,
        actor_id: Uuid,
        notes: Option<String>,
    ) -> impl Future<Output = ArchiveResult<CorrespondenceRecord>> + Send;
    /// Number of records ever stored, across all years.
    fn count(&self) -> impl Future<Output = ArchiveResult<u64>> + Send;
    fn list(
        &self,
        filter: &Filter,
        pagination: Pagination,
    ) -> impl Future<Output = ArchiveResult<PaginatedResult<CorrespondenceRecord>>> + Send;
}

/// Named, atomically incremented counters.
pub trait SequenceRepository: Send + Sync {
    /// Increment the counter and return the new value.
    ///
    /// A counter that does not exist yet starts from `seed`, so the first
    /// call returns `seed + 1`.
    fn next_value(&self, key: &str, seed: u64) -> impl Future<Output = ArchiveResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = ArchiveResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = ArchiveResult<PaginatedResult<AuditLogEntry>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        let p = Pagination::new(1, 10);
        assert_eq!(PaginatedResult::<()>::new(vec![], p, 0).pages, 0);
        assert_eq!(PaginatedResult::<()>::new(vec![], p, 10).pages, 1);
        assert_eq!(PaginatedResult::<()>::new(vec![], p, 11).pages, 2);
    }

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination::new(0, 0);
        assert_eq!((p.page, p.limit), (1, 1));
        assert_eq!(Pagination::new(3, 1_000).limit, MAX_PAGE_LIMIT);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }
}
