//! Archivum Service: access-checked, audited operations over the
//! archive.
//!
//! Services are generic over the repository and blob-store traits in
//! `archivum-core`, so this crate has no dependency on a storage backend.
//! Every operation takes the acting [`Actor`](archivum_core::models::identity::Actor)
//! explicitly.

pub mod audit;
pub mod config;
pub mod correspondence;
pub mod document;
pub mod service_scope;

pub use audit::{AuditHandle, AuditQuery, AuditRecorder, AuditWorker, audit_channel};
pub use config::ServiceConfig;
pub use correspondence::CorrespondenceService;
pub use document::{DocumentDraft, DocumentService, FileUpload};
pub use service_scope::ServiceScopeService;
