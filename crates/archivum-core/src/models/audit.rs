//! Audit log domain model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action tags recorded by the archive services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    #[serde(rename = "document.create")]
    DocumentCreate,
    #[serde(rename = "document.read")]
    DocumentRead,
    #[serde(rename = "document.version.append")]
    DocumentVersionAppend,
    #[serde(rename = "document.update")]
    DocumentUpdate,
    #[serde(rename = "document.delete")]
    DocumentDelete,
    #[serde(rename = "correspondence.create")]
    CorrespondenceCreate,
    #[serde(rename = "correspondence.read")]
    CorrespondenceRead,
    #[serde(rename = "correspondence.process")]
    CorrespondenceProcess,
    #[serde(rename = "correspondence.archive")]
    CorrespondenceArchive,
    #[serde(rename = "service.create")]
    ServiceCreate,
    #[serde(rename = "service.update")]
    ServiceUpdate,
    #[serde(rename = "service.member.add")]
    ServiceMemberAdd,
    #[serde(rename = "service.member.remove")]
    ServiceMemberRemove,
    #[serde(rename = "audit.read")]
    AuditRead,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::DocumentCreate => "document.create",
            AuditAction::DocumentRead => "document.read",
            AuditAction::DocumentVersionAppend => "document.version.append",
            AuditAction::DocumentUpdate => "document.update",
            AuditAction::DocumentDelete => "document.delete",
            AuditAction::CorrespondenceCreate => "correspondence.create",
            AuditAction::CorrespondenceRead => "correspondence.read",
            AuditAction::CorrespondenceProcess => "correspondence.process",
            AuditAction::CorrespondenceArchive => "correspondence.archive",
            AuditAction::ServiceCreate => "service.create",
            AuditAction::ServiceUpdate => "service.update",
            AuditAction::ServiceMemberAdd => "service.member.add",
            AuditAction::ServiceMemberRemove => "service.member.remove",
            AuditAction::AuditRead => "audit.read",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    /// Request details with sensitive fields stripped.
    pub details: serde_json::Value,
    pub source_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub actor_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
    pub source_address: Option<String>,
}
