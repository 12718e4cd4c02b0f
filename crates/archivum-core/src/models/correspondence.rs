//! Correspondence (letters) domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::identity::ServiceCode;
use crate::error::{ArchiveError, ArchiveResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrespondenceStatus {
    Pending,
    Processed,
    Archived,
}

impl CorrespondenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrespondenceStatus::Pending => "pending",
            CorrespondenceStatus::Processed => "processed",
            CorrespondenceStatus::Archived => "archived",
        }
    }

    /// States a record may move to `self` from.
    pub fn allowed_sources(self) -> &'static [CorrespondenceStatus] {
        match self {
            CorrespondenceStatus::Pending => &[],
            CorrespondenceStatus::Processed => &[CorrespondenceStatus::Pending],
            CorrespondenceStatus::Archived => &[
                CorrespondenceStatus::Pending,
                CorrespondenceStatus::Processed,
            ],
        }
    }

    pub fn can_transition_to(self, next: CorrespondenceStatus) -> bool {
        next.allowed_sources().contains(&self)
    }
}

impl fmt::Display for CorrespondenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrespondenceStatus {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CorrespondenceStatus::Pending),
            "processed" => Ok(CorrespondenceStatus::Processed),
            "archived" => Ok(CorrespondenceStatus::Archived),
            other => Err(ArchiveError::validation(format!(
                "unknown correspondence status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrespondenceRecord {
    pub id: Uuid,
    /// Unique business reference, assigned once at creation.
    pub reference: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub service: ServiceCode,
    pub linked_document_id: Option<Uuid>,
    pub status: CorrespondenceStatus,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub metadata: Map<String, Value>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCorrespondence {
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub service: String,
    pub linked_document_id: Option<Uuid>,
    pub notes: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl CreateCorrespondence {
    pub fn normalized(mut self) -> ArchiveResult<Self> {
        for (field, value) in [
            ("subject", &mut self.subject),
            ("sender", &mut self.sender),
            ("recipient", &mut self.recipient),
            ("service", &mut self.service),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(ArchiveError::validation(format!("{field} is required")));
            }
            *value = trimmed.to_string();
        }
        self.notes = self.notes.map(|n| n.trim().to_string());
        Ok(self)
    }

    pub fn service_code(&self) -> ArchiveResult<ServiceCode> {
        ServiceCode::new(self.service.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use CorrespondenceStatus::*;
        assert!(Pending.can_transition_to(Processed));
        assert!(Pending.can_transition_to(Archived));
        assert!(Processed.can_transition_to(Archived));
        assert!(!Processed.can_transition_to(Processed));
        assert!(!Processed.can_transition_to(Pending));
        assert!(!Archived.can_transition_to(Processed));
        assert!(!Archived.can_transition_to(Archived));
    }

    #[test]
    fn create_requires_parties_and_subject() {
        let input = CreateCorrespondence {
            subject: "  Convocation ".into(),
            sender: "Rectorat".into(),
            recipient: " ".into(),
            service: "RH".into(),
            linked_document_id: None,
            notes: None,
            metadata: None,
        };
        assert!(input.clone().normalized().is_err());

        let ok = CreateCorrespondence {
            recipient: "Doyen".into(),
            ..input
        }
        .normalized()
        .unwrap();
        assert_eq!(ok.subject, "Convocation");
    }
}
