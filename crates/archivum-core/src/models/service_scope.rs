//! Service scope domain model.
//!
//! A service is the organizational unit (e.g. a university department)
//! that partitions visibility of documents, correspondence and most other
//! resources.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::ServiceCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceScope {
    pub id: Uuid,
    /// Human-readable name (e.g., `Comptabilité`).
    pub name: String,
    /// Unique code referenced by every service-scoped entity.
    pub code: ServiceCode,
    pub members: BTreeSet<Uuid>,
    /// User accountable for the service, if designated.
    pub responsible: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceScope {
    pub name: String,
    pub code: ServiceCode,
    pub responsible: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateServiceScope {
    pub name: Option<String>,
    /// `Some(Some(id))` = set, `Some(None)` = clear, `None` = no change.
    pub responsible: Option<Option<Uuid>>,
}
