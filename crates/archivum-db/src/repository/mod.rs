//! SurrealDB repository implementations.

mod audit_log;
mod correspondence;
mod document;
mod sequence;
mod service_scope;
mod user;

pub use audit_log::SurrealAuditLogRepository;
pub use correspondence::SurrealCorrespondenceRepository;
pub use document::SurrealDocumentRepository;
pub use sequence::SurrealSequenceRepository;
pub use service_scope::SurrealServiceScopeRepository;
pub use user::SurrealUserRepository;

use std::time::Duration;

use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

/// Runs per write statement before a conflict is handed to the caller.
/// Every aborted run means another writer committed, so contention
/// between fewer writers than this always settles.
pub(crate) const WRITE_ATTEMPTS: u32 = 32;

/// Run `op` again while it fails with a retryable write conflict, up to
/// [`WRITE_ATTEMPTS`] runs in total.
pub(crate) async fn retry_write<T, F, Fut>(entity: &str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < WRITE_ATTEMPTS => {
                debug!(entity, attempt, "Write conflict, running statement again");
                tokio::time::sleep(backoff(attempt)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(u64::from(attempt.min(10)))
}

/// Row struct for `SELECT count() AS total ... GROUP ALL`.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

impl CountRow {
    /// `GROUP ALL` over an empty table yields no row at all.
    pub fn total(rows: &[CountRow]) -> u64 {
        rows.first().map(|r| r.total).unwrap_or(0)
    }
}

pub(crate) fn parse_uuid(entity: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value)
        .map_err(|e| DbError::decode(entity, format!("invalid UUID {value:?}: {e}")))
}

pub(crate) fn parse_optional_uuid(
    entity: &str,
    value: Option<&str>,
) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(entity, v)).transpose()
}

/// Stored metadata is always an object; anything else reads as empty.
pub(crate) fn into_object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
