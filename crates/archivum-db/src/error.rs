//! Database-specific error types and conversions.

use archivum_core::error::ArchiveError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}: {message}")]
    UniqueViolation { entity: String, message: String },

    /// Another transaction committed a conflicting write first. The
    /// statement had no effect and can be run again.
    #[error("Write conflict on {entity}: {message}")]
    WriteConflict { entity: String, message: String },

    /// A stored row could not be mapped back to its domain type.
    #[error("Malformed {entity} row: {message}")]
    Decode { entity: String, message: String },

    #[error("Blob storage error: {0}")]
    Blob(String),
}

impl DbError {
    /// Classify an error raised while sending or executing a statement
    /// against `entity`. Unique index rejections become
    /// [`DbError::UniqueViolation`], aborted transactions
    /// [`DbError::WriteConflict`].
    pub fn query(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if is_unique_violation(&message) {
            DbError::UniqueViolation {
                entity: entity.into(),
                message,
            }
        } else if is_write_conflict(&message) {
            DbError::WriteConflict {
                entity: entity.into(),
                message,
            }
        } else {
            DbError::Surreal(err)
        }
    }

    /// Whether running the same statement again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::WriteConflict { .. })
    }

    pub(crate) fn decode(entity: &str, message: impl Into<String>) -> Self {
        DbError::Decode {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// SurrealDB reports unique index rejections as
/// "Database index `idx` already contains ...".
fn is_unique_violation(message: &str) -> bool {
    message.contains("already contains")
}

/// SurrealDB aborts a transaction that lost a write race with
/// "Transaction conflict: Write conflict, retry the transaction".
fn is_write_conflict(message: &str) -> bool {
    message.contains("Transaction conflict")
        || message.contains("Write conflict")
        || message.contains("can be retried")
}

impl From<DbError> for ArchiveError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ArchiveError::NotFound { entity, id },
            DbError::UniqueViolation { entity, message }
            | DbError::WriteConflict { entity, message } => {
                ArchiveError::Conflict { entity, message }
            }
            DbError::Decode { .. } => ArchiveError::Internal(err.to_string()),
            other => ArchiveError::Dependency(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = DbError::UniqueViolation {
            entity: "correspondence".into(),
            message: "index already contains 'COUR-2024-00001'".into(),
        };
        assert!(ArchiveError::from(err).is_conflict());
    }

    #[test]
    fn write_conflict_is_retryable_and_maps_to_conflict() {
        let err = DbError::WriteConflict {
            entity: "sequence".into(),
            message: "Transaction conflict: Write conflict, retry the transaction".into(),
        };
        assert!(err.is_retryable());
        assert!(ArchiveError::from(err).is_conflict());

        let err = DbError::UniqueViolation {
            entity: "correspondence".into(),
            message: "already contains".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_found_keeps_identity() {
        let err: ArchiveError = DbError::NotFound {
            entity: "document".into(),
            id: "abc".into(),
        }
        .into();
        assert!(matches!(err, ArchiveError::NotFound { ref entity, ref id }
            if entity == "document" && id == "abc"));
    }

    #[test]
    fn detects_index_message() {
        assert!(is_unique_violation(
            "Database index `idx_correspondence_reference` already contains 'COUR-2024-00001'"
        ));
        assert!(!is_unique_violation("Found NONE for field `title`"));
    }

    #[test]
    fn detects_transaction_conflict_message() {
        assert!(is_write_conflict(
            "Transaction conflict: Write conflict, retry the transaction. \
             This transaction can be retried"
        ));
        assert!(!is_write_conflict(
            "Database index `idx_correspondence_reference` already contains 'COUR-2024-00001'"
        ));
    }
}
