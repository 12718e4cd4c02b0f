//! Error types for the Archivum system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    #[error("Authentication failed: {reason}")]
    Unauthenticated { reason: String },

    #[error("Token has expired")]
    TokenExpired,

    #[error("Conflict on {entity}: {message}")]
    Conflict { entity: String, message: String },

    /// A storage collaborator failed. The side effect it was attached to
    /// may or may not have been committed.
    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArchiveError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Whether the error stems from a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
