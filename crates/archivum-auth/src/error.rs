//! Authentication error types.

use archivum_core::error::ArchiveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("unknown subject")]
    UnknownSubject,

    #[error("account is inactive")]
    AccountInactive,

    #[error("bad verification key: {0}")]
    Key(String),
}

impl From<AuthError> for ArchiveError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired => ArchiveError::TokenExpired,
            AuthError::Key(msg) => ArchiveError::Internal(msg),
            other => ArchiveError::Unauthenticated {
                reason: other.to_string(),
            },
        }
    }
}
