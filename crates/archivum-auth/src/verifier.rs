//! Resolution of bearer tokens to [`Identity`] values.
//!
//! The token only names the subject. Role, service and the active flag
//! always come from the user store, so a demotion or deactivation takes
//! effect on the next request rather than at token expiry.

use archivum_core::error::{ArchiveError, ArchiveResult};
use archivum_core::models::identity::{Actor, Identity};
use archivum_core::repository::UserRepository;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::TokenDecoder;

pub struct TokenVerifier<U: UserRepository> {
    decoder: TokenDecoder,
    users: U,
}

impl<U: UserRepository> TokenVerifier<U> {
    pub fn new(config: &AuthConfig, users: U) -> Result<Self, AuthError> {
        Ok(Self {
            decoder: TokenDecoder::new(config)?,
            users,
        })
    }

    /// Verify an `Authorization` header value (`Bearer <jwt>`) or a bare
    /// token.
    pub async fn verify(&self, authorization: &str) -> ArchiveResult<Identity> {
        let token = bearer_token(authorization).ok_or(AuthError::MissingToken)?;
        let claims = self.decoder.decode(token)?;
        let user_id = claims.subject()?;

        let user = match self.users.get_by_id(user_id).await {
            Ok(user) => user,
            Err(ArchiveError::NotFound { .. }) => {
                debug!(%user_id, "Token subject not found");
                return Err(AuthError::UnknownSubject.into());
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            debug!(%user_id, "Token subject is inactive");
            return Err(AuthError::AccountInactive.into());
        }

        Ok(user.identity())
    }

    /// [`verify`](Self::verify), then attach the caller's address.
    pub async fn actor(
        &self,
        authorization: &str,
        source_address: Option<String>,
    ) -> ArchiveResult<Actor> {
        let identity = self.verify(authorization).await?;
        let actor = Actor::new(identity);
        Ok(match source_address {
            Some(address) => actor.with_source_address(address),
            None => actor,
        })
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None => value,
    };
    (!token.is_empty()).then_some(token)
}
