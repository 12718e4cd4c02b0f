//! Archivum Auth: bearer token verification and identity resolution.

pub mod config;
pub mod error;
pub mod token;
pub mod verifier;

pub use config::AuthConfig;
pub use error::AuthError;
pub use token::{AccessTokenClaims, TokenDecoder};
pub use verifier::TokenVerifier;
