//! Authentication configuration.

/// Configuration for bearer token verification.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 public key tokens are verified against.
    pub jwt_public_key_pem: String,
    /// Expected `iss` claim.
    pub jwt_issuer: String,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_public_key_pem: String::new(),
            jwt_issuer: "archivum".into(),
            leeway_secs: 30,
        }
    }
}
