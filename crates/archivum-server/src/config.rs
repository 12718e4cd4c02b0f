//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named
//! next to it; a `.env` file is loaded first when present.

use std::path::PathBuf;

use anyhow::Context;
use archivum_auth::AuthConfig;
use archivum_db::{DbConfig, StorageConfig};
use archivum_service::ServiceConfig;
use clap::{Args as ClapArgs, Parser};

/// Archivum - document and correspondence archive
#[derive(Parser, Debug, Clone)]
#[command(name = "archivum")]
#[command(about = "Versioned, service-scoped document archive")]
pub struct Args {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(flatten)]
    pub service: ServiceArgs,

    /// Log level for archivum crates (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DbArgs {
    /// SurrealDB WebSocket address
    #[arg(long = "db-url", env = "ARCHIVUM_DB_URL", default_value = "127.0.0.1:8000")]
    pub url: String,

    #[arg(long = "db-namespace", env = "ARCHIVUM_DB_NAMESPACE", default_value = "archivum")]
    pub namespace: String,

    #[arg(long = "db-database", env = "ARCHIVUM_DB_DATABASE", default_value = "archive")]
    pub database: String,

    #[arg(long = "db-username", env = "ARCHIVUM_DB_USERNAME", default_value = "root")]
    pub username: String,

    #[arg(
        long = "db-password",
        env = "ARCHIVUM_DB_PASSWORD",
        default_value = "root",
        hide_env_values = true
    )]
    pub password: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AuthArgs {
    /// Path to the PEM-encoded Ed25519 public key access tokens are
    /// verified against
    #[arg(long, env = "ARCHIVUM_JWT_PUBLIC_KEY_FILE")]
    pub jwt_public_key_file: PathBuf,

    /// Expected token issuer
    #[arg(long, env = "ARCHIVUM_JWT_ISSUER", default_value = "archivum")]
    pub jwt_issuer: String,

    /// Tolerated clock skew in seconds
    #[arg(long, env = "ARCHIVUM_JWT_LEEWAY_SECS", default_value = "30")]
    pub jwt_leeway_secs: u64,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StorageArgs {
    /// Directory uploaded payloads are written under
    #[arg(long, env = "ARCHIVUM_BLOB_DIR", default_value = "./data/blobs")]
    pub blob_dir: PathBuf,

    /// URL prefix payload links are built from
    #[arg(long, env = "ARCHIVUM_BLOB_BASE_URL", default_value = "/files")]
    pub blob_base_url: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServiceArgs {
    /// Audit entries buffered before new ones are dropped
    #[arg(long, env = "ARCHIVUM_AUDIT_QUEUE", default_value = "1024")]
    pub audit_queue_capacity: usize,

    /// Reference draws per correspondence before a conflict is reported
    #[arg(long, env = "ARCHIVUM_REFERENCE_ATTEMPTS", default_value = "3")]
    pub max_reference_attempts: u32,

    /// Prefix of correspondence references
    #[arg(long, env = "ARCHIVUM_CORRESPONDENCE_DOMAIN", default_value = "COUR")]
    pub correspondence_domain: String,

    /// Blob folder for document payloads
    #[arg(long, env = "ARCHIVUM_DOCUMENT_FOLDER", default_value = "documents")]
    pub document_folder: String,
}

impl Args {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db.url.clone(),
            namespace: self.db.namespace.clone(),
            database: self.db.database.clone(),
            username: self.db.username.clone(),
            password: self.db.password.clone(),
        }
    }

    /// Reads the public key file.
    pub fn auth_config(&self) -> anyhow::Result<AuthConfig> {
        let path = &self.auth.jwt_public_key_file;
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("reading JWT public key {}", path.display()))?;
        Ok(AuthConfig {
            jwt_public_key_pem: pem,
            jwt_issuer: self.auth.jwt_issuer.clone(),
            leeway_secs: self.auth.jwt_leeway_secs,
        })
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            root_dir: self.storage.blob_dir.clone(),
            public_base_url: self.storage.blob_base_url.clone(),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            audit_queue_capacity: self.service.audit_queue_capacity,
            max_reference_attempts: self.service.max_reference_attempts,
            correspondence_domain: self.service.correspondence_domain.clone(),
            document_folder: self.service.document_folder.clone(),
        }
    }
}
