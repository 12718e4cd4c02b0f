//! Archivum server: wires configuration, storage and the archive
//! services together and runs until interrupted.

mod config;

use anyhow::Context;
use archivum_auth::TokenVerifier;
use archivum_db::repository::{
    SurrealAuditLogRepository, SurrealCorrespondenceRepository, SurrealDocumentRepository,
    SurrealSequenceRepository, SurrealServiceScopeRepository, SurrealUserRepository,
};
use archivum_db::{DbManager, LocalBlobStore, run_migrations};
use archivum_service::{
    AuditQuery, CorrespondenceService, DocumentService, ServiceScopeService, audit_channel,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("archivum={},info", args.log_level))),
        )
        .json()
        .init();

    info!("Starting Archivum server...");

    let db = DbManager::connect(&args.db_config())
        .await
        .context("connecting to SurrealDB")?;
    run_migrations(db.client())
        .await
        .context("applying schema migrations")?;
    let client = db.client().clone();

    let blobs = LocalBlobStore::new(&args.storage_config()).await?;
    let service_config = args.service_config();

    let (recorder, worker) = audit_channel(
        SurrealAuditLogRepository::new(client.clone()),
        service_config.audit_queue_capacity,
    );
    let audit = worker.spawn();

    let verifier = TokenVerifier::new(
        &args.auth_config()?,
        SurrealUserRepository::new(client.clone()),
    )?;
    let documents = DocumentService::new(
        SurrealDocumentRepository::new(client.clone()),
        SurrealServiceScopeRepository::new(client.clone()),
        blobs,
        recorder.clone(),
        &service_config,
    );
    let correspondence = CorrespondenceService::new(
        SurrealCorrespondenceRepository::new(client.clone()),
        SurrealSequenceRepository::new(client.clone()),
        SurrealServiceScopeRepository::new(client.clone()),
        recorder.clone(),
        &service_config,
    )?;
    let scopes = ServiceScopeService::new(
        SurrealServiceScopeRepository::new(client.clone()),
        recorder.clone(),
    );
    let audit_query = AuditQuery::new(SurrealAuditLogRepository::new(client), recorder);

    info!(
        correspondence_domain = %correspondence.domain(),
        blob_dir = %args.storage.blob_dir.display(),
        "Archive ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");

    // Drop every recorder before draining so nothing is queued afterwards.
    drop((verifier, documents, correspondence, scopes, audit_query));
    audit.shutdown().await;

    info!("Archivum server stopped.");
    Ok(())
}
