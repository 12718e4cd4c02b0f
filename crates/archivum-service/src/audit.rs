//! Asynchronous audit recording.
//!
//! [`AuditRecorder::record`] never blocks and never fails: entries go on a
//! bounded queue drained by an [`AuditWorker`] task. A full or closed
//! queue drops the entry with a warning, and persistence failures are
//! logged by the worker. Secret fields are stripped by the repository on
//! append, so callers may pass request details as they are.
//!
//! Shutdown closes the queue and persists whatever was already queued
//! before the worker exits.

use archivum_core::access::ensure_role;
use archivum_core::error::ArchiveResult;
use archivum_core::models::audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry};
use archivum_core::models::identity::{Actor, Role};
use archivum_core::repository::{
    AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination,
};
use serde_json::{Value, json};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cheap, cloneable handle services use to record audit entries.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<CreateAuditLogEntry>,
}

impl AuditRecorder {
    /// Enqueue an entry. Call only after the audited operation committed.
    pub fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        resource_type: &str,
        resource_id: Option<String>,
        details: Value,
    ) {
        let entry = CreateAuditLogEntry {
            actor_id: actor.id(),
            action: action.into(),
            resource_type: resource_type.to_string(),
            resource_id,
            details,
            source_address: actor.source_address.clone(),
        };

        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(action = %entry.action, actor_id = %entry.actor_id, "Audit queue full, entry dropped");
            }
            Err(TrySendError::Closed(entry)) => {
                warn!(action = %entry.action, actor_id = %entry.actor_id, "Audit queue closed, entry dropped");
            }
        }
    }
}

/// Create a recorder and the worker that drains its queue.
///
/// A `capacity` of zero is raised to one.
pub fn audit_channel<A: AuditLogRepository + 'static>(
    repo: A,
    capacity: usize,
) -> (AuditRecorder, AuditWorker<A>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AuditRecorder { tx }, AuditWorker { repo, rx })
}

/// Background consumer of the audit queue.
pub struct AuditWorker<A: AuditLogRepository> {
    repo: A,
    rx: mpsc::Receiver<CreateAuditLogEntry>,
}

impl<A: AuditLogRepository + 'static> AuditWorker<A> {
    /// Start draining the queue on the current runtime.
    pub fn spawn(self) -> AuditHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        AuditHandle {
            shutdown_tx,
            task,
        }
    }

    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!("Audit worker started");

        loop {
            tokio::select! {
                entry = self.rx.recv() => match entry {
                    Some(entry) => self.persist(entry).await,
                    // Every recorder is gone.
                    None => break,
                },
                // Also fires when the handle is dropped without shutdown.
                _ = &mut shutdown_rx => break,
            }
        }

        self.rx.close();
        let mut drained = 0usize;
        while let Some(entry) = self.rx.recv().await {
            self.persist(entry).await;
            drained += 1;
        }

        info!(drained, "Audit worker stopped");
    }

    async fn persist(&self, entry: CreateAuditLogEntry) {
        let action = entry.action.clone();
        match self.repo.append(entry).await {
            Ok(saved) => debug!(audit_id = %saved.id, action = %saved.action, "Audit entry stored"),
            Err(e) => warn!(action = %action, error = %e, "Failed to store audit entry"),
        }
    }
}

/// Owner handle of a running [`AuditWorker`].
pub struct AuditHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl AuditHandle {
    /// Close the queue, persist what is already queued, and wait for the
    /// worker to finish.
    pub async fn shutdown(self) {
        // The worker may already have stopped on its own.
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Audit worker terminated abnormally");
        }
    }
}

/// Read access to the audit trail for administrators.
pub struct AuditQuery<A: AuditLogRepository> {
    repo: A,
    audit: AuditRecorder,
}

impl<A: AuditLogRepository> AuditQuery<A> {
    pub fn new(repo: A, audit: AuditRecorder) -> Self {
        Self { repo, audit }
    }

    /// List entries matching `filter`, newest first. Requires an active
    /// admin or super-admin; the lookup itself is audited.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> ArchiveResult<PaginatedResult<AuditLogEntry>> {
        ensure_role(&actor.identity, Role::Admin)?;

        let details = json!({
            "actor_id": filter.actor_id.map(|id| id.to_string()),
            "action": filter.action,
            "resource_type": filter.resource_type,
            "resource_id": filter.resource_id,
            "page": pagination.page,
        });

        let page = self.repo.list(filter, pagination).await?;

        self.audit
            .record(actor, AuditAction::AuditRead, "audit_log", None, details);

        Ok(page)
    }
}
