//! DatabaseBackup reconciliation
//!
//! `BackupHandler` drives one backup resource per invocation: finalizer
//! attachment and finalize-path cleanup, per-deployment locking, owner
//! reference attachment, state dispatch, and conflict-safe status
//! persistence. The periodic refresher (see `refresh`) shares the same
//! handler so both paths serialize on the same deployment locks.

use std::sync::Arc;

use chrono::Utc;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, info, warn};

use crate::crd::{BackupState, DatabaseBackup, DatabaseBackupStatus, DatabaseDeployment};
use crate::driver::{DatabaseClient, DatabaseClientFactory};
use crate::error::{Error, Result};
use crate::events::{self, EventRecorder, KubeEventRecorder};
use crate::locks::DeploymentLocks;
use crate::metrics;
use crate::reconcilers::{state, status};
use crate::store::{BackupStore, DeploymentStore, KubeBackupStore, KubeDeploymentStore};

/// Finalizer token gating physical deletion of DatabaseBackup resources
pub const FINALIZER_NAME: &str = "database.oso.sh/backup-finalizer";

/// Controller name reported on emitted Events
pub const CONTROLLER_NAME: &str = "database-backup-operator";

/// Outcome of one reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the resource changes again
    Settled,
    /// The state machine advanced; another pass is needed
    Requeue,
}

/// Per-item reconciliation driver for DatabaseBackup resources
pub struct BackupHandler {
    pub(crate) backups: Arc<dyn BackupStore>,
    pub(crate) deployments: Arc<dyn DeploymentStore>,
    pub(crate) events: Arc<dyn EventRecorder>,
    pub(crate) clients: Arc<dyn DatabaseClientFactory>,
    pub(crate) locks: DeploymentLocks,
    pub(crate) namespace: String,
}

impl BackupHandler {
    /// Build a handler wired to the Kubernetes API
    pub fn new(
        client: Client,
        clients: Arc<dyn DatabaseClientFactory>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            backups: Arc::new(KubeBackupStore::new(client.clone())),
            deployments: Arc::new(KubeDeploymentStore::new(client.clone())),
            events: Arc::new(KubeEventRecorder::new(client, CONTROLLER_NAME)),
            clients,
            locks: DeploymentLocks::new(),
            namespace: namespace.into(),
        }
    }

    /// Build a handler from explicit dependencies
    pub fn with_dependencies(
        backups: Arc<dyn BackupStore>,
        deployments: Arc<dyn DeploymentStore>,
        events: Arc<dyn EventRecorder>,
        clients: Arc<dyn DatabaseClientFactory>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            backups,
            deployments,
            events,
            clients,
            locks: DeploymentLocks::new(),
            namespace: namespace.into(),
        }
    }

    /// Namespace this operator instance watches
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Reconcile one backup resource.
    ///
    /// A missing resource is success: it was deleted before we got to it.
    pub async fn handle(&self, namespace: &str, name: &str) -> Result<Outcome> {
        let mut backup = match self.backups.get(namespace, name).await {
            Ok(backup) => backup,
            Err(err) if err.is_not_found() => return Ok(Outcome::Settled),
            Err(err) => return Err(err),
        };

        if backup.meta().deletion_timestamp.is_some() {
            debug!(namespace = %namespace, name = %name, "Finalizing backup");
            self.finalize(&backup).await?;
            return Ok(Outcome::Settled);
        }

        // Finalizer attachment is always its own write, never combined with
        // state processing.
        if !has_finalizer(&backup) {
            info!(namespace = %namespace, name = %name, "Attaching backup finalizer");
            let mut updated = backup.clone();
            updated
                .metadata
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(FINALIZER_NAME.to_string());
            self.backups.update(&updated).await?;
            return Ok(Outcome::Settled);
        }

        // One handler or refresher at a time per deployment.
        let lock = self.locks.get(namespace, &backup.spec.deployment.name);
        let _guard = lock.lock().await;

        // Ownership metadata is non-critical; failures only get logged.
        if backup.owner_references().is_empty() {
            match self.attach_owner(&backup).await {
                Ok(updated) => backup = updated,
                Err(err) => warn!(
                    namespace = %namespace,
                    name = %name,
                    error = %err,
                    "Unable to attach owner reference"
                ),
            }
        }

        let current = backup.status.clone().unwrap_or_default();
        let mut candidate = state::process(self, &backup).await?;

        // The prior timestamp survives unless the state actually changes.
        candidate.time = current.time;

        if statuses_equal(&current, &candidate) {
            return Ok(Outcome::Settled);
        }

        let mut outcome = Outcome::Settled;
        if current.state != candidate.state {
            outcome = Outcome::Requeue;
            state::check_transition(current.state, candidate.state)?;

            candidate.time = Some(Utc::now());
            metrics::STATE_TRANSITIONS
                .with_label_values(&[&current.state.to_string(), &candidate.state.to_string()])
                .inc();

            if candidate.state == BackupState::Failed {
                let note = format!(
                    "Transiting from {} to {} with error: {}",
                    current.state,
                    candidate.state,
                    candidate.message.as_deref().unwrap_or("unknown error")
                );
                self.events
                    .warning(&backup, events::STATE_CHANGE, note)
                    .await;
            } else {
                self.events
                    .normal(
                        &backup,
                        events::STATE_CHANGE,
                        format!("Transiting from {} to {}", current.state, candidate.state),
                    )
                    .await;
            }
        }

        debug!(namespace = %namespace, name = %name, state = %candidate.state, "Updating backup status");
        let mut updated = backup.clone();
        updated.status = Some(candidate);
        status::update_backup_status(self.backups.as_ref(), &updated).await?;

        Ok(outcome)
    }

    /// Finalize path: remove the physical backup where one is tracked, then
    /// strip the finalizer so the store can delete the resource.
    async fn finalize(&self, backup: &DatabaseBackup) -> Result<()> {
        if !has_finalizer(backup) {
            return Ok(());
        }

        if let Some(details) = backup.status.as_ref().and_then(|s| s.backup.as_ref()) {
            match self.deployment_client(backup).await {
                Ok(client) => client.delete_backup(&details.id).await?,
                Err(err) if err.is_not_found() => {
                    debug!(
                        deployment = %backup.spec.deployment.name,
                        "Deployment gone, skipping backup cleanup"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        metrics::CLEANUPS
            .with_label_values(&["DatabaseBackup"])
            .inc();

        let mut updated = backup.clone();
        if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != FINALIZER_NAME);
        }
        self.backups.update(&updated).await?;

        info!(
            namespace = updated.namespace().as_deref().unwrap_or("default"),
            name = %updated.name_any(),
            "Removed backup finalizer"
        );
        self.events
            .normal(
                backup,
                events::FINALIZER_CHANGE,
                "Removed backup finalizer".to_string(),
            )
            .await;
        Ok(())
    }

    async fn attach_owner(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        let deployment = self.deployment(backup).await?;
        let owner = deployment
            .controller_owner_ref(&())
            .ok_or_else(|| Error::config("deployment has no object metadata yet"))?;

        let mut updated = backup.clone();
        updated.metadata.owner_references = Some(vec![owner]);
        self.backups.update(&updated).await
    }

    /// Resolve the deployment a backup belongs to
    pub(crate) async fn deployment(&self, backup: &DatabaseBackup) -> Result<DatabaseDeployment> {
        let namespace = backup
            .namespace()
            .unwrap_or_else(|| self.namespace.clone());
        self.deployments
            .get(&namespace, &backup.spec.deployment.name)
            .await
    }

    /// Resolve the deployment and build a driver client for it
    pub(crate) async fn deployment_client(
        &self,
        backup: &DatabaseBackup,
    ) -> Result<Box<dyn DatabaseClient>> {
        let deployment = self.deployment(backup).await?;
        self.clients.client(&deployment, None).await
    }
}

/// Validate a DatabaseBackup spec
pub fn validate(backup: &DatabaseBackup) -> Result<()> {
    if backup.spec.deployment.name.is_empty() {
        return Err(Error::validation("deployment name must be specified"));
    }

    if let Some(download) = &backup.spec.download {
        if download.id.is_empty() {
            return Err(Error::validation("download backup id must be specified"));
        }
        if download.repository_url.is_empty() {
            return Err(Error::validation(
                "download repository URL must be specified",
            ));
        }
    }

    if let Some(upload) = &backup.spec.upload {
        if upload.repository_url.is_empty() {
            return Err(Error::validation("upload repository URL must be specified"));
        }
    }

    Ok(())
}

/// Whether the reserved finalizer token is present
pub fn has_finalizer(backup: &DatabaseBackup) -> bool {
    backup.finalizers().iter().any(|f| f == FINALIZER_NAME)
}

/// Status equality over the enumerated field set (state, message,
/// descriptor, availability). The timestamp is deliberately excluded so
/// bookkeeping alone never forces a write.
fn statuses_equal(a: &DatabaseBackupStatus, b: &DatabaseBackupStatus) -> bool {
    a.state == b.state && a.message == b.message && a.backup == b.backup && a.available == b.available
}
