//! Out-of-band backup discovery
//!
//! A fixed-interval scan that lists every deployment in scope, compares the
//! driver-reported physical backups against the tracked resources, and
//! materializes anything unmatched directly in Ready state. A tick that
//! fails is simply abandoned; the next tick restarts from scratch, so
//! convergence comes from repetition rather than checkpointing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::crd::{
    BackupState, DatabaseBackup, DatabaseBackupSpec, DatabaseBackupStatus, DatabaseDeployment,
    DeploymentRef,
};
use crate::driver::BackupMeta;
use crate::error::Result;
use crate::metrics;
use crate::reconcilers::backup::BackupHandler;
use crate::reconcilers::{state, status};

/// Interval between discovery scans
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Name prefix for resources materialized by discovery
const GENERATED_NAME_PREFIX: &str = "backup-";

impl BackupHandler {
    /// Run the discovery loop until the stop signal fires. The first scan
    /// happens one full interval after startup.
    pub async fn run_refresh_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + REFRESH_INTERVAL, REFRESH_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Stopping backup refresh loop");
                    return;
                }
                _ = ticker.tick() => {
                    debug!("Refreshing database objects");
                    metrics::REFRESHES.inc();
                    match self.refresh().await {
                        Ok(()) => debug!("Database objects refreshed"),
                        Err(err) => {
                            metrics::REFRESH_ERRORS.inc();
                            error!(error = %err, "Unable to refresh database objects");
                        }
                    }
                }
            }
        }
    }

    /// One full discovery pass over every deployment in scope
    pub async fn refresh(&self) -> Result<()> {
        let deployments = self.deployments.list(&self.namespace).await?;
        for deployment in &deployments {
            self.refresh_deployment(deployment).await?;
        }
        Ok(())
    }

    async fn refresh_deployment(&self, deployment: &DatabaseDeployment) -> Result<()> {
        let namespace = deployment
            .namespace()
            .unwrap_or_else(|| self.namespace.clone());
        let name = deployment.name_any();

        let lock = self.locks.get(&namespace, &name);
        let _guard = lock.lock().await;

        let client = self.clients.client(deployment, None).await?;
        let tracked = self.backups.list(&namespace).await?;
        let physical = client.list_backups().await?;

        for meta in &physical {
            self.refresh_deployment_backup(deployment, meta, &tracked)
                .await?;
        }
        Ok(())
    }

    /// Materialize one physical backup unless a tracked resource already
    /// claims its id, either through a download request or a descriptor.
    async fn refresh_deployment_backup(
        &self,
        deployment: &DatabaseDeployment,
        meta: &BackupMeta,
        tracked: &[DatabaseBackup],
    ) -> Result<()> {
        for backup in tracked {
            if let Some(download) = &backup.spec.download {
                if download.id == meta.id {
                    return Ok(());
                }
            }
            if let Some(details) = backup.status.as_ref().and_then(|s| s.backup.as_ref()) {
                if details.id == meta.id {
                    return Ok(());
                }
            }
        }

        let namespace = deployment
            .namespace()
            .unwrap_or_else(|| self.namespace.clone());
        let backup = DatabaseBackup {
            metadata: ObjectMeta {
                generate_name: Some(GENERATED_NAME_PREFIX.to_string()),
                namespace: Some(namespace.clone()),
                ..Default::default()
            },
            spec: DatabaseBackupSpec {
                deployment: DeploymentRef {
                    name: deployment.name_any(),
                },
                download: None,
                upload: None,
            },
            status: None,
        };

        let mut created = self.backups.create(&backup).await?;
        info!(
            namespace = %namespace,
            deployment = %deployment.name_any(),
            backup = %created.name_any(),
            id = %meta.id,
            "Imported out-of-band backup"
        );
        metrics::DISCOVERED_BACKUPS
            .with_label_values(&[&namespace, &deployment.name_any()])
            .inc();

        // The physical artifact already exists, so the resource goes
        // straight to Ready, skipping the whole creation path.
        created.status = Some(DatabaseBackupStatus {
            state: BackupState::Ready,
            time: Some(Utc::now()),
            message: None,
            backup: Some(state::details_from_meta(meta, true)),
            available: true,
        });
        status::update_backup_status(self.backups.as_ref(), &created).await?;

        Ok(())
    }
}
