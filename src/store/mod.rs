//! Resource store abstraction
//!
//! The handler and refresher talk to the Kubernetes API only through these
//! traits, which keeps the reconciliation engine testable against in-memory
//! stores. Not-found and conflict outcomes stay classifiable on the error
//! (`Error::is_not_found`, `Error::is_conflict`) rather than being folded
//! into a success type.

mod kube_store;

pub use kube_store::{KubeBackupStore, KubeDeploymentStore};

use async_trait::async_trait;

use crate::crd::{DatabaseBackup, DatabaseDeployment};
use crate::error::Result;

/// Store operations for DatabaseBackup resources
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Fetch one backup; a missing resource surfaces as a 404 error
    async fn get(&self, namespace: &str, name: &str) -> Result<DatabaseBackup>;

    /// List all backups in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseBackup>>;

    /// Create a new backup resource, honoring `metadata.generate_name`
    async fn create(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup>;

    /// Replace the resource (metadata/spec); conflicts surface as 409 errors
    async fn update(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup>;

    /// Replace only the status subresource; conflicts surface as 409 errors
    async fn update_status(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup>;
}

/// Store operations for DatabaseDeployment resources
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Fetch one deployment; a missing resource surfaces as a 404 error
    async fn get(&self, namespace: &str, name: &str) -> Result<DatabaseDeployment>;

    /// List all deployments in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseDeployment>>;
}
