//! Database driver abstraction
//!
//! The operator never performs backup data transfer itself; it asks the
//! database's admin API to create, fetch, upload or delete backups and only
//! tracks the outcome. Driver errors are opaque and propagate unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crd::{BackupDownload, BackupUpload, DatabaseDeployment};
use crate::error::Result;

/// Physical backup descriptor reported by the database
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    /// External backup identifier
    pub id: String,

    /// Database server version the backup was taken with
    pub version: String,

    /// Creation time reported by the database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Size on disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Credentials for the database admin API
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Client for one deployment's database admin API
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// List all physical backups present on the cluster
    async fn list_backups(&self) -> Result<Vec<BackupMeta>>;

    /// Create a new backup against the cluster
    async fn create_backup(&self) -> Result<BackupMeta>;

    /// Look up one backup; `None` when the cluster no longer has it
    async fn get_backup(&self, id: &str) -> Result<Option<BackupMeta>>;

    /// Delete a backup from the cluster; deleting an absent backup succeeds
    async fn delete_backup(&self, id: &str) -> Result<()>;

    /// Fetch a backup from a remote repository onto the cluster
    async fn download_backup(&self, request: &BackupDownload) -> Result<BackupMeta>;

    /// Push an existing backup to a remote repository
    async fn upload_backup(&self, id: &str, target: &BackupUpload) -> Result<()>;
}

/// Factory producing a client for a deployment's endpoint
#[async_trait]
pub trait DatabaseClientFactory: Send + Sync {
    /// Build a client for the deployment, optionally authenticated
    async fn client(
        &self,
        deployment: &DatabaseDeployment,
        credentials: Option<Credentials>,
    ) -> Result<Box<dyn DatabaseClient>>;
}
