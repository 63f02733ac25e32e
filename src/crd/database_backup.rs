//! DatabaseBackup Custom Resource Definition

use std::fmt;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DatabaseBackup resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "database.oso.sh",
    version = "v1alpha1",
    kind = "DatabaseBackup",
    plural = "databasebackups",
    singular = "databasebackup",
    shortname = "dbb",
    namespaced,
    status = "DatabaseBackupStatus",
    printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".status.state"}"#,
    printcolumn = r#"{"name": "Deployment", "type": "string", "jsonPath": ".spec.deployment.name"}"#,
    printcolumn = r#"{"name": "Backup ID", "type": "string", "jsonPath": ".status.backup.id"}"#,
    printcolumn = r#"{"name": "Available", "type": "boolean", "jsonPath": ".status.available"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseBackupSpec {
    /// Deployment this backup belongs to
    pub deployment: DeploymentRef,

    /// Download an existing backup from a remote repository instead of
    /// creating one against the cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<BackupDownload>,

    /// Upload the finished backup to a remote repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<BackupUpload>,
}

/// Reference to the owning DatabaseDeployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRef {
    /// Deployment name (same namespace as the backup)
    pub name: String,
}

/// Download request for a backup stored in a remote repository
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupDownload {
    /// External identifier of the backup inside the repository
    pub id: String,

    /// Repository URL to download from
    pub repository_url: String,

    /// Secret holding repository credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,
}

/// Upload target for a finished backup
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupUpload {
    /// Repository URL to upload to
    pub repository_url: String,

    /// Secret holding repository credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<String>,
}

/// DatabaseBackup status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseBackupStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: BackupState,

    /// Time of the last state change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Descriptor of the physical backup, once one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupDetails>,

    /// Whether the backup is available on the cluster
    #[serde(default)]
    pub available: bool,
}

/// Descriptor of a physical backup on the cluster.
///
/// The `id` is assigned exactly once and never rewritten afterwards.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupDetails {
    /// External backup identifier reported by the database
    pub id: String,

    /// Database server version the backup was taken with
    pub version: String,

    /// When the backup was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,

    /// Size on disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Set when the backup was discovered on the cluster or downloaded,
    /// rather than created by this operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported: Option<bool>,

    /// Set once the backup has been uploaded to the configured repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<bool>,
}

/// Lifecycle state of a DatabaseBackup.
///
/// Legal moves between states are defined by the transition graph in
/// `reconcilers::state`; self-transitions are always legal.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema,
)]
pub enum BackupState {
    /// Freshly created, nothing decided yet
    #[default]
    Pending,
    /// Accepted, waiting to be created or downloaded
    Scheduled,
    /// Backup is being created against the cluster
    Creating,
    /// Backup is being fetched from a remote repository
    Downloading,
    /// Backup is being uploaded to a remote repository
    Uploading,
    /// Backup exists and is usable
    Ready,
    /// Backup disappeared from the cluster
    Deleted,
    /// Terminal failure
    Failed,
}

impl fmt::Display for BackupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackupState::Pending => "Pending",
            BackupState::Scheduled => "Scheduled",
            BackupState::Creating => "Creating",
            BackupState::Downloading => "Downloading",
            BackupState::Uploading => "Uploading",
            BackupState::Ready => "Ready",
            BackupState::Deleted => "Deleted",
            BackupState::Failed => "Failed",
        };
        f.write_str(s)
    }
}
