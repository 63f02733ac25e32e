//! Backup lifecycle state machine
//!
//! One decision function per state, dispatched by exhaustive match, plus the
//! transition-legality graph consulted before any status write. Decision
//! functions return the candidate next status; they never persist anything
//! themselves.

use chrono::Utc;

use crate::crd::{BackupDetails, BackupState, DatabaseBackup, DatabaseBackupStatus};
use crate::driver::BackupMeta;
use crate::error::{Error, Result};
use crate::reconcilers::backup::BackupHandler;

/// Legal transition targets per state; self-transitions are always legal and
/// need no entry here.
pub fn allowed_targets(from: BackupState) -> &'static [BackupState] {
    use BackupState::*;
    match from {
        Pending => &[Scheduled, Failed],
        Scheduled => &[Creating, Downloading, Failed],
        Creating => &[Ready, Failed],
        Downloading => &[Ready, Failed],
        Uploading => &[Ready, Failed],
        Ready => &[Uploading, Deleted, Failed],
        Deleted => &[Failed],
        Failed => &[],
    }
}

/// Whether a move from `from` to `to` is legal
pub fn transition_allowed(from: BackupState, to: BackupState) -> bool {
    from == to || allowed_targets(from).contains(&to)
}

/// Check a proposed transition, returning `Error::Transition` for an illegal
/// jump. An illegal transition is a defect, not a transient condition.
pub fn check_transition(from: BackupState, to: BackupState) -> Result<()> {
    if transition_allowed(from, to) {
        Ok(())
    } else {
        Err(Error::Transition { from, to })
    }
}

/// Current lifecycle state of a backup; an absent status means Pending
pub fn current_state(backup: &DatabaseBackup) -> BackupState {
    backup
        .status
        .as_ref()
        .map(|s| s.state)
        .unwrap_or_default()
}

/// Compute the candidate next status for a backup.
///
/// A spec that fails validation maps straight to a Failed candidate and
/// never reaches state dispatch.
pub(crate) async fn process(
    handler: &BackupHandler,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackupStatus> {
    if let Err(err) = super::backup::validate(backup) {
        return Ok(failed_status(err.to_string(), backup));
    }

    match current_state(backup) {
        BackupState::Pending => handle_pending(handler, backup).await,
        BackupState::Scheduled => handle_scheduled(backup),
        BackupState::Creating => handle_creating(handler, backup).await,
        BackupState::Downloading => handle_downloading(handler, backup).await,
        BackupState::Uploading => handle_uploading(handler, backup).await,
        BackupState::Ready => handle_ready(handler, backup).await,
        BackupState::Deleted => Ok(current_status(backup)),
        BackupState::Failed => Ok(current_status(backup)),
    }
}

/// Pending: the deployment must resolve before the backup is scheduled
async fn handle_pending(
    handler: &BackupHandler,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackupStatus> {
    match handler.deployment(backup).await {
        Ok(_) => Ok(DatabaseBackupStatus {
            state: BackupState::Scheduled,
            ..Default::default()
        }),
        Err(err) if err.is_not_found() => Ok(failed_status(
            format!(
                "deployment {} not found",
                backup.spec.deployment.name
            ),
            backup,
        )),
        Err(err) => Err(err),
    }
}

/// Scheduled: a download request selects the download path, otherwise the
/// backup is created against the cluster
fn handle_scheduled(backup: &DatabaseBackup) -> Result<DatabaseBackupStatus> {
    let next = if backup.spec.download.is_some() {
        BackupState::Downloading
    } else {
        BackupState::Creating
    };
    Ok(DatabaseBackupStatus {
        state: next,
        ..Default::default()
    })
}

/// Creating: ask the cluster for a new backup; a driver failure is
/// definitive and maps to Failed
async fn handle_creating(
    handler: &BackupHandler,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackupStatus> {
    let client = match handler.deployment_client(backup).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return Ok(failed_status(
                format!("deployment {} not found", backup.spec.deployment.name),
                backup,
            ))
        }
        Err(err) => return Err(err),
    };

    match client.create_backup().await {
        Ok(meta) => Ok(ready_status(details_from_meta(&meta, false))),
        Err(err) => Ok(failed_status(
            format!("backup creation failed: {}", err),
            backup,
        )),
    }
}

/// Downloading: fetch the requested backup from its repository
async fn handle_downloading(
    handler: &BackupHandler,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackupStatus> {
    let Some(download) = &backup.spec.download else {
        return Ok(failed_status(
            "download request removed while downloading".to_string(),
            backup,
        ));
    };

    let client = match handler.deployment_client(backup).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return Ok(failed_status(
                format!("deployment {} not found", backup.spec.deployment.name),
                backup,
            ))
        }
        Err(err) => return Err(err),
    };

    match client.download_backup(download).await {
        Ok(meta) => Ok(ready_status(details_from_meta(&meta, true))),
        Err(err) => Ok(failed_status(
            format!("backup download failed: {}", err),
            backup,
        )),
    }
}

/// Uploading: push the tracked backup to the configured repository
async fn handle_uploading(
    handler: &BackupHandler,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackupStatus> {
    let Some(details) = backup_details(backup) else {
        return Ok(failed_status(
            "no backup descriptor to upload".to_string(),
            backup,
        ));
    };

    let Some(upload) = &backup.spec.upload else {
        // Upload request withdrawn mid-flight; the backup itself is intact.
        return Ok(ready_status(details));
    };

    let client = match handler.deployment_client(backup).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return Ok(failed_status(
                format!("deployment {} not found", backup.spec.deployment.name),
                backup,
            ))
        }
        Err(err) => return Err(err),
    };

    match client.upload_backup(&details.id, upload).await {
        Ok(()) => {
            let mut details = details;
            details.uploaded = Some(true);
            Ok(ready_status(details))
        }
        Err(err) => Ok(failed_status(
            format!("backup upload failed: {}", err),
            backup,
        )),
    }
}

/// Ready: confirm the backup still exists, then decide whether an upload is
/// outstanding
async fn handle_ready(
    handler: &BackupHandler,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackupStatus> {
    let Some(details) = backup_details(backup) else {
        return Ok(failed_status(
            "ready backup without a descriptor".to_string(),
            backup,
        ));
    };

    let client = match handler.deployment_client(backup).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return Ok(failed_status(
                format!("deployment {} not found", backup.spec.deployment.name),
                backup,
            ))
        }
        Err(err) => return Err(err),
    };

    if client.get_backup(&details.id).await?.is_none() {
        return Ok(DatabaseBackupStatus {
            state: BackupState::Deleted,
            message: Some("backup no longer present on the cluster".to_string()),
            backup: Some(details),
            available: false,
            ..Default::default()
        });
    }

    if backup.spec.upload.is_some() && !details.uploaded.unwrap_or(false) {
        return Ok(DatabaseBackupStatus {
            state: BackupState::Uploading,
            backup: Some(details),
            available: true,
            ..Default::default()
        });
    }

    Ok(current_status(backup))
}

/// Build the descriptor for a freshly created or downloaded backup.
/// The id is assigned here exactly once.
pub(crate) fn details_from_meta(meta: &BackupMeta, imported: bool) -> BackupDetails {
    BackupDetails {
        id: meta.id.clone(),
        version: meta.version.clone(),
        creation_time: meta.created_at.or_else(|| Some(Utc::now())),
        size_bytes: meta.size_bytes,
        imported: imported.then_some(true),
        uploaded: None,
    }
}

/// Ready status carrying the given descriptor
fn ready_status(details: BackupDetails) -> DatabaseBackupStatus {
    DatabaseBackupStatus {
        state: BackupState::Ready,
        backup: Some(details),
        available: true,
        ..Default::default()
    }
}

/// Failed status carrying the error message; an existing descriptor is kept
pub(crate) fn failed_status(message: String, backup: &DatabaseBackup) -> DatabaseBackupStatus {
    DatabaseBackupStatus {
        state: BackupState::Failed,
        message: Some(message),
        backup: backup_details(backup),
        available: false,
        ..Default::default()
    }
}

fn backup_details(backup: &DatabaseBackup) -> Option<BackupDetails> {
    backup.status.as_ref().and_then(|s| s.backup.clone())
}

fn current_status(backup: &DatabaseBackup) -> DatabaseBackupStatus {
    backup.status.clone().unwrap_or_default()
}
