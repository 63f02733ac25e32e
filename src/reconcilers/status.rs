//! Conflict-safe status persistence
//!
//! Status writes go through an optimistic-concurrency loop: re-fetch the
//! latest revision, replace only the status, write it back. A conflicting
//! writer just costs one more attempt; the bound keeps a persistently
//! conflicting or slow target from stalling the calling task forever.

use std::time::Duration;

use kube::ResourceExt;

use crate::crd::DatabaseBackup;
use crate::error::Result;
use crate::metrics;
use crate::retry::retry;
use crate::store::BackupStore;

/// Attempt budget for one status update
pub const STATUS_UPDATE_ATTEMPTS: u32 = 25;

/// Spacing between attempts
pub const STATUS_UPDATE_DELAY: Duration = Duration::from_secs(1);

/// Persist `backup.status` onto the latest revision of the resource,
/// retrying on any error up to the attempt budget. Exhausting the budget
/// surfaces the final error unchanged.
pub async fn update_backup_status(
    backups: &dyn BackupStore,
    backup: &DatabaseBackup,
) -> Result<DatabaseBackup> {
    let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
    let name = backup.name_any();

    retry(STATUS_UPDATE_ATTEMPTS, STATUS_UPDATE_DELAY, || async {
        let mut latest = backups.get(&namespace, &name).await?;
        latest.status = backup.status.clone();
        backups.update_status(&latest).await.inspect_err(|err| {
            if err.is_conflict() {
                metrics::STATUS_UPDATE_CONFLICTS.inc();
            }
        })
    })
    .await
}
