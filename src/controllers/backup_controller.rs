//! DatabaseBackup controller
//!
//! Watches DatabaseBackup resources and drives the reconciliation handler.
//! The watch/queue runtime delivers one item per invocation; the handler
//! requests re-delivery through `Action::requeue` when the state machine
//! advanced and another pass is due.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{error, info, instrument};

use crate::crd::DatabaseBackup;
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::backup::{BackupHandler, Outcome};

/// Delay before re-delivering an item whose state machine advanced
const REQUEUE_TRANSIT: Duration = Duration::from_secs(5);

/// Run the DatabaseBackup controller
pub async fn run(client: Client, handler: Arc<BackupHandler>) {
    let api: Api<DatabaseBackup> = Api::namespaced(client.clone(), handler.namespace());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("DatabaseBackup CRD not installed: {}", e);
        return;
    }

    info!("Starting DatabaseBackup controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, handler)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled DatabaseBackup"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS
                        .with_label_values(&["DatabaseBackup"])
                        .inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<DatabaseBackup>, ctx: Arc<BackupHandler>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["DatabaseBackup"])
        .start_timer();
    metrics::RECONCILIATIONS
        .with_label_values(&["DatabaseBackup"])
        .inc();

    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();

    match ctx.handle(&namespace, &name).await? {
        Outcome::Requeue => Ok(Action::requeue(REQUEUE_TRANSIT)),
        Outcome::Settled => Ok(Action::await_change()),
    }
}

/// Error policy for the controller
fn error_policy(obj: Arc<DatabaseBackup>, error: &Error, _ctx: Arc<BackupHandler>) -> Action {
    let name = obj.name_any();
    error!(
        name = %name,
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    // Backoff based on error type
    let requeue_duration = match error {
        Error::Kube(_) => Duration::from_secs(30),
        Error::Config(_) | Error::Validation(_) => Duration::from_secs(300),
        Error::Transition { .. } => Duration::from_secs(300),
        Error::Driver(_) | Error::Http(_) => Duration::from_secs(60),
        _ => Duration::from_secs(30),
    };

    Action::requeue(requeue_duration)
}
