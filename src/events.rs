//! Kubernetes Event recording
//!
//! Events are fire-and-forget: publish failures are logged as warnings and
//! never propagate. A failed event must not break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

use crate::crd::DatabaseBackup;

/// Event reason recorded when a backup changes lifecycle state
pub const STATE_CHANGE: &str = "StateChange";

/// Event reason recorded when the finalizer is removed
pub const FINALIZER_CHANGE: &str = "FinalizerChange";

/// Action attached to every event emitted by the reconciler
const ACTION_RECONCILE: &str = "Reconcile";

/// Trait for publishing Kubernetes Events against a backup resource
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Publish a normal-class event
    async fn normal(&self, backup: &DatabaseBackup, reason: &str, note: String);

    /// Publish a warning-class event
    async fn warning(&self, backup: &DatabaseBackup, reason: &str, note: String);
}

/// Production implementation wrapping `kube::runtime::events::Recorder`
pub struct KubeEventRecorder {
    client: Client,
    reporter: Reporter,
}

impl KubeEventRecorder {
    /// Create a recorder; `controller_name` becomes the reportingComponent
    /// on emitted Events
    pub fn new(client: Client, controller_name: &str) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: controller_name.to_string(),
                instance: None,
            },
        }
    }

    async fn publish(&self, backup: &DatabaseBackup, type_: EventType, reason: &str, note: String) {
        let recorder = Recorder::new(
            self.client.clone(),
            self.reporter.clone(),
            object_reference(backup),
        );
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: ACTION_RECONCILE.to_string(),
            secondary: None,
        };
        if let Err(e) = recorder.publish(event).await {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn normal(&self, backup: &DatabaseBackup, reason: &str, note: String) {
        self.publish(backup, EventType::Normal, reason, note).await;
    }

    async fn warning(&self, backup: &DatabaseBackup, reason: &str, note: String) {
        self.publish(backup, EventType::Warning, reason, note).await;
    }
}

fn object_reference(backup: &DatabaseBackup) -> ObjectReference {
    ObjectReference {
        api_version: Some(DatabaseBackup::api_version(&()).to_string()),
        kind: Some(DatabaseBackup::kind(&()).to_string()),
        name: backup.meta().name.clone(),
        namespace: backup.meta().namespace.clone(),
        uid: backup.meta().uid.clone(),
        resource_version: backup.meta().resource_version.clone(),
        ..Default::default()
    }
}
