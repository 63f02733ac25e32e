//! Per-deployment lock registry
//!
//! Every read-modify-write sequence touching one deployment's backups runs
//! under that deployment's exclusive lock, shared between the event handler
//! and the periodic refresher. Locks are created on demand and live for the
//! process lifetime; deployment cardinality per operator instance is small
//! enough that entries are never reclaimed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Key identifying one deployment: (namespace, name)
type DeploymentKey = (String, String);

/// Registry of per-deployment async locks.
///
/// The registry guard is held only for the map lookup, never across a
/// caller's critical section.
#[derive(Clone, Default)]
pub struct DeploymentLocks {
    inner: Arc<Mutex<HashMap<DeploymentKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl DeploymentLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the unique lock for a deployment, creating it if absent
    pub fn get(&self, namespace: &str, deployment: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock();
        locks
            .entry((namespace.to_string(), deployment.to_string()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
