//! Shared test doubles for the reconciliation engine
//!
//! In-memory stores with injectable conflicts, a recording event sink, and
//! an instrumented mock database that tracks driver-call concurrency.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use kube::ResourceExt;
use parking_lot::Mutex;

use database_backup_operator::crd::{
    BackupDetails, BackupState, DatabaseBackup, DatabaseBackupSpec, DatabaseBackupStatus,
    DatabaseDeployment, DatabaseDeploymentSpec, DeploymentRef,
};
use database_backup_operator::driver::{
    BackupMeta, Credentials, DatabaseClient, DatabaseClientFactory,
};
use database_backup_operator::error::{Error, Result};
use database_backup_operator::events::EventRecorder;
use database_backup_operator::reconcilers::backup::{BackupHandler, FINALIZER_NAME};
use database_backup_operator::store::{BackupStore, DeploymentStore};

/// Synthesize a Kubernetes 404 error
pub fn not_found_error(what: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} not found", what),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

/// Synthesize a Kubernetes 409 write conflict
pub fn conflict_error() -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "the object has been modified".to_string(),
        reason: "Conflict".to_string(),
        code: 409,
    }))
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

/// In-memory DatabaseBackup store with injectable status-write conflicts
#[derive(Default)]
pub struct MockBackupStore {
    objects: Mutex<HashMap<(String, String), DatabaseBackup>>,
    generated: AtomicU32,
    status_conflicts: AtomicU32,
    pub creates: AtomicU32,
    pub updates: AtomicU32,
    pub status_updates: AtomicU32,
}

impl MockBackupStore {
    pub fn insert(&self, backup: DatabaseBackup) {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let name = backup.name_any();
        self.objects.lock().insert(key(&namespace, &name), backup);
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<DatabaseBackup> {
        self.objects.lock().get(&key(namespace, name)).cloned()
    }

    pub fn all(&self) -> Vec<DatabaseBackup> {
        self.objects.lock().values().cloned().collect()
    }

    /// Make the next `n` status writes fail with a conflict
    pub fn inject_status_conflicts(&self, n: u32) {
        self.status_conflicts.store(n, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn status_update_count(&self) -> u32 {
        self.status_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackupStore for MockBackupStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<DatabaseBackup> {
        self.objects
            .lock()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found_error(name))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseBackup>> {
        Ok(self
            .objects
            .lock()
            .values()
            .filter(|b| b.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn create(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut created = backup.clone();
        if created.metadata.name.is_none() {
            let n = self.generated.fetch_add(1, Ordering::SeqCst);
            let prefix = created.metadata.generate_name.clone().unwrap_or_default();
            created.metadata.name = Some(format!("{}{:05}", prefix, n));
        }
        created.metadata.uid = Some(format!("uid-{}", created.name_any()));
        self.insert(created.clone());
        Ok(created)
    }

    async fn update(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.insert(backup.clone());
        Ok(backup.clone())
    }

    async fn update_status(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let remaining = self.status_conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.status_conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(conflict_error());
        }
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let name = backup.name_any();
        let mut objects = self.objects.lock();
        match objects.get_mut(&key(&namespace, &name)) {
            Some(existing) => {
                existing.status = backup.status.clone();
                Ok(existing.clone())
            }
            None => Err(not_found_error(&name)),
        }
    }
}

/// In-memory DatabaseDeployment store
#[derive(Default)]
pub struct MockDeploymentStore {
    objects: Mutex<HashMap<(String, String), DatabaseDeployment>>,
}

impl MockDeploymentStore {
    pub fn insert(&self, deployment: DatabaseDeployment) {
        let namespace = deployment
            .namespace()
            .unwrap_or_else(|| "default".to_string());
        let name = deployment.name_any();
        self.objects
            .lock()
            .insert(key(&namespace, &name), deployment);
    }
}

#[async_trait]
impl DeploymentStore for MockDeploymentStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<DatabaseDeployment> {
        self.objects
            .lock()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found_error(name))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseDeployment>> {
        Ok(self
            .objects
            .lock()
            .values()
            .filter(|d| d.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }
}

/// One recorded Kubernetes event
#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: String,
}

/// Event sink that records instead of publishing
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventRecorder for RecordingEvents {
    async fn normal(&self, _backup: &DatabaseBackup, reason: &str, note: String) {
        self.events.lock().push(RecordedEvent {
            warning: false,
            reason: reason.to_string(),
            note,
        });
    }

    async fn warning(&self, _backup: &DatabaseBackup, reason: &str, note: String) {
        self.events.lock().push(RecordedEvent {
            warning: true,
            reason: reason.to_string(),
            note,
        });
    }
}

/// Instrumented in-memory database shared by all mock clients.
///
/// Tracks how many driver calls are in flight at once so tests can assert
/// on deployment-lock exclusivity.
#[derive(Default)]
pub struct MockDatabase {
    backups: Mutex<HashMap<String, Vec<BackupMeta>>>,
    list_error: Mutex<Option<String>>,
    create_error: Mutex<Option<String>>,
    upload_error: Mutex<Option<String>>,
    next_id: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    hold: Mutex<Duration>,
    pub deletes: Mutex<Vec<String>>,
}

impl MockDatabase {
    /// Register a physical backup on a deployment's cluster
    pub fn add_physical(&self, deployment: &str, meta: BackupMeta) {
        self.backups
            .lock()
            .entry(deployment.to_string())
            .or_default()
            .push(meta);
    }

    pub fn physical(&self, deployment: &str) -> Vec<BackupMeta> {
        self.backups
            .lock()
            .get(deployment)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_list(&self, message: &str) {
        *self.list_error.lock() = Some(message.to_string());
    }

    pub fn fail_create(&self, message: &str) {
        *self.create_error.lock() = Some(message.to_string());
    }

    pub fn fail_upload(&self, message: &str) {
        *self.upload_error.lock() = Some(message.to_string());
    }

    /// Artificial latency inside `create_backup`, for concurrency tests
    pub fn set_hold(&self, hold: Duration) {
        *self.hold.lock() = hold;
    }

    /// Highest number of driver calls observed in flight at once
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let hold = *self.hold.lock();
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Driver client bound to one deployment of a [`MockDatabase`]
pub struct MockDatabaseClient {
    db: Arc<MockDatabase>,
    deployment: String,
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn list_backups(&self) -> Result<Vec<BackupMeta>> {
        if let Some(message) = self.db.list_error.lock().clone() {
            return Err(Error::driver(message));
        }
        Ok(self.db.physical(&self.deployment))
    }

    async fn create_backup(&self) -> Result<BackupMeta> {
        self.db.enter().await;
        let result = if let Some(message) = self.db.create_error.lock().clone() {
            Err(Error::driver(message))
        } else {
            let id = format!("bk-{:05}", self.db.next_id.fetch_add(1, Ordering::SeqCst));
            let meta = backup_meta(&id);
            self.db.add_physical(&self.deployment, meta.clone());
            Ok(meta)
        };
        self.db.exit();
        result
    }

    async fn get_backup(&self, id: &str) -> Result<Option<BackupMeta>> {
        Ok(self
            .db
            .physical(&self.deployment)
            .into_iter()
            .find(|m| m.id == id))
    }

    async fn delete_backup(&self, id: &str) -> Result<()> {
        self.db.deletes.lock().push(id.to_string());
        if let Some(metas) = self.db.backups.lock().get_mut(&self.deployment) {
            metas.retain(|m| m.id != id);
        }
        Ok(())
    }

    async fn download_backup(
        &self,
        request: &database_backup_operator::crd::BackupDownload,
    ) -> Result<BackupMeta> {
        let meta = backup_meta(&request.id);
        self.db.add_physical(&self.deployment, meta.clone());
        Ok(meta)
    }

    async fn upload_backup(
        &self,
        _id: &str,
        _target: &database_backup_operator::crd::BackupUpload,
    ) -> Result<()> {
        if let Some(message) = self.db.upload_error.lock().clone() {
            return Err(Error::driver(message));
        }
        Ok(())
    }
}

/// Factory handing out [`MockDatabaseClient`]s
pub struct MockClientFactory {
    pub db: Arc<MockDatabase>,
}

#[async_trait]
impl DatabaseClientFactory for MockClientFactory {
    async fn client(
        &self,
        deployment: &DatabaseDeployment,
        _credentials: Option<Credentials>,
    ) -> Result<Box<dyn DatabaseClient>> {
        Ok(Box::new(MockDatabaseClient {
            db: self.db.clone(),
            deployment: deployment.name_any(),
        }))
    }
}

/// Everything a handler test needs, wired to in-memory doubles
pub struct Fixture {
    pub backups: Arc<MockBackupStore>,
    pub deployments: Arc<MockDeploymentStore>,
    pub events: Arc<RecordingEvents>,
    pub db: Arc<MockDatabase>,
    pub handler: Arc<BackupHandler>,
}

impl Fixture {
    pub fn new() -> Self {
        let backups = Arc::new(MockBackupStore::default());
        let deployments = Arc::new(MockDeploymentStore::default());
        let events = Arc::new(RecordingEvents::default());
        let db = Arc::new(MockDatabase::default());
        let handler = Arc::new(BackupHandler::with_dependencies(
            backups.clone(),
            deployments.clone(),
            events.clone(),
            Arc::new(MockClientFactory { db: db.clone() }),
            "default",
        ));
        Self {
            backups,
            deployments,
            events,
            db,
            handler,
        }
    }

    /// Fixture with one deployment already registered
    pub fn with_deployment(name: &str) -> Self {
        let fixture = Self::new();
        fixture.deployments.insert(deployment("default", name));
        fixture
    }
}

/// Build a DatabaseDeployment test resource
pub fn deployment(namespace: &str, name: &str) -> DatabaseDeployment {
    DatabaseDeployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: DatabaseDeploymentSpec {
            endpoint: format!("https://{}:8529", name),
        },
        status: None,
    }
}

/// Build a DatabaseBackup test resource carrying the reserved finalizer
pub fn backup(namespace: &str, name: &str, deployment: &str) -> DatabaseBackup {
    let mut b = backup_without_finalizer(namespace, name, deployment);
    b.metadata.finalizers = Some(vec![FINALIZER_NAME.to_string()]);
    b
}

/// Build a DatabaseBackup test resource with no finalizer
pub fn backup_without_finalizer(namespace: &str, name: &str, deployment: &str) -> DatabaseBackup {
    DatabaseBackup {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: DatabaseBackupSpec {
            deployment: DeploymentRef {
                name: deployment.to_string(),
            },
            download: None,
            upload: None,
        },
        status: None,
    }
}

/// Ready status tracking the given backup id
pub fn ready_status(id: &str) -> DatabaseBackupStatus {
    DatabaseBackupStatus {
        state: BackupState::Ready,
        time: Some(Utc::now()),
        message: None,
        backup: Some(BackupDetails {
            id: id.to_string(),
            version: "3.12.1".to_string(),
            creation_time: Some(Utc::now()),
            size_bytes: Some(1024),
            imported: None,
            uploaded: None,
        }),
        available: true,
    }
}

/// Status with just a state set
pub fn status_in(state: BackupState) -> DatabaseBackupStatus {
    DatabaseBackupStatus {
        state,
        time: Some(Utc::now()),
        ..Default::default()
    }
}

/// Physical backup descriptor as the driver would report it
pub fn backup_meta(id: &str) -> BackupMeta {
    BackupMeta {
        id: id.to_string(),
        version: "3.12.1".to_string(),
        created_at: Some(Utc::now()),
        size_bytes: Some(1024),
    }
}
