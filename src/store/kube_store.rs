//! Kubernetes-backed store implementations

use async_trait::async_trait;
use kube::{
    api::{ListParams, PostParams},
    Api, Client, ResourceExt,
};

use crate::crd::{DatabaseBackup, DatabaseDeployment};
use crate::error::Result;
use crate::store::{BackupStore, DeploymentStore};

/// DatabaseBackup store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeBackupStore {
    client: Client,
}

impl KubeBackupStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<DatabaseBackup> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl BackupStore for KubeBackupStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<DatabaseBackup> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseBackup>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        Ok(self
            .api(&namespace)
            .create(&PostParams::default(), backup)
            .await?)
    }

    async fn update(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        Ok(self
            .api(&namespace)
            .replace(&backup.name_any(), &PostParams::default(), backup)
            .await?)
    }

    async fn update_status(&self, backup: &DatabaseBackup) -> Result<DatabaseBackup> {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let data = serde_json::to_vec(backup)?;
        Ok(self
            .api(&namespace)
            .replace_status(&backup.name_any(), &PostParams::default(), data)
            .await?)
    }
}

/// DatabaseDeployment store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeDeploymentStore {
    client: Client,
}

impl KubeDeploymentStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<DatabaseDeployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl DeploymentStore for KubeDeploymentStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<DatabaseDeployment> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseDeployment>> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }
}
