//! HTTP adapter for the database admin API
//!
//! Talks to the backup endpoints exposed by a deployment's admin interface.
//! All requests share one fixed client timeout; there is no per-call budget
//! beyond it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::json;

use crate::crd::{BackupDownload, BackupUpload, DatabaseDeployment};
use crate::driver::{BackupMeta, Credentials, DatabaseClient, DatabaseClientFactory};
use crate::error::{Error, Result};

/// Fixed timeout applied to every admin API request
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Admin API client for one deployment endpoint
pub struct HttpDatabaseClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpDatabaseClient {
    /// Build a client for the given endpoint URL
    pub fn new(endpoint: &str, credentials: Option<Credentials>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: endpoint.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.http.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.http.post(self.url(path)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authorized(self.http.delete(self.url(path)))
    }
}

#[async_trait]
impl DatabaseClient for HttpDatabaseClient {
    async fn list_backups(&self) -> Result<Vec<BackupMeta>> {
        let resp = self.get("/_api/backup").send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn create_backup(&self) -> Result<BackupMeta> {
        let resp = self.post("/_api/backup").send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn get_backup(&self, id: &str) -> Result<Option<BackupMeta>> {
        let resp = self.get(&format!("/_api/backup/{}", id)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn delete_backup(&self, id: &str) -> Result<()> {
        let resp = self.delete(&format!("/_api/backup/{}", id)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        resp.error_for_status()?;
        Ok(())
    }

    async fn download_backup(&self, request: &BackupDownload) -> Result<BackupMeta> {
        let body = json!({
            "id": request.id,
            "repositoryUrl": request.repository_url,
        });
        let resp = self
            .post("/_api/backup/download")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn upload_backup(&self, id: &str, target: &BackupUpload) -> Result<()> {
        let body = json!({
            "repositoryUrl": target.repository_url,
        });
        self.post(&format!("/_api/backup/{}/upload", id))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Factory building [`HttpDatabaseClient`]s from a deployment's endpoint
#[derive(Clone, Default)]
pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Create the factory
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseClientFactory for HttpClientFactory {
    async fn client(
        &self,
        deployment: &DatabaseDeployment,
        credentials: Option<Credentials>,
    ) -> Result<Box<dyn DatabaseClient>> {
        if deployment.spec.endpoint.is_empty() {
            return Err(Error::config(format!(
                "deployment {} has no endpoint configured",
                deployment.metadata.name.as_deref().unwrap_or("<unnamed>")
            )));
        }
        Ok(Box::new(HttpDatabaseClient::new(
            &deployment.spec.endpoint,
            credentials,
        )?))
    }
}
