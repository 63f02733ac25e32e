//! DatabaseDeployment Custom Resource Definition
//!
//! Represents one managed database cluster. Backups reference a deployment
//! by name and are owned by it for garbage collection.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DatabaseDeployment resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "database.oso.sh",
    version = "v1alpha1",
    kind = "DatabaseDeployment",
    plural = "databasedeployments",
    singular = "databasedeployment",
    shortname = "dbd",
    namespaced,
    status = "DatabaseDeploymentStatus",
    printcolumn = r#"{"name": "Endpoint", "type": "string", "jsonPath": ".spec.endpoint"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDeploymentSpec {
    /// Admin API endpoint of the database cluster (e.g. "https://db1:8529")
    pub endpoint: String,
}

/// DatabaseDeployment status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDeploymentStatus {
    /// Current phase reported by the deployment controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}
