//! Kubernetes Namespace resource

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use weave_gcp::Gke;
use weave_resource::{Dependency, HealthStatus, Resource, ResourceError, ResourceResult};

use crate::client::{client_from_cluster, K8sClient};

/// Configuration for a Namespace. Namespaces are cluster-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// GKE cluster dependency providing Kubernetes credentials.
    pub cluster: Dependency<Gke>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Outputs from Namespace creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceOutputs {
    pub name: String,
}

/// Kubernetes Namespace resource.
///
/// Lifecycle:
/// - `on_create`/`on_update`: apply the namespace manifest
/// - `on_delete`: delete, idempotent
pub struct Namespace {
    name: String,
    config: NamespaceConfig,
    outputs: Option<NamespaceOutputs>,
    client: Option<K8sClient>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, config: NamespaceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: NamespaceOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built client (tests).
    pub fn with_client(mut self, client: K8sClient) -> Self {
        self.client = Some(client);
        self
    }

    fn client(&self) -> ResourceResult<K8sClient> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => client_from_cluster(&self.config.cluster),
        }
    }

    fn manifest(&self) -> Value {
        let mut metadata = json!({"name": self.name});
        if let Some(labels) = &self.config.labels {
            metadata["labels"] = json!(labels);
        }

        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": metadata
        })
    }

    async fn apply(&self) -> ResourceResult<NamespaceOutputs> {
        let client = self.client()?;
        client
            .apply("/api/v1/namespaces", &self.name, &self.manifest())
            .await?;

        Ok(NamespaceOutputs {
            name: self.name.clone(),
        })
    }
}

#[async_trait]
impl Resource for Namespace {
    type Config = NamespaceConfig;
    type Outputs = NamespaceOutputs;

    const PROVIDER: &'static str = "kubernetes";
    const KIND: &'static str = "namespace";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.apply().await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.cluster != self.config.cluster {
            return Err(ResourceError::Immutable("cluster"));
        }

        self.apply().await
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;

        match client.delete(&format!("/api/v1/namespaces/{}", self.name)).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn health(&self) -> ResourceResult<HealthStatus> {
        let client = self.client()?;

        match client.get(&format!("/api/v1/namespaces/{}", self.name)).await {
            Ok(namespace) => {
                let phase = namespace
                    .pointer("/status/phase")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown");

                Ok(if phase == "Active" {
                    HealthStatus::healthy(format!("namespace {} is active", self.name))
                        .with_details(json!({"phase": phase}))
                } else {
                    HealthStatus::degraded(format!("namespace {} phase: {}", self.name, phase))
                        .with_details(json!({"phase": phase}))
                })
            }
            Err(err) if err.is_not_found() => Ok(HealthStatus::unhealthy("namespace not found")),
            Err(err) => Err(err),
        }
    }
}
