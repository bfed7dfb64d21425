//! Kubernetes ConfigMap resource

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use weave_gcp::Gke;
use weave_resource::{Dependency, Resource, ResourceError, ResourceResult};

use crate::client::{client_from_cluster, K8sClient};

fn default_namespace() -> String {
    "default".to_string()
}

/// Configuration for a ConfigMap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapConfig {
    pub cluster: Dependency<Gke>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub data: HashMap<String, String>,
}

/// Outputs from ConfigMap creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapOutputs {
    pub name: String,
    pub namespace: String,
}

/// Kubernetes ConfigMap resource.
pub struct ConfigMap {
    name: String,
    config: ConfigMapConfig,
    outputs: Option<ConfigMapOutputs>,
    client: Option<K8sClient>,
}

impl ConfigMap {
    pub fn new(name: impl Into<String>, config: ConfigMapConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ConfigMapOutputs) -> Self {
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

    fn collection(&self) -> String {
        format!("/api/v1/namespaces/{}/configmaps", self.config.namespace)
    }

    fn manifest(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": self.name, "namespace": self.config.namespace},
            "data": self.config.data
        })
    }

    async fn apply(&self) -> ResourceResult<ConfigMapOutputs> {
        let client = self.client()?;
        client
            .apply(&self.collection(), &self.name, &self.manifest())
            .await?;

        Ok(ConfigMapOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
        })
    }
}

#[async_trait]
impl Resource for ConfigMap {
    type Config = ConfigMapConfig;
    type Outputs = ConfigMapOutputs;

    const PROVIDER: &'static str = "kubernetes";
    const KIND: &'static str = "config_map";

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

        if previous_config.namespace != self.config.namespace {
            return Err(ResourceError::Immutable("namespace"));
        }

        self.apply().await
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;

        match client
            .delete(&format!("{}/{}", self.collection(), self.name))
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
