//! Kubernetes Secret resource

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

fn default_secret_type() -> String {
    "Opaque".to_string()
}

/// Configuration for a Kubernetes Secret.
///
/// Values go through `stringData` so the API server handles encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretConfig {
    pub cluster: Dependency<Gke>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub string_data: HashMap<String, String>,

    #[serde(default = "default_secret_type")]
    pub secret_type: String,
}

/// Outputs from Secret creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretOutputs {
    pub name: String,
    pub namespace: String,
}

/// Kubernetes Secret resource.
pub struct Secret {
    name: String,
    config: SecretConfig,
    outputs: Option<SecretOutputs>,
    client: Option<K8sClient>,
}

impl Secret {
    pub fn new(name: impl Into<String>, config: SecretConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: SecretOutputs) -> Self {
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
        format!("/api/v1/namespaces/{}/secrets", self.config.namespace)
    }

    fn manifest(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": self.name, "namespace": self.config.namespace},
            "type": self.config.secret_type,
            "stringData": self.config.string_data
        })
    }

    async fn apply(&self) -> ResourceResult<SecretOutputs> {
        let client = self.client()?;
        client
            .apply(&self.collection(), &self.name, &self.manifest())
            .await?;

        Ok(SecretOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
        })
    }
}

#[async_trait]
impl Resource for Secret {
    type Config = SecretConfig;
    type Outputs = SecretOutputs;

    const PROVIDER: &'static str = "kubernetes";
    const KIND: &'static str = "secret";

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
