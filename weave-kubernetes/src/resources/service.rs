//! Kubernetes Service resource

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_gcp::Gke;
use weave_resource::{Dependency, Resource, ResourceError, ResourceResult};

use crate::client::{client_from_cluster, K8sClient};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

fn default_namespace() -> String {
    "default".to_string()
}

/// Service exposure type. `Headless` renders as ClusterIP with
/// `clusterIP: None` (pod DNS for StatefulSets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "ClusterIP")]
    ClusterIp,
    Headless,
    LoadBalancer,
    NodePort,
}

/// Service port configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub port: u16,
    pub target_port: u16,
}

impl PortConfig {
    pub fn named(name: impl Into<String>, port: u16, target_port: u16) -> Self {
        Self {
            name: Some(name.into()),
            port,
            target_port,
        }
    }
}

/// Configuration for a Service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub cluster: Dependency<Gke>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub service_type: ServiceType,

    /// Label selector for backing pods.
    pub selector: HashMap<String, String>,

    pub ports: Vec<PortConfig>,
}

impl ServiceConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.ports.is_empty() {
            return Err(ResourceError::Validation(
                "ports must contain at least one entry".into(),
            ));
        }

        if self.selector.is_empty() {
            return Err(ResourceError::Validation("selector must not be empty".into()));
        }

        Ok(())
    }
}

/// Outputs from Service creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOutputs {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: Option<String>,
    /// External IP or hostname once a LoadBalancer has one.
    pub external_endpoint: Option<String>,
}

/// Kubernetes Service resource.
///
/// Lifecycle:
/// - `on_create`/`on_update`: apply the service manifest
/// - `on_delete`: delete, idempotent
pub struct Service {
    name: String,
    config: ServiceConfig,
    outputs: Option<ServiceOutputs>,
    client: Option<K8sClient>,
}

impl Service {
    pub fn new(name: impl Into<String>, config: ServiceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ServiceOutputs) -> Self {
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
        format!("/api/v1/namespaces/{}/services", self.config.namespace)
    }

    fn item(&self) -> String {
        format!("{}/{}", self.collection(), self.name)
    }

    fn manifest(&self) -> Value {
        let ports: Vec<Value> = self
            .config
            .ports
            .iter()
            .map(|p| {
                let mut port = json!({"port": p.port, "targetPort": p.target_port});
                if let Some(name) = &p.name {
                    port["name"] = json!(name);
                }
                port
            })
            .collect();

        let mut spec = json!({
            "selector": self.config.selector,
            "ports": ports,
        });

        match self.config.service_type {
            ServiceType::ClusterIp => spec["type"] = json!("ClusterIP"),
            ServiceType::Headless => {
                spec["type"] = json!("ClusterIP");
                spec["clusterIP"] = json!("None");
            }
            ServiceType::LoadBalancer => spec["type"] = json!("LoadBalancer"),
            ServiceType::NodePort => spec["type"] = json!("NodePort"),
        }

        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": self.name, "namespace": self.config.namespace},
            "spec": spec
        })
    }

    fn outputs_from_object(&self, object: &Value) -> ServiceOutputs {
        ServiceOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
            cluster_ip: object
                .pointer("/spec/clusterIP")
                .and_then(Value::as_str)
                .filter(|ip| *ip != "None")
                .map(str::to_string),
            external_endpoint: external_endpoint(object),
        }
    }

    async fn apply(&self) -> ResourceResult<ServiceOutputs> {
        self.config.validate()?;

        let client = self.client()?;
        let object = client
            .apply(&self.collection(), &self.name, &self.manifest())
            .await?;

        Ok(self.outputs_from_object(&object))
    }

    /// Wait until the service is addressable. For LoadBalancers this polls
    /// for an ingress IP or hostname; other types are ready once applied.
    pub async fn wait_ready(&self, timeout: Duration) -> ResourceResult<ServiceOutputs> {
        let client = self.client()?;

        if self.config.service_type != ServiceType::LoadBalancer {
            let object = client.get(&self.item()).await?;
            return Ok(self.outputs_from_object(&object));
        }

        let max_attempts = (timeout.as_secs() / POLL_INTERVAL.as_secs()).max(1);

        for attempt in 0..max_attempts {
            let object = client.get(&self.item()).await?;

            if external_endpoint(&object).is_some() {
                return Ok(self.outputs_from_object(&object));
            }

            if attempt + 1 < max_attempts {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Err(ResourceError::WaitTimeout {
            what: format!("LoadBalancer {} to receive an external endpoint", self.name),
            secs: timeout.as_secs(),
        })
    }
}

fn external_endpoint(object: &Value) -> Option<String> {
    let ingress = object
        .pointer("/status/loadBalancer/ingress")?
        .as_array()?
        .first()?;

    ingress
        .get("ip")
        .or_else(|| ingress.get("hostname"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl Resource for Service {
    type Config = ServiceConfig;
    type Outputs = ServiceOutputs;

    const PROVIDER: &'static str = "kubernetes";
    const KIND: &'static str = "service";

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
        info!("service `{}` applying to namespace {}", self.name, self.config.namespace);
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

        match client.delete(&self.item()).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
