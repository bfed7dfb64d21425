//! Kubernetes StatefulSet resource

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_gcp::Gke;
use weave_resource::{
    Dependency, HealthStatus, LogEntry, Resource, ResourceError, ResourceResult,
};

use crate::client::{client_from_cluster, K8sClient};
use crate::resources::deployment::fetch_pod_logs;
use crate::resources::podspec::{pod_template, ContainerConfig, VolumeClaimTemplateConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLL_ATTEMPTS: u64 = 60;

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replicas() -> u32 {
    1
}

/// Configuration for a StatefulSet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatefulSetConfig {
    pub cluster: Dependency<Gke>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Headless service governing pod DNS.
    pub service_name: String,

    /// Label selector for pods; also used as pod labels.
    pub selector: HashMap<String, String>,

    pub containers: Vec<ContainerConfig>,

    #[serde(default)]
    pub volume_claim_templates: Vec<VolumeClaimTemplateConfig>,
}

impl StatefulSetConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.selector.is_empty() {
            return Err(ResourceError::Validation("selector must not be empty".into()));
        }

        if self.containers.is_empty() {
            return Err(ResourceError::Validation(
                "containers must contain at least one entry".into(),
            ));
        }

        if self.service_name.trim().is_empty() {
            return Err(ResourceError::Validation(
                "service_name must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// Outputs from StatefulSet creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatefulSetOutputs {
    pub name: String,
    pub namespace: String,
    pub ready_replicas: u32,
}

/// Kubernetes StatefulSet resource.
///
/// Lifecycle:
/// - `on_create`/`on_update`: apply manifest, wait until all replicas ready
/// - `on_delete`: delete, idempotent (persistent volume claims are retained
///   by Kubernetes semantics)
pub struct StatefulSet {
    name: String,
    config: StatefulSetConfig,
    outputs: Option<StatefulSetOutputs>,
    client: Option<K8sClient>,
}

impl StatefulSet {
    pub fn new(name: impl Into<String>, config: StatefulSetConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: StatefulSetOutputs) -> Self {
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
        format!(
            "/apis/apps/v1/namespaces/{}/statefulsets",
            self.config.namespace
        )
    }

    fn item(&self) -> String {
        format!("{}/{}", self.collection(), self.name)
    }

    fn manifest(&self) -> Value {
        let claims: Vec<Value> = self
            .config
            .volume_claim_templates
            .iter()
            .map(|claim| {
                let mut spec = json!({
                    "accessModes": ["ReadWriteOnce"],
                    "resources": {"requests": {"storage": claim.storage}},
                });
                if let Some(class) = &claim.storage_class {
                    spec["storageClassName"] = json!(class);
                }

                json!({"metadata": {"name": claim.name}, "spec": spec})
            })
            .collect();

        json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {"name": self.name, "namespace": self.config.namespace},
            "spec": {
                "replicas": self.config.replicas,
                "serviceName": self.config.service_name,
                "selector": {"matchLabels": self.config.selector},
                "template": pod_template(&self.config.selector, &self.config.containers),
                "volumeClaimTemplates": claims,
            }
        })
    }

    fn ready_replicas(object: &Value) -> u32 {
        object
            .pointer("/status/readyReplicas")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    async fn apply_and_wait(&self) -> ResourceResult<StatefulSetOutputs> {
        self.config.validate()?;

        let client = self.client()?;
        info!(
            "statefulset `{}` applying to namespace {}",
            self.name, self.config.namespace
        );
        client
            .apply(&self.collection(), &self.name, &self.manifest())
            .await?;

        self.wait_ready(&client).await
    }

    async fn wait_ready(&self, client: &K8sClient) -> ResourceResult<StatefulSetOutputs> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            let object = client.get(&self.item()).await?;
            let ready = Self::ready_replicas(&object);

            if ready >= self.config.replicas {
                return Ok(StatefulSetOutputs {
                    name: self.name.clone(),
                    namespace: self.config.namespace.clone(),
                    ready_replicas: ready,
                });
            }

            if attempt + 1 < MAX_POLL_ATTEMPTS {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Err(ResourceError::WaitTimeout {
            what: format!("statefulset {} to become ready", self.name),
            secs: MAX_POLL_ATTEMPTS * POLL_INTERVAL.as_secs(),
        })
    }

    fn label_selector(&self) -> String {
        let mut pairs: Vec<String> = self
            .config
            .selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        pairs.join(",")
    }
}

#[async_trait]
impl Resource for StatefulSet {
    type Config = StatefulSetConfig;
    type Outputs = StatefulSetOutputs;

    const PROVIDER: &'static str = "kubernetes";
    const KIND: &'static str = "statefulset";

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
        self.apply_and_wait().await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.cluster != self.config.cluster {
            return Err(ResourceError::Immutable("cluster"));
        }

        if previous_config.namespace != self.config.namespace {
            return Err(ResourceError::Immutable("namespace"));
        }

        if previous_config.service_name != self.config.service_name {
            return Err(ResourceError::Immutable("service_name"));
        }

        self.apply_and_wait().await
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;

        match client.delete(&self.item()).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn health(&self) -> ResourceResult<HealthStatus> {
        let client = self.client()?;

        match client.get(&self.item()).await {
            Ok(object) => {
                let ready = Self::ready_replicas(&object);
                let desired = self.config.replicas;

                Ok(if ready >= desired {
                    HealthStatus::healthy(format!("{}/{} replicas ready", ready, desired))
                } else if ready > 0 {
                    HealthStatus::degraded(format!("{}/{} replicas ready", ready, desired))
                } else {
                    HealthStatus::unhealthy(format!("0/{} replicas ready", desired))
                })
            }
            Err(err) if err.is_not_found() => Ok(HealthStatus::unhealthy("statefulset not found")),
            Err(err) => Err(err),
        }
    }

    async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> ResourceResult<Vec<LogEntry>> {
        let client = self.client()?;
        fetch_pod_logs(
            &client,
            &self.config.namespace,
            &self.label_selector(),
            since,
            tail,
        )
        .await
    }
}
