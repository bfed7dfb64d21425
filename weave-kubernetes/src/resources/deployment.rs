//! Kubernetes Deployment resource

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_gcp::Gke;
use weave_resource::{
    Dependency, HealthStatus, LogEntry, LogLevel, Resource, ResourceError, ResourceResult,
};

use crate::client::{client_from_cluster, K8sClient};
use crate::resources::podspec::{pod_template, ContainerConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLL_ATTEMPTS: u64 = 60;

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replicas() -> u32 {
    1
}

/// Rollout strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    RollingUpdate,
    Recreate,
}

impl Default for StrategyType {
    fn default() -> Self {
        StrategyType::RollingUpdate
    }
}

/// Configuration for a Deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub cluster: Dependency<Gke>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Label selector for pods; also used as pod labels unless `labels` is set.
    pub selector: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,

    pub containers: Vec<ContainerConfig>,

    #[serde(default)]
    pub strategy: StrategyType,
}

impl DeploymentConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.selector.is_empty() {
            return Err(ResourceError::Validation("selector must not be empty".into()));
        }

        if self.containers.is_empty() {
            return Err(ResourceError::Validation(
                "containers must contain at least one entry".into(),
            ));
        }

        Ok(())
    }

    fn pod_labels(&self) -> &HashMap<String, String> {
        self.labels.as_ref().unwrap_or(&self.selector)
    }
}

/// Outputs from Deployment creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutputs {
    pub name: String,
    pub namespace: String,
    pub ready_replicas: u32,
}

/// Kubernetes Deployment resource.
///
/// Lifecycle:
/// - `on_create`/`on_update`: apply manifest, wait until all replicas ready
/// - `on_delete`: delete, idempotent
pub struct Deployment {
    name: String,
    config: DeploymentConfig,
    outputs: Option<DeploymentOutputs>,
    client: Option<K8sClient>,
}

impl Deployment {
    pub fn new(name: impl Into<String>, config: DeploymentConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: DeploymentOutputs) -> Self {
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
            "/apis/apps/v1/namespaces/{}/deployments",
            self.config.namespace
        )
    }

    fn item(&self) -> String {
        format!("{}/{}", self.collection(), self.name)
    }

    fn manifest(&self) -> Value {
        let strategy = match self.config.strategy {
            StrategyType::RollingUpdate => json!({"type": "RollingUpdate"}),
            StrategyType::Recreate => json!({"type": "Recreate"}),
        };

        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": self.name, "namespace": self.config.namespace},
            "spec": {
                "replicas": self.config.replicas,
                "selector": {"matchLabels": self.config.selector},
                "strategy": strategy,
                "template": pod_template(self.config.pod_labels(), &self.config.containers),
            }
        })
    }

    fn ready_replicas(object: &Value) -> u32 {
        object
            .pointer("/status/readyReplicas")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    async fn apply_and_wait(&self) -> ResourceResult<DeploymentOutputs> {
        self.config.validate()?;

        let client = self.client()?;
        info!(
            "deployment `{}` applying to namespace {}",
            self.name, self.config.namespace
        );
        client
            .apply(&self.collection(), &self.name, &self.manifest())
            .await?;

        self.wait_ready(&client).await
    }

    async fn wait_ready(&self, client: &K8sClient) -> ResourceResult<DeploymentOutputs> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            let object = client.get(&self.item()).await?;
            let ready = Self::ready_replicas(&object);

            if ready >= self.config.replicas {
                return Ok(DeploymentOutputs {
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
            what: format!("deployment {} to become ready", self.name),
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
impl Resource for Deployment {
    type Config = DeploymentConfig;
    type Outputs = DeploymentOutputs;

    const PROVIDER: &'static str = "kubernetes";
    const KIND: &'static str = "deployment";

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
            Err(err) if err.is_not_found() => Ok(HealthStatus::unhealthy("deployment not found")),
            Err(err) => Err(err),
        }
    }

    /// Fetch logs from all pods matching the selector.
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

/// List pods by selector and collect their recent log lines.
pub(crate) async fn fetch_pod_logs(
    client: &K8sClient,
    namespace: &str,
    label_selector: &str,
    since: Option<DateTime<Utc>>,
    tail: usize,
) -> ResourceResult<Vec<LogEntry>> {
    let pods = client
        .get(&format!(
            "/api/v1/namespaces/{}/pods?labelSelector={}",
            namespace, label_selector
        ))
        .await?;

    let empty = Vec::new();
    let items = pods.get("items").and_then(Value::as_array).unwrap_or(&empty);
    let mut entries = Vec::new();

    for pod in items {
        let Some(pod_name) = pod.pointer("/metadata/name").and_then(Value::as_str) else {
            continue;
        };

        let text = client
            .get_text(&format!(
                "/api/v1/namespaces/{}/pods/{}/log?tailLines={}&timestamps=true",
                namespace, pod_name, tail
            ))
            .await?;

        for line in text.lines() {
            let (timestamp, message) = match line.split_once(' ') {
                Some((stamp, rest)) => (
                    DateTime::parse_from_rfc3339(stamp)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    rest,
                ),
                None => (Utc::now(), line),
            };

            if let Some(since) = since {
                if timestamp < since {
                    continue;
                }
            }

            let mut entry = LogEntry::new(timestamp, LogLevel::Info, message);
            entry.metadata = Some(json!({"pod": pod_name}));
            entries.push(entry);
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::podspec::EnvVarConfig;

    fn config() -> DeploymentConfig {
        let mut container = ContainerConfig::new("app", "app:1.0");
        container.env = Some(vec![EnvVarConfig {
            name: "MODE".to_string(),
            value: "prod".to_string(),
        }]);

        DeploymentConfig {
            cluster: Dependency::declared("gcp/gke:prod"),
            namespace: "default".to_string(),
            replicas: 2,
            selector: HashMap::from([("app".to_string(), "demo".to_string())]),
            labels: None,
            containers: vec![container],
            strategy: StrategyType::default(),
        }
    }

    #[test]
    fn manifest_matches_selector_and_template_labels() {
        let deployment = Deployment::new("demo", config());
        let manifest = deployment.manifest();

        assert_eq!(manifest["spec"]["replicas"], 2);
        assert_eq!(manifest["spec"]["selector"]["matchLabels"]["app"], "demo");
        assert_eq!(manifest["spec"]["template"]["metadata"]["labels"]["app"], "demo");
        assert_eq!(manifest["spec"]["strategy"]["type"], "RollingUpdate");
    }

    #[test]
    fn label_selector_is_deterministic() {
        let deployment = Deployment::new("demo", config());
        assert_eq!(deployment.label_selector(), "app=demo");
    }
}
