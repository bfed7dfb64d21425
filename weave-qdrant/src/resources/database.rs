//! Qdrant Database resource - a Qdrant deployment on GKE
//!
//! Composes weave-kubernetes child resources: a headless Service for pod DNS,
//! a StatefulSet with persistent storage, and a LoadBalancer Service for
//! external access.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use weave_gcp::Gke;
use weave_kubernetes::{
    ContainerConfig, ContainerPortConfig, EnvVarConfig, K8sClient, PortConfig, ProbeConfig,
    ResourcesConfig, Service, ServiceConfig, ServiceType, StatefulSet, StatefulSetConfig,
    VolumeClaimTemplateConfig, VolumeMountConfig,
};
use weave_resource::{
    Dependency, HealthStatus, LogEntry, Resource, ResourceError, ResourceResult,
};

const QDRANT_IMAGE: &str = "qdrant/qdrant:v1.12.1";
const REST_PORT: u16 = 6333;
const GRPC_PORT: u16 = 6334;

const API_KEY_LENGTH: usize = 32;
const LIVENESS_INITIAL_DELAY_SECONDS: u32 = 30;
const LOAD_BALANCER_TIMEOUT: Duration = Duration::from_secs(300);

fn default_storage_size() -> String {
    "10Gi".to_string()
}

fn default_storage_class() -> String {
    "standard-rwo".to_string()
}

fn default_memory() -> String {
    "2Gi".to_string()
}

fn default_cpu() -> String {
    "1".to_string()
}

fn default_replicas() -> u32 {
    1
}

/// Persistent storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_size")]
    pub size: String,

    #[serde(rename = "class", default = "default_storage_class")]
    pub storage_class: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            size: default_storage_size(),
            storage_class: default_storage_class(),
        }
    }
}

/// CPU and memory limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "default_memory")]
    pub memory: String,

    #[serde(default = "default_cpu")]
    pub cpu: String,
}

/// Configuration for a Qdrant database deployment.
///
/// `api_key` and `generate_api_key` are mutually exclusive; a generated key
/// is 32 alphanumeric characters and appears in the outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// GKE cluster dependency providing Kubernetes credentials.
    pub cluster: Dependency<Gke>,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceLimits>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub generate_api_key: bool,
}

impl DatabaseConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.api_key.is_some() && self.generate_api_key {
            return Err(ResourceError::Validation(
                "cannot set both `api_key` and `generate_api_key`; use one or the other".into(),
            ));
        }

        if self.replicas == 0 {
            return Err(ResourceError::Validation(
                "replicas must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Outputs from a Qdrant database deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOutputs {
    /// HTTP endpoint for the REST API (external LoadBalancer URL).
    pub url: String,
    /// gRPC endpoint (external LoadBalancer URL).
    pub grpc_url: String,
    pub api_key: Option<String>,
    pub ready: bool,
}

/// Qdrant database deployed to GKE.
///
/// Lifecycle:
/// - `on_create`: apply child resources, wait for readiness and the
///   LoadBalancer endpoint
/// - `on_update`: re-apply children; unchanged config returns cached outputs
/// - `on_delete`: delete children in reverse order
pub struct Database {
    name: String,
    config: DatabaseConfig,
    outputs: Option<DatabaseOutputs>,
    kube_client: Option<K8sClient>,
    resolved_api_key: OnceLock<Option<String>>,
}

impl Database {
    pub fn new(name: impl Into<String>, config: DatabaseConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            kube_client: None,
            resolved_api_key: OnceLock::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: DatabaseOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built Kubernetes client for all child resources (tests).
    pub fn with_kube_client(mut self, client: K8sClient) -> Self {
        self.kube_client = Some(client);
        self
    }

    /// The API key children and outputs agree on: the configured key, or one
    /// generated once per resource instance.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolved_api_key
            .get_or_init(|| {
                if let Some(key) = &self.config.api_key {
                    Some(key.clone())
                } else if self.config.generate_api_key {
                    Some(
                        rand::thread_rng()
                            .sample_iter(&Alphanumeric)
                            .take(API_KEY_LENGTH)
                            .map(char::from)
                            .collect(),
                    )
                } else {
                    None
                }
            })
            .clone()
    }

    fn headless_service_name(&self) -> String {
        format!("qdrant-{}-headless", self.name)
    }

    fn client_service_name(&self) -> String {
        format!("qdrant-{}", self.name)
    }

    fn statefulset_name(&self) -> String {
        format!("qdrant-{}", self.name)
    }

    fn namespace(&self) -> String {
        "default".to_string()
    }

    fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            ("app".to_string(), "qdrant".to_string()),
            ("app.kubernetes.io/name".to_string(), "qdrant".to_string()),
            (
                "app.kubernetes.io/instance".to_string(),
                self.name.clone(),
            ),
        ])
    }

    fn service_ports() -> Vec<PortConfig> {
        vec![
            PortConfig::named("rest", REST_PORT, REST_PORT),
            PortConfig::named("grpc", GRPC_PORT, GRPC_PORT),
        ]
    }

    fn attach_client(&self, service: Service) -> Service {
        match &self.kube_client {
            Some(client) => service.with_client(client.clone()),
            None => service,
        }
    }

    fn build_headless_service(&self) -> Service {
        let config = ServiceConfig {
            cluster: self.config.cluster.clone(),
            namespace: self.namespace(),
            service_type: ServiceType::Headless,
            selector: self.labels(),
            ports: Self::service_ports(),
        };

        self.attach_client(Service::new(self.headless_service_name(), config))
    }

    fn build_client_service(&self) -> Service {
        let config = ServiceConfig {
            cluster: self.config.cluster.clone(),
            namespace: self.namespace(),
            service_type: ServiceType::LoadBalancer,
            selector: self.labels(),
            ports: Self::service_ports(),
        };

        self.attach_client(Service::new(self.client_service_name(), config))
    }

    fn build_statefulset(&self) -> StatefulSet {
        let mut container = ContainerConfig::new("qdrant", QDRANT_IMAGE);

        container.ports = Some(vec![
            ContainerPortConfig {
                container_port: REST_PORT,
                name: Some("rest".to_string()),
            },
            ContainerPortConfig {
                container_port: GRPC_PORT,
                name: Some("grpc".to_string()),
            },
        ]);

        if let Some(api_key) = self.resolved_api_key() {
            container.env = Some(vec![EnvVarConfig {
                name: "QDRANT__SERVICE__API_KEY".to_string(),
                value: api_key,
            }]);
        }

        container.volume_mounts = Some(vec![VolumeMountConfig {
            name: "qdrant-storage".to_string(),
            mount_path: "/qdrant/storage".to_string(),
        }]);

        if let Some(limits) = &self.config.resources {
            let amounts = HashMap::from([
                ("memory".to_string(), limits.memory.clone()),
                ("cpu".to_string(), limits.cpu.clone()),
            ]);
            container.resources = Some(ResourcesConfig {
                requests: Some(amounts.clone()),
                limits: Some(amounts),
            });
        }

        container.readiness_probe = Some(ProbeConfig::tcp(REST_PORT));
        container.liveness_probe =
            Some(ProbeConfig::tcp(REST_PORT).with_initial_delay(LIVENESS_INITIAL_DELAY_SECONDS));

        let storage = self.config.storage.clone().unwrap_or_default();

        let config = StatefulSetConfig {
            cluster: self.config.cluster.clone(),
            namespace: self.namespace(),
            replicas: self.config.replicas,
            service_name: self.headless_service_name(),
            selector: self.labels(),
            containers: vec![container],
            volume_claim_templates: vec![VolumeClaimTemplateConfig {
                name: "qdrant-storage".to_string(),
                storage: storage.size,
                storage_class: Some(storage.storage_class),
            }],
        };

        let statefulset = StatefulSet::new(self.statefulset_name(), config);
        match &self.kube_client {
            Some(client) => statefulset.with_client(client.clone()),
            None => statefulset,
        }
    }

    async fn deploy(&self) -> ResourceResult<DatabaseOutputs> {
        self.config.validate()?;

        info!("qdrant database `{}` deploying to cluster", self.name);

        let headless = self.build_headless_service();
        headless.on_create().await?;

        let statefulset = self.build_statefulset();
        statefulset.on_create().await?;

        let client_service = self.build_client_service();
        client_service.on_create().await?;

        let service_outputs = client_service.wait_ready(LOAD_BALANCER_TIMEOUT).await?;
        let endpoint = service_outputs.external_endpoint.ok_or_else(|| {
            ResourceError::State("LoadBalancer reported ready without an endpoint".into())
        })?;

        Ok(DatabaseOutputs {
            url: format!("http://{}:{}", endpoint, REST_PORT),
            grpc_url: format!("http://{}:{}", endpoint, GRPC_PORT),
            api_key: self.resolved_api_key(),
            ready: true,
        })
    }
}

#[async_trait]
impl Resource for Database {
    type Config = DatabaseConfig;
    type Outputs = DatabaseOutputs;

    const PROVIDER: &'static str = "qdrant";
    const KIND: &'static str = "database";

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
        self.deploy().await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.cluster != self.config.cluster {
            return Err(ResourceError::Immutable("cluster"));
        }

        if previous_config == &self.config {
            if let Some(outputs) = &self.outputs {
                return Ok(outputs.clone());
            }
        }

        self.deploy().await
    }

    /// Delete child resources in reverse order of creation.
    async fn on_delete(&self) -> ResourceResult<()> {
        self.build_client_service().on_delete().await?;
        self.build_statefulset().on_delete().await?;
        self.build_headless_service().on_delete().await?;
        Ok(())
    }

    async fn health(&self) -> ResourceResult<HealthStatus> {
        self.build_statefulset().health().await
    }

    async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> ResourceResult<Vec<LogEntry>> {
        self.build_statefulset().logs(since, tail).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            cluster: Dependency::declared("gcp/gke:prod-cluster"),
            replicas: 1,
            storage: None,
            resources: None,
            api_key: None,
            generate_api_key: false,
        }
    }

    #[test]
    fn api_key_and_generate_are_mutually_exclusive() {
        let mut config = config();
        config.api_key = Some("fixed".to_string());
        config.generate_api_key = true;

        assert!(matches!(
            config.validate(),
            Err(ResourceError::Validation(_))
        ));
    }

    #[test]
    fn generated_api_key_is_stable_per_resource() {
        let mut config = config();
        config.generate_api_key = true;

        let database = Database::new("vectors", config);
        let first = database.resolved_api_key().unwrap();
        let second = database.resolved_api_key().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), API_KEY_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn configured_api_key_wins() {
        let mut config = config();
        config.api_key = Some("fixed-key".to_string());

        let database = Database::new("vectors", config);
        assert_eq!(database.resolved_api_key().as_deref(), Some("fixed-key"));
    }

    #[test]
    fn child_resources_are_namespaced_by_resource_name() {
        let database = Database::new("vectors", config());

        assert_eq!(database.headless_service_name(), "qdrant-vectors-headless");
        assert_eq!(database.client_service_name(), "qdrant-vectors");
        assert_eq!(database.statefulset_name(), "qdrant-vectors");
        assert_eq!(
            database.labels().get("app.kubernetes.io/instance"),
            Some(&"vectors".to_string())
        );
    }
}
