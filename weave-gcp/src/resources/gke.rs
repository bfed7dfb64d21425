//! GCP GKE Autopilot cluster resource

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_resource::{Resource, ResourceError, ResourceResult};

use crate::auth::CredentialsConfig;
use crate::client::GcpClient;

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_POLL_ATTEMPTS: u32 = 40; // 40 * 30s = 20 minutes max wait

/// Release channel for cluster updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReleaseChannel {
    Rapid,
    Regular,
    Stable,
}

impl ReleaseChannel {
    fn as_str(&self) -> &'static str {
        match self {
            ReleaseChannel::Rapid => "RAPID",
            ReleaseChannel::Regular => "REGULAR",
            ReleaseChannel::Stable => "STABLE",
        }
    }
}

fn default_autopilot() -> bool {
    true
}

fn default_network() -> String {
    "default".to_string()
}

fn default_release_channel() -> ReleaseChannel {
    ReleaseChannel::Regular
}

/// Configuration for a GKE Autopilot cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GkeConfig {
    pub project_id: String,
    pub credentials: CredentialsConfig,

    /// GCP region for the cluster (e.g. europe-west4).
    pub region: String,
    pub name: String,

    #[serde(default = "default_autopilot")]
    pub autopilot: bool,

    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,

    #[serde(default = "default_release_channel")]
    pub release_channel: ReleaseChannel,
}

impl GkeConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(ResourceError::Validation("project_id must not be empty".into()));
        }

        if self.region.trim().is_empty() {
            return Err(ResourceError::Validation("region must not be empty".into()));
        }

        if self.name.trim().is_empty() {
            return Err(ResourceError::Validation("name must not be empty".into()));
        }

        Ok(())
    }

    fn parent_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    fn cluster_path(&self) -> String {
        format!("{}/clusters/{}", self.parent_path(), self.name)
    }
}

/// Outputs from GKE cluster creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GkeOutputs {
    pub name: String,
    /// Cluster API server endpoint (IP or hostname).
    pub endpoint: String,
    /// Base64-encoded cluster CA certificate.
    pub cluster_ca_certificate: String,
    pub location: String,
    /// Cluster status (RUNNING, PROVISIONING, ...).
    pub status: String,
}

/// GCP GKE Autopilot cluster resource.
///
/// Lifecycle:
/// - `on_create`: create cluster, wait for RUNNING
/// - `on_update`: immutable-field checks, refresh state
/// - `on_delete`: delete cluster, wait for completion, idempotent
pub struct Gke {
    name: String,
    config: GkeConfig,
    outputs: Option<GkeOutputs>,
    client: Option<GcpClient>,
}

impl Gke {
    pub fn new(name: impl Into<String>, config: GkeConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: GkeOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built client (tests).
    pub fn with_client(mut self, client: GcpClient) -> Self {
        self.client = Some(client);
        self
    }

    fn client(&self) -> ResourceResult<GcpClient> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => GcpClient::new(&self.config.credentials),
        }
    }

    fn build_cluster_body(&self) -> Value {
        let mut cluster = json!({
            "name": self.config.name,
            "network": self.config.network,
            "releaseChannel": {"channel": self.config.release_channel.as_str()},
        });

        if let Some(subnetwork) = &self.config.subnetwork {
            cluster["subnetwork"] = json!(subnetwork);
        }

        if self.config.autopilot {
            cluster["autopilot"] = json!({"enabled": true});
        }

        cluster
    }

    fn outputs_from_cluster(cluster: &Value) -> GkeOutputs {
        let text = |path: &str| {
            cluster
                .pointer(path)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        GkeOutputs {
            name: text("/name"),
            endpoint: text("/endpoint"),
            cluster_ca_certificate: text("/masterAuth/clusterCaCertificate"),
            location: text("/location"),
            status: text("/status"),
        }
    }

    async fn get_cluster(&self, client: &GcpClient) -> ResourceResult<Value> {
        let url = client.container_url(&self.config.cluster_path());
        client.get(&url).await
    }

    /// Poll until the cluster reaches RUNNING. ERROR and other degenerate
    /// states fail fast instead of burning the whole wait budget.
    async fn wait_for_running(&self, client: &GcpClient) -> ResourceResult<Value> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            let cluster = self.get_cluster(client).await?;
            let status = cluster
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default();

            match status {
                "RUNNING" => return Ok(cluster),
                "ERROR" => {
                    let message = cluster
                        .get("statusMessage")
                        .and_then(Value::as_str)
                        .unwrap_or("cluster entered ERROR state");
                    return Err(ResourceError::State(message.to_string()));
                }
                "STOPPING" | "DEGRADED" => {
                    return Err(ResourceError::State(format!(
                        "cluster in unexpected state: {}",
                        status
                    )));
                }
                _ => {}
            }

            if attempt + 1 < MAX_POLL_ATTEMPTS {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Err(ResourceError::WaitTimeout {
            what: format!("cluster {} to reach RUNNING", self.config.name),
            secs: MAX_POLL_ATTEMPTS as u64 * POLL_INTERVAL.as_secs(),
        })
    }

    async fn wait_for_deletion(&self, client: &GcpClient) -> ResourceResult<()> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            match self.get_cluster(client).await {
                Ok(_) => {
                    if attempt + 1 < MAX_POLL_ATTEMPTS {
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
                Err(err) if err.is_not_found() => return Ok(()),
                Err(err) => return Err(err),
            }
        }

        Err(ResourceError::WaitTimeout {
            what: format!("cluster {} to be deleted", self.config.name),
            secs: MAX_POLL_ATTEMPTS as u64 * POLL_INTERVAL.as_secs(),
        })
    }
}

#[async_trait]
impl Resource for Gke {
    type Config = GkeConfig;
    type Outputs = GkeOutputs;

    const PROVIDER: &'static str = "gcp";
    const KIND: &'static str = "gke";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    /// Create the cluster and wait for RUNNING. Idempotent: an existing
    /// cluster is adopted and its current state returned.
    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.config.validate()?;

        let client = self.client()?;
        let url = client.container_url(&format!("{}/clusters", self.config.parent_path()));
        let body = json!({"cluster": self.build_cluster_body()});

        info!("gke `{}` creating cluster {}", self.name, self.config.cluster_path());
        match client.post(&url, Some(&body)).await {
            Ok(_) => {}
            Err(err) if err.is_already_exists() => {}
            Err(err) => return Err(err),
        }

        let cluster = self.wait_for_running(&client).await?;
        Ok(Self::outputs_from_cluster(&cluster))
    }

    /// Most cluster properties require recreation; validate that immutable
    /// fields are unchanged and return current state.
    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.project_id != self.config.project_id {
            return Err(ResourceError::Immutable("project_id"));
        }

        if previous_config.region != self.config.region {
            return Err(ResourceError::Immutable("region"));
        }

        if previous_config.name != self.config.name {
            return Err(ResourceError::Immutable("name"));
        }

        if previous_config.network != self.config.network {
            return Err(ResourceError::Immutable("network"));
        }

        if previous_config.autopilot != self.config.autopilot {
            return Err(ResourceError::Immutable("autopilot"));
        }

        if let Some(outputs) = &self.outputs {
            return Ok(outputs.clone());
        }

        let client = self.client()?;
        let cluster = self.get_cluster(&client).await?;
        Ok(Self::outputs_from_cluster(&cluster))
    }

    /// Delete the cluster and wait for completion. Idempotent.
    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;
        let url = client.container_url(&self.config.cluster_path());

        info!("gke `{}` deleting cluster {}", self.name, self.config.cluster_path());
        match client.delete(&url).await {
            Ok(_) => self.wait_for_deletion(&client).await,
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
