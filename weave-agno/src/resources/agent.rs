//! Agno agent resource - an AI agent deployed to GKE
//!
//! Assembles the agent spec from resolved model, tool, and prompt
//! dependencies, then deploys it as a Deployment plus ClusterIP Service.
//! The spec travels to the container as an environment variable.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weave_gcp::Gke;
use weave_kubernetes::{
    ContainerConfig, ContainerPortConfig, Deployment, DeploymentConfig, EnvVarConfig, K8sClient,
    PortConfig, ProbeConfig, Service, ServiceConfig, ServiceType, StrategyType,
};
use weave_resource::{
    Dependency, HealthStatus, LogEntry, Resource, ResourceError, ResourceResult,
};

use crate::resources::model::{AnthropicModel, OpenAiModel};
use crate::resources::prompt::Prompt;
use crate::resources::tools::{ToolsMcp, ToolsWebSearch};
use crate::spec::{AgentSpec, ModelSpec, ToolSpec};

pub(crate) const AGENT_PORT: u16 = 8000;
pub(crate) const SERVICE_PORT: u16 = 80;

const SPEC_ENV_VAR: &str = "AGNO_AGENT_SPEC";

fn default_image() -> String {
    "ghcr.io/agno-agi/agno:latest".to_string()
}

fn default_replicas() -> u32 {
    1
}

/// Reference to the agent's LLM: an openai or anthropic model resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRef {
    OpenAi(Dependency<OpenAiModel>),
    Anthropic(Dependency<AnthropicModel>),
}

impl ModelRef {
    pub fn id(&self) -> &str {
        match self {
            ModelRef::OpenAi(dep) => dep.id(),
            ModelRef::Anthropic(dep) => dep.id(),
        }
    }

    pub(crate) fn spec(&self) -> ResourceResult<ModelSpec> {
        let spec = match self {
            ModelRef::OpenAi(dep) => dep
                .resolve()?
                .outputs
                .as_ref()
                .map(|outputs| outputs.spec.clone()),
            ModelRef::Anthropic(dep) => dep
                .resolve()?
                .outputs
                .as_ref()
                .map(|outputs| outputs.spec.clone()),
        };

        spec.ok_or_else(|| {
            ResourceError::State(format!("model `{}` outputs not available", self.id()))
        })
    }
}

/// Reference to a tool resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolRef {
    Websearch(Dependency<ToolsWebSearch>),
    Mcp(Dependency<ToolsMcp>),
}

impl ToolRef {
    fn spec(&self) -> ResourceResult<ToolSpec> {
        let spec = match self {
            ToolRef::Websearch(dep) => dep
                .resolve()?
                .outputs
                .as_ref()
                .map(|outputs| outputs.spec.clone()),
            ToolRef::Mcp(dep) => dep
                .resolve()?
                .outputs
                .as_ref()
                .map(|outputs| outputs.spec.clone()),
        };

        spec.ok_or_else(|| ResourceError::State("tool outputs not available".into()))
    }
}

/// Configuration for an agent deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// GKE cluster dependency providing Kubernetes credentials.
    pub cluster: Dependency<Gke>,

    pub model: ModelRef,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolRef>,

    /// Prompt resource whose rendered text becomes the instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Dependency<Prompt>>,

    /// Literal instructions, overridden by `prompt` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

/// Outputs from an agent deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutputs {
    /// Specification the container reconstructs the agent from.
    pub spec: AgentSpec,
    /// In-cluster URL for the agent API.
    pub url: String,
}

/// Agno agent deployed to GKE.
///
/// Lifecycle:
/// - `on_create`: apply Deployment + Service, wait for ready
/// - `on_update`: re-apply with the new config
/// - `on_delete`: delete children
pub struct Agent {
    name: String,
    config: AgentConfig,
    outputs: Option<AgentOutputs>,
    kube_client: Option<K8sClient>,
}

impl Agent {
    pub fn new(name: impl Into<String>, config: AgentConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            kube_client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: AgentOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built Kubernetes client for all child resources (tests).
    pub fn with_kube_client(mut self, client: K8sClient) -> Self {
        self.kube_client = Some(client);
        self
    }

    fn workload_name(&self) -> String {
        format!("agno-{}", self.name)
    }

    fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            ("app".to_string(), "agno-agent".to_string()),
            (
                "app.kubernetes.io/instance".to_string(),
                self.name.clone(),
            ),
        ])
    }

    /// Assemble the serializable spec from resolved dependencies.
    pub fn build_spec(&self) -> ResourceResult<AgentSpec> {
        let model = self.config.model.spec()?;

        let mut tools = Vec::with_capacity(self.config.tools.len());
        for tool in &self.config.tools {
            tools.push(tool.spec()?);
        }

        let instructions = match &self.config.prompt {
            Some(prompt) => {
                let resolved = prompt.resolve()?;
                resolved.config.validate()?;
                Some(resolved.config.render())
            }
            None => self.config.instructions.clone(),
        };

        Ok(AgentSpec {
            name: self.name.clone(),
            instructions,
            model,
            tools,
        })
    }

    fn build_deployment(&self, spec: &AgentSpec) -> ResourceResult<Deployment> {
        let deployment = Deployment::new(
            self.workload_name(),
            workload_deployment_config(
                &self.config.cluster,
                self.labels(),
                &self.config.image,
                self.config.replicas,
                EnvVarConfig {
                    name: SPEC_ENV_VAR.to_string(),
                    value: serde_json::to_string(spec)?,
                },
            ),
        );

        Ok(match &self.kube_client {
            Some(client) => deployment.with_client(client.clone()),
            None => deployment,
        })
    }

    fn build_service(&self) -> Service {
        let service = Service::new(
            self.workload_name(),
            workload_service_config(&self.config.cluster, self.labels()),
        );

        match &self.kube_client {
            Some(client) => service.with_client(client.clone()),
            None => service,
        }
    }

    async fn deploy(&self) -> ResourceResult<AgentOutputs> {
        let spec = self.build_spec()?;

        tracing::info!(
            "agent `{}` deploying {} with model {}",
            self.name,
            self.workload_name(),
            spec.model.id
        );
        self.build_deployment(&spec)?.on_create().await?;
        self.build_service().on_create().await?;

        Ok(AgentOutputs {
            url: in_cluster_url(&self.workload_name()),
            spec,
        })
    }
}

#[async_trait]
impl Resource for Agent {
    type Config = AgentConfig;
    type Outputs = AgentOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "agent";

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

    async fn on_delete(&self) -> ResourceResult<()> {
        self.build_service().on_delete().await?;

        // The spec only shapes the manifest; deletion needs the name alone, so
        // a placeholder spec avoids re-resolving dependencies.
        let spec = AgentSpec {
            name: self.name.clone(),
            instructions: None,
            model: ModelSpec {
                provider: crate::spec::ModelProvider::OpenAi,
                id: String::new(),
                api_key: String::new(),
                max_tokens: None,
                temperature: None,
            },
            tools: Vec::new(),
        };

        self.build_deployment(&spec)?.on_delete().await
    }

    async fn health(&self) -> ResourceResult<HealthStatus> {
        let spec = self.build_spec()?;
        self.build_deployment(&spec)?.health().await
    }

    async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> ResourceResult<Vec<LogEntry>> {
        let spec = self.build_spec()?;
        self.build_deployment(&spec)?.logs(since, tail).await
    }
}

pub(crate) fn workload_deployment_config(
    cluster: &Dependency<Gke>,
    labels: HashMap<String, String>,
    image: &str,
    replicas: u32,
    spec_env: EnvVarConfig,
) -> DeploymentConfig {
    let mut container = ContainerConfig::new("agent", image);
    container.ports = Some(vec![ContainerPortConfig {
        container_port: AGENT_PORT,
        name: Some("http".to_string()),
    }]);
    container.env = Some(vec![spec_env]);
    container.readiness_probe = Some(ProbeConfig::tcp(AGENT_PORT));

    DeploymentConfig {
        cluster: cluster.clone(),
        namespace: "default".to_string(),
        replicas,
        selector: labels.clone(),
        labels: Some(labels),
        containers: vec![container],
        strategy: StrategyType::RollingUpdate,
    }
}

pub(crate) fn workload_service_config(
    cluster: &Dependency<Gke>,
    labels: HashMap<String, String>,
) -> ServiceConfig {
    ServiceConfig {
        cluster: cluster.clone(),
        namespace: "default".to_string(),
        service_type: ServiceType::ClusterIp,
        selector: labels,
        ports: vec![PortConfig::named("http", SERVICE_PORT, AGENT_PORT)],
    }
}

pub(crate) fn in_cluster_url(workload_name: &str) -> String {
    format!("http://{}.default.svc.cluster.local", workload_name)
}
