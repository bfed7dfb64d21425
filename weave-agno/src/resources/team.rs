//! Agno team resource - coordinated member agents deployed to GKE

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weave_gcp::Gke;
use weave_kubernetes::{Deployment, EnvVarConfig, K8sClient, Service};
use weave_resource::{
    Dependency, HealthStatus, LogEntry, Resource, ResourceError, ResourceResult,
};

use crate::resources::agent::{
    in_cluster_url, workload_deployment_config, workload_service_config, Agent, ModelRef,
};
use crate::spec::TeamSpec;

const SPEC_ENV_VAR: &str = "AGNO_TEAM_SPEC";

fn default_image() -> String {
    "ghcr.io/agno-agi/agno:latest".to_string()
}

fn default_replicas() -> u32 {
    1
}

/// Configuration for a team deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    /// GKE cluster dependency providing Kubernetes credentials.
    pub cluster: Dependency<Gke>,

    /// Coordinating model for routing between members.
    pub model: ModelRef,

    /// Member agents whose specs the team embeds.
    pub members: Vec<Dependency<Agent>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

impl TeamConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.members.is_empty() {
            return Err(ResourceError::Validation(
                "members must contain at least one agent".into(),
            ));
        }

        Ok(())
    }
}

/// Outputs from a team deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamOutputs {
    pub spec: TeamSpec,
    /// In-cluster URL for the team API.
    pub url: String,
}

/// Agno team deployed to GKE.
///
/// Lifecycle mirrors the agent resource; the spec embeds every member's
/// agent spec so the container can reconstruct the whole team.
pub struct Team {
    name: String,
    config: TeamConfig,
    outputs: Option<TeamOutputs>,
    kube_client: Option<K8sClient>,
}

impl Team {
    pub fn new(name: impl Into<String>, config: TeamConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            kube_client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: TeamOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built Kubernetes client for all child resources (tests).
    pub fn with_kube_client(mut self, client: K8sClient) -> Self {
        self.kube_client = Some(client);
        self
    }

    fn workload_name(&self) -> String {
        format!("agno-team-{}", self.name)
    }

    fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            ("app".to_string(), "agno-team".to_string()),
            (
                "app.kubernetes.io/instance".to_string(),
                self.name.clone(),
            ),
        ])
    }

    /// Assemble the team spec from the coordinating model and resolved
    /// member agents.
    pub fn build_spec(&self) -> ResourceResult<TeamSpec> {
        self.config.validate()?;

        let model = self.config.model.spec()?;

        let mut member_specs = Vec::with_capacity(self.config.members.len());
        for member in &self.config.members {
            let spec = member
                .resolve()?
                .outputs
                .as_ref()
                .map(|outputs| outputs.spec.clone())
                .ok_or_else(|| {
                    ResourceError::State(format!("agent `{}` outputs not available", member.id()))
                })?;
            member_specs.push(spec);
        }

        Ok(TeamSpec {
            name: self.name.clone(),
            instructions: self.config.instructions.clone(),
            model,
            member_specs,
        })
    }

    fn build_deployment(&self, spec: &TeamSpec) -> ResourceResult<Deployment> {
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

    async fn deploy(&self) -> ResourceResult<TeamOutputs> {
        let spec = self.build_spec()?;

        tracing::info!(
            "team `{}` deploying {} with {} members",
            self.name,
            self.workload_name(),
            spec.member_specs.len()
        );
        self.build_deployment(&spec)?.on_create().await?;
        self.build_service().on_create().await?;

        Ok(TeamOutputs {
            url: in_cluster_url(&self.workload_name()),
            spec,
        })
    }
}

#[async_trait]
impl Resource for Team {
    type Config = TeamConfig;
    type Outputs = TeamOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "team";

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

        let spec = TeamSpec {
            name: self.name.clone(),
            instructions: None,
            model: crate::spec::ModelSpec {
                provider: crate::spec::ModelProvider::OpenAi,
                id: String::new(),
                api_key: String::new(),
                max_tokens: None,
                temperature: None,
            },
            member_specs: Vec::new(),
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
