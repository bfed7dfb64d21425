//! Shared pod-spec configuration types
//!
//! Deployments and StatefulSets describe containers the same way; both build
//! their pod templates from these types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Container port configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerPortConfig {
    pub container_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Literal environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVarConfig {
    pub name: String,
    pub value: String,
}

/// Environment variable sourced from a Kubernetes secret key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvFromSecretConfig {
    pub name: String,
    pub secret_name: String,
    pub secret_key: String,
}

/// Volume mount within a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMountConfig {
    pub name: String,
    pub mount_path: String,
}

/// Container resource requests and limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<HashMap<String, String>>,
}

/// HTTP GET probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpGetConfig {
    pub path: String,
    pub port: u16,
}

fn default_period_seconds() -> u32 {
    10
}

fn default_timeout_seconds() -> u32 {
    1
}

fn default_failure_threshold() -> u32 {
    3
}

/// Container probe configuration. Exactly one of `http_get` or
/// `tcp_socket_port` should be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_get: Option<HttpGetConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_socket_port: Option<u16>,

    #[serde(default)]
    pub initial_delay_seconds: u32,

    #[serde(default = "default_period_seconds")]
    pub period_seconds: u32,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl ProbeConfig {
    /// TCP probe with defaults, the common case for wire services.
    pub fn tcp(port: u16) -> Self {
        Self {
            http_get: None,
            tcp_socket_port: Some(port),
            initial_delay_seconds: 0,
            period_seconds: default_period_seconds(),
            timeout_seconds: default_timeout_seconds(),
            failure_threshold: default_failure_threshold(),
        }
    }

    pub fn with_initial_delay(mut self, seconds: u32) -> Self {
        self.initial_delay_seconds = seconds;
        self
    }
}

/// Container specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ContainerPortConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVarConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_from_secret: Option<Vec<EnvFromSecretConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<VolumeMountConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeConfig>,
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: None,
            env: None,
            env_from_secret: None,
            command: None,
            args: None,
            resources: None,
            volume_mounts: None,
            liveness_probe: None,
            readiness_probe: None,
        }
    }
}

/// Persistent volume claim template for StatefulSets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeClaimTemplateConfig {
    pub name: String,

    /// Requested storage, e.g. "10Gi".
    pub storage: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

fn probe_manifest(probe: &ProbeConfig) -> Value {
    let mut manifest = json!({
        "initialDelaySeconds": probe.initial_delay_seconds,
        "periodSeconds": probe.period_seconds,
        "timeoutSeconds": probe.timeout_seconds,
        "failureThreshold": probe.failure_threshold,
    });

    if let Some(http_get) = &probe.http_get {
        manifest["httpGet"] = json!({"path": http_get.path, "port": http_get.port});
    } else if let Some(port) = probe.tcp_socket_port {
        manifest["tcpSocket"] = json!({"port": port});
    }

    manifest
}

pub(crate) fn container_manifest(container: &ContainerConfig) -> Value {
    let mut manifest = json!({
        "name": container.name,
        "image": container.image,
    });

    if let Some(ports) = &container.ports {
        let ports: Vec<Value> = ports
            .iter()
            .map(|p| {
                let mut port = json!({"containerPort": p.container_port});
                if let Some(name) = &p.name {
                    port["name"] = json!(name);
                }
                port
            })
            .collect();
        manifest["ports"] = json!(ports);
    }

    let mut env: Vec<Value> = Vec::new();
    if let Some(vars) = &container.env {
        env.extend(vars.iter().map(|v| json!({"name": v.name, "value": v.value})));
    }
    if let Some(vars) = &container.env_from_secret {
        env.extend(vars.iter().map(|v| {
            json!({
                "name": v.name,
                "valueFrom": {
                    "secretKeyRef": {"name": v.secret_name, "key": v.secret_key}
                }
            })
        }));
    }
    if !env.is_empty() {
        manifest["env"] = json!(env);
    }

    if let Some(command) = &container.command {
        manifest["command"] = json!(command);
    }

    if let Some(args) = &container.args {
        manifest["args"] = json!(args);
    }

    if let Some(resources) = &container.resources {
        let mut value = json!({});
        if let Some(requests) = &resources.requests {
            value["requests"] = json!(requests);
        }
        if let Some(limits) = &resources.limits {
            value["limits"] = json!(limits);
        }
        manifest["resources"] = value;
    }

    if let Some(mounts) = &container.volume_mounts {
        let mounts: Vec<Value> = mounts
            .iter()
            .map(|m| json!({"name": m.name, "mountPath": m.mount_path}))
            .collect();
        manifest["volumeMounts"] = json!(mounts);
    }

    if let Some(probe) = &container.liveness_probe {
        manifest["livenessProbe"] = probe_manifest(probe);
    }

    if let Some(probe) = &container.readiness_probe {
        manifest["readinessProbe"] = probe_manifest(probe);
    }

    manifest
}

pub(crate) fn pod_template(
    labels: &HashMap<String, String>,
    containers: &[ContainerConfig],
) -> Value {
    let containers: Vec<Value> = containers.iter().map(container_manifest).collect();

    json!({
        "metadata": {"labels": labels},
        "spec": {"containers": containers}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_manifest_includes_secret_env() {
        let mut container = ContainerConfig::new("app", "app:1.0");
        container.env = Some(vec![EnvVarConfig {
            name: "MODE".to_string(),
            value: "prod".to_string(),
        }]);
        container.env_from_secret = Some(vec![EnvFromSecretConfig {
            name: "API_KEY".to_string(),
            secret_name: "app-keys".to_string(),
            secret_key: "api-key".to_string(),
        }]);

        let manifest = container_manifest(&container);
        let env = manifest["env"].as_array().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[1]["valueFrom"]["secretKeyRef"]["name"], "app-keys");
    }

    #[test]
    fn tcp_probe_manifest_sets_socket_port() {
        let mut container = ContainerConfig::new("db", "db:1.0");
        container.readiness_probe = Some(ProbeConfig::tcp(6333));
        container.liveness_probe = Some(ProbeConfig::tcp(6333).with_initial_delay(30));

        let manifest = container_manifest(&container);
        assert_eq!(manifest["readinessProbe"]["tcpSocket"]["port"], 6333);
        assert_eq!(manifest["livenessProbe"]["initialDelaySeconds"], 30);
    }
}
