//! Kubernetes provider
//!
//! Manages Kubernetes objects on GKE clusters through the plain REST API,
//! authenticated with the cluster's CA certificate and the same
//! service-account credentials that created the cluster. Other providers
//! (qdrant, agno) compose these resources into higher-level deployments.

pub mod client;
pub mod resources;

pub use client::K8sClient;
pub use resources::config_map::{ConfigMap, ConfigMapConfig, ConfigMapOutputs};
pub use resources::deployment::{Deployment, DeploymentConfig, DeploymentOutputs, StrategyType};
pub use resources::namespace::{Namespace, NamespaceConfig, NamespaceOutputs};
pub use resources::podspec::{
    ContainerConfig, ContainerPortConfig, EnvFromSecretConfig, EnvVarConfig, HttpGetConfig,
    ProbeConfig, ResourcesConfig, VolumeClaimTemplateConfig, VolumeMountConfig,
};
pub use resources::secret::{Secret, SecretConfig, SecretOutputs};
pub use resources::service::{PortConfig, Service, ServiceConfig, ServiceOutputs, ServiceType};
pub use resources::statefulset::{StatefulSet, StatefulSetConfig, StatefulSetOutputs};
