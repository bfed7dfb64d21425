//! GCP provider
//!
//! Wraps Google Cloud surfaces (Secret Manager, GKE, Cloud SQL) behind the
//! weave resource lifecycle, using user-supplied service-account credentials
//! (multi-tenant SaaS pattern) and the plain REST APIs.

pub mod auth;
pub mod client;
pub mod resources;

pub use auth::{CredentialsConfig, TokenSource};
pub use client::GcpClient;
pub use resources::cloudsql::database_instance::AvailabilityType;
pub use resources::cloudsql::{
    Database, DatabaseConfig, DatabaseInstance, DatabaseInstanceConfig, DatabaseInstanceOutputs,
    DatabaseOutputs, SqlUser, SqlUserConfig, SqlUserOutputs,
};
pub use resources::gke::{Gke, GkeConfig, GkeOutputs, ReleaseChannel};
pub use resources::secret::{Secret, SecretConfig, SecretOutputs};
