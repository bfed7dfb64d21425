//! Qdrant provider
//!
//! Manages Qdrant vector collections over the REST API (Qdrant Cloud or local
//! instances) and self-hosted Qdrant deployments on GKE composed from
//! weave-kubernetes child resources.

pub mod client;
pub mod resources;

pub use client::QdrantClient;
pub use resources::collection::{
    Collection, CollectionConfig, CollectionOutputs, Distance, VectorConfig,
};
pub use resources::database::{
    Database, DatabaseConfig, DatabaseOutputs, ResourceLimits, StorageConfig,
};
