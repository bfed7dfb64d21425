//! Qdrant Collection resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use weave_resource::{FieldValue, Resource, ResourceError, ResourceResult};

use crate::client::QdrantClient;

fn default_url() -> String {
    "http://localhost:6333".to_string()
}

/// Distance metric for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

impl Default for Distance {
    fn default() -> Self {
        Distance::Cosine
    }
}

/// Vector configuration for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Vector dimension; must match the embedding model's output.
    pub size: u64,

    #[serde(default)]
    pub distance: Distance,
}

/// Configuration for a Qdrant collection. Supports Qdrant Cloud (with API
/// key) and local instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<FieldValue<String>>,

    #[serde(default = "default_url")]
    pub url: String,

    /// Collection name within Qdrant.
    pub name: String,

    pub vectors: VectorConfig,

    /// Store vectors on disk instead of memory for larger datasets.
    #[serde(default)]
    pub on_disk: bool,
}

impl CollectionConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.name.trim().is_empty() {
            return Err(ResourceError::Validation("name must not be empty".into()));
        }

        if self.vectors.size == 0 {
            return Err(ResourceError::Validation(
                "vectors.size must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// True when size, distance, or on_disk changed - all of which require
    /// recreating the collection.
    fn vector_config_changed(&self, previous: &CollectionConfig) -> bool {
        previous.vectors.size != self.vectors.size
            || previous.vectors.distance != self.vectors.distance
            || previous.on_disk != self.on_disk
    }
}

/// Outputs from collection operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutputs {
    pub name: String,
    pub indexed_vectors_count: u64,
    pub points_count: u64,
    /// Collection status (green, yellow, red).
    pub status: String,
}

/// Qdrant collection resource.
///
/// Lifecycle:
/// - `on_create`: create collection if absent
/// - `on_update`: recreate if vector config changed (destructive)
/// - `on_delete`: delete collection, idempotent
pub struct Collection {
    name: String,
    config: CollectionConfig,
    outputs: Option<CollectionOutputs>,
}

impl Collection {
    pub fn new(name: impl Into<String>, config: CollectionConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: CollectionOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn client(&self) -> ResourceResult<QdrantClient> {
        let api_key = match &self.config.api_key {
            Some(field) => Some(field.value()?.clone()),
            None => None,
        };

        QdrantClient::new(&self.config.url, api_key)
    }

    async fn collection_info(&self, client: &QdrantClient) -> ResourceResult<CollectionOutputs> {
        let info = client.get_collection(&self.config.name).await?;

        Ok(CollectionOutputs {
            name: self.config.name.clone(),
            indexed_vectors_count: info
                .get("indexed_vectors_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            points_count: info.get("points_count").and_then(Value::as_u64).unwrap_or(0),
            status: info
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        })
    }
}

#[async_trait]
impl Resource for Collection {
    type Config = CollectionConfig;
    type Outputs = CollectionOutputs;

    const PROVIDER: &'static str = "qdrant";
    const KIND: &'static str = "collection";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    /// Create the collection if it doesn't exist. Idempotent: an existing
    /// collection's current info is returned.
    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.config.validate()?;

        let client = self.client()?;

        if !client.collection_exists(&self.config.name).await? {
            info!("collection `{}` creating {}", self.name, self.config.name);
            client
                .create_collection(&self.config.name, &self.config.vectors, self.config.on_disk)
                .await?;
        }

        self.collection_info(&client).await
    }

    /// Recreate the collection when the vector configuration changed. This is
    /// destructive: all existing vectors are lost.
    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.name != self.config.name {
            return Err(ResourceError::Immutable("name"));
        }

        self.config.validate()?;

        let client = self.client()?;

        if self.config.vector_config_changed(previous_config) {
            if client.collection_exists(&self.config.name).await? {
                info!(
                    "collection `{}` recreating {} for new vector config",
                    self.name, self.config.name
                );
                client.delete_collection(&self.config.name).await?;
            }

            client
                .create_collection(&self.config.name, &self.config.vectors, self.config.on_disk)
                .await?;
        }

        self.collection_info(&client).await
    }

    /// Delete the collection and all its vectors. Idempotent.
    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;

        if client.collection_exists(&self.config.name).await? {
            client.delete_collection(&self.config.name).await?;
        }

        Ok(())
    }
}
