//! OpenAI Embeddings resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value;
use tracing::info;
use weave_resource::{FieldValue, Resource, ResourceError, ResourceResult};

use crate::api::{EmbeddingInput, EmbeddingsRequest, OpenAiClient};

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Configuration for the Embeddings API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub api_key: FieldValue<String>,

    /// Model identifier, e.g. "text-embedding-3-small".
    #[serde(default = "default_model")]
    pub model: String,

    /// Dimension override for models that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,

    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl EmbeddingsConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.model.trim().is_empty() {
            return Err(ResourceError::Validation("model must not be empty".into()));
        }

        if let Some(dimensions) = self.dimensions {
            if dimensions == 0 {
                return Err(ResourceError::Validation(
                    "dimensions must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Outputs from validating the embeddings model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsOutputs {
    pub model: String,
    pub dimensions: u32,
    pub ready: bool,
}

/// Input for the embed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedInput {
    pub text: EmbeddingInput,
}

/// Output from the embed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub usage: Value,
}

/// OpenAI Embeddings resource.
///
/// `on_create` validates the key and model with a one-token probe request;
/// actual vectors come from the `embed` action.
pub struct Embeddings {
    name: String,
    config: EmbeddingsConfig,
    outputs: Option<EmbeddingsOutputs>,
}

impl Embeddings {
    pub fn new(name: impl Into<String>, config: EmbeddingsConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: EmbeddingsOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn client(&self) -> ResourceResult<OpenAiClient> {
        let api_key = self.config.api_key.value()?;

        match &self.config.base_url {
            Some(base_url) => OpenAiClient::with_base_url(api_key, base_url),
            None => OpenAiClient::new(api_key),
        }
    }

    async fn validate_model(&self) -> ResourceResult<EmbeddingsOutputs> {
        self.config.validate()?;

        let client = self.client()?;
        let request = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: EmbeddingInput::Single("test".to_string()),
            dimensions: self.config.dimensions,
        };

        info!("embeddings `{}` probing model {}", self.name, self.config.model);
        let response = client.create_embeddings(&request).await?;

        let dimensions = response
            .data
            .first()
            .map(|d| d.embedding.len() as u32)
            .ok_or_else(|| ResourceError::Parse("probe response contained no embeddings".into()))?;

        Ok(EmbeddingsOutputs {
            model: response.model,
            dimensions,
            ready: true,
        })
    }

    /// Generate embeddings for one or many texts.
    pub async fn embed(&self, input: EmbedInput) -> ResourceResult<EmbedOutput> {
        self.config.validate()?;

        let client = self.client()?;
        let request = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: input.text,
            dimensions: self.config.dimensions,
        };

        let response = client.create_embeddings(&request).await?;

        Ok(EmbedOutput {
            embeddings: response.data.into_iter().map(|d| d.embedding).collect(),
            model: response.model,
            usage: json!({
                "prompt_tokens": response.usage.prompt_tokens,
                "total_tokens": response.usage.total_tokens,
            }),
        })
    }
}

#[async_trait]
impl Resource for Embeddings {
    type Config = EmbeddingsConfig;
    type Outputs = EmbeddingsOutputs;

    const PROVIDER: &'static str = "openai";
    const KIND: &'static str = "embeddings";

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
        self.validate_model().await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config == &self.config {
            if let Some(outputs) = &self.outputs {
                return Ok(outputs.clone());
            }
        }

        self.validate_model().await
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        Ok(())
    }
}
