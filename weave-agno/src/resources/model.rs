//! Model spec resources
//!
//! These resources validate model configuration and emit the `ModelSpec`
//! that agents embed in their deployment environment. No provider API call
//! is made here; credential validity surfaces when the deployed agent first
//! uses the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weave_resource::{FieldValue, Resource, ResourceError, ResourceResult};

use crate::spec::{ModelProvider, ModelSpec};

/// Outputs shared by both model resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutputs {
    pub spec: ModelSpec,
    pub ready: bool,
}

/// Configuration for an OpenAI-backed agent model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiModelConfig {
    pub api_key: FieldValue<String>,

    /// Model identifier, e.g. "gpt-4o".
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Configuration for an Anthropic-backed agent model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicModelConfig {
    pub api_key: FieldValue<String>,

    /// Model identifier, e.g. "claude-sonnet-4-20250514".
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn build_spec(
    provider: ModelProvider,
    id: &str,
    api_key: &FieldValue<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
) -> ResourceResult<ModelSpec> {
    if id.trim().is_empty() {
        return Err(ResourceError::Validation("id must not be empty".into()));
    }

    Ok(ModelSpec {
        provider,
        id: id.to_string(),
        api_key: api_key.value()?.clone(),
        max_tokens,
        temperature,
    })
}

/// OpenAI model spec resource.
pub struct OpenAiModel {
    name: String,
    config: OpenAiModelConfig,
    outputs: Option<ModelOutputs>,
}

impl OpenAiModel {
    pub fn new(name: impl Into<String>, config: OpenAiModelConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ModelOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn build_outputs(&self) -> ResourceResult<ModelOutputs> {
        let spec = build_spec(
            ModelProvider::OpenAi,
            &self.config.id,
            &self.config.api_key,
            self.config.max_tokens,
            self.config.temperature,
        )?;

        Ok(ModelOutputs { spec, ready: true })
    }
}

#[async_trait]
impl Resource for OpenAiModel {
    type Config = OpenAiModelConfig;
    type Outputs = ModelOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "model/openai";

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
        self.build_outputs()
    }

    async fn on_update(&self, _previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        self.build_outputs()
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        Ok(())
    }
}

/// Anthropic model spec resource.
pub struct AnthropicModel {
    name: String,
    config: AnthropicModelConfig,
    outputs: Option<ModelOutputs>,
}

impl AnthropicModel {
    pub fn new(name: impl Into<String>, config: AnthropicModelConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ModelOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn build_outputs(&self) -> ResourceResult<ModelOutputs> {
        let spec = build_spec(
            ModelProvider::Anthropic,
            &self.config.id,
            &self.config.api_key,
            self.config.max_tokens,
            self.config.temperature,
        )?;

        Ok(ModelOutputs { spec, ready: true })
    }
}

#[async_trait]
impl Resource for AnthropicModel {
    type Config = AnthropicModelConfig;
    type Outputs = ModelOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "model/anthropic";

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
        self.build_outputs()
    }

    async fn on_update(&self, _previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        self.build_outputs()
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn openai_model_emits_spec() {
        let config = OpenAiModelConfig {
            api_key: FieldValue::literal("sk-test".to_string()),
            id: "gpt-4o".to_string(),
            max_tokens: Some(4096),
            temperature: None,
        };

        let outputs = OpenAiModel::new("writer-model", config)
            .on_create()
            .await
            .unwrap();

        assert_eq!(outputs.spec.provider, ModelProvider::OpenAi);
        assert_eq!(outputs.spec.id, "gpt-4o");
        assert_eq!(outputs.spec.api_key, "sk-test");
        assert!(outputs.ready);
    }

    #[tokio::test]
    async fn unresolved_api_key_is_rejected() {
        let config = AnthropicModelConfig {
            api_key: FieldValue::reference("anthropic-key.outputs.data"),
            id: "claude-sonnet-4-20250514".to_string(),
            max_tokens: None,
            temperature: None,
        };

        let err = AnthropicModel::new("reasoner", config)
            .on_create()
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceError::UnresolvedReference(_)));
    }

    #[tokio::test]
    async fn empty_model_id_is_rejected() {
        let config = OpenAiModelConfig {
            api_key: FieldValue::literal("sk-test".to_string()),
            id: "  ".to_string(),
            max_tokens: None,
            temperature: None,
        };

        let err = OpenAiModel::new("writer-model", config)
            .on_create()
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceError::Validation(_)));
    }
}
