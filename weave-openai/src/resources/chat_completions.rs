//! OpenAI Chat Completions resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use weave_resource::{FieldValue, Resource, ResourceError, ResourceResult};

use crate::api::{ChatCompletionRequest, OpenAiClient};

/// Configuration for the Chat Completions API.
///
/// `api_key` accepts a `$ref` so the runtime can inject it from a secret
/// resource. Messages are the OpenAI conversation format, passed through
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionsConfig {
    pub api_key: FieldValue<String>,
    pub model: String,
    pub messages: Vec<Value>,

    /// Maximum tokens in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0-2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ChatCompletionsConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.model.trim().is_empty() {
            return Err(ResourceError::Validation("model must not be empty".into()));
        }

        if self.messages.is_empty() {
            return Err(ResourceError::Validation(
                "messages must contain at least one entry".into(),
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ResourceError::Validation(format!(
                    "temperature must be within 0.0-2.0, got {}",
                    temperature
                )));
            }
        }

        Ok(())
    }
}

/// Normalized result of one Chat Completions call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionsOutputs {
    pub id: String,
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// OpenAI Chat Completions resource.
///
/// Lifecycle:
/// - `on_create`: call the Chat Completions API
/// - `on_update`: regenerate if the config changed
/// - `on_delete`: no-op (stateless)
pub struct ChatCompletions {
    name: String,
    config: ChatCompletionsConfig,
    outputs: Option<ChatCompletionsOutputs>,
}

impl ChatCompletions {
    pub fn new(name: impl Into<String>, config: ChatCompletionsConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ChatCompletionsOutputs) -> Self {
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

    async fn call_api(&self) -> ResourceResult<ChatCompletionsOutputs> {
        self.config.validate()?;

        let client = self.client()?;
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: self.config.messages.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        info!("chat completion `{}` calling model {}", self.name, self.config.model);
        let response = client.create_chat_completion(&request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ResourceError::Parse("response contained no choices".into()))?;
        let usage = response.usage.unwrap_or_default();

        Ok(ChatCompletionsOutputs {
            id: response.id,
            content: choice.message.content.unwrap_or_default(),
            model: response.model,
            finish_reason: choice.finish_reason,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl Resource for ChatCompletions {
    type Config = ChatCompletionsConfig;
    type Outputs = ChatCompletionsOutputs;

    const PROVIDER: &'static str = "openai";
    const KIND: &'static str = "chat_completions";

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
        self.call_api().await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config == &self.config {
            if let Some(outputs) = &self.outputs {
                return Ok(outputs.clone());
            }
        }

        self.call_api().await
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        // Stateless: nothing to tear down remotely.
        Ok(())
    }
}
